//! Reloads the config store when the user config file changes on disk.

use crate::settings::ConfigStore;
use anyhow::{Context, Result};
use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::{path::Path, sync::Arc, time::Duration};

/// Keeps watching as long as it is alive.
pub struct ConfigWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

fn is_config_event(kind: &EventKind, paths: &[std::path::PathBuf], file: &Path) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && paths
        .iter()
        .any(|path| path.file_name() == file.file_name())
}

impl ConfigWatcher {
    pub fn start(store: Arc<ConfigStore>) -> Result<Self> {
        let file = store.path().to_path_buf();
        // Editors often replace the file instead of writing to it, so watch the directory.
        let dir = match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };

        let watched = file.clone();
        let mut debouncer = new_debouncer(
            Duration::from_millis(500),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    if events
                        .iter()
                        .any(|event| is_config_event(&event.kind, &event.paths, &watched))
                    {
                        log::debug!("{} changed, reloading", watched.display());
                        if let Err(e) = store.reload() {
                            log::error!("Keeping previous config: {:#}", e);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        log::warn!("Config watcher error: {}", e);
                    }
                }
            },
        )
        .context("Failed to create config watcher.")?;

        debouncer
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        log::info!("Watching {} for changes", file.display());

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}
