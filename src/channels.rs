use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelMapError {
    #[error("channels '{first}' and '{second}' share the id {id}")]
    DuplicateId { id: u64, first: String, second: String },
    #[error("channel '{0}' has the invalid id 0")]
    ZeroId(String),
}

/// Key under which a channel name is stored.
///
/// The config layers lowercase table keys, so names compare case-insensitively.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Id configured for `name` in a raw `bot.channels` table.
pub fn lookup(channels: &HashMap<String, u64>, name: &str) -> Option<u64> {
    let name = normalize(name);
    channels
        .iter()
        .find(|(key, _)| normalize(key) == name)
        .map(|(_, id)| *id)
}

/// One-to-one mapping between configured channel names and channel ids.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    by_name: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
}

impl ChannelMap {
    pub fn new(channels: &HashMap<String, u64>) -> Result<Self, ChannelMapError> {
        let mut map = Self::default();
        for (name, id) in channels {
            let name = normalize(name);
            if *id == 0 {
                return Err(ChannelMapError::ZeroId(name));
            }
            if let Some(other) = map.by_id.insert(*id, name.clone()) {
                // Report in a stable order no matter how the HashMap iterates.
                let (first, second) = if other < name {
                    (other, name)
                } else {
                    (name, other)
                };
                return Err(ChannelMapError::DuplicateId {
                    id: *id,
                    first,
                    second,
                });
            }
            map.by_name.insert(name, *id);
        }
        Ok(map)
    }

    pub fn id(&self, name: &str) -> Option<u64> {
        self.by_name.get(&normalize(name)).copied()
    }

    pub fn name(&self, id: u64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        let mut entries: Vec<_> = self
            .by_name
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
            .collect();
        entries.sort_unstable();
        entries.into_iter()
    }
}
