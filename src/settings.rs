use crate::channels::{self, ChannelMap, ChannelMapError};
use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

pub const FILENAME: &str = "blockbot-discord.toml";

/// Default configuration shipped with the bot. Copied to the config directory on first run.
pub const DEFAULT_CONFIG: &str = include_str!("../blockbot-discord.toml");

const ENV_PREFIX: &str = "BLOCKBOT";

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Id,
    Bool,
    ChannelMap,
}

/// Keys which have to resolve in at least one layer before the config is usable.
const REQUIRED_KEYS: &[(&str, Kind)] = &[
    ("bot.token", Kind::String),
    ("bot.guild", Kind::Id),
    ("bot.channels", Kind::ChannelMap),
    ("chat_relay.channel", Kind::String),
    ("chat_relay.allow_mentions", Kind::Bool),
    ("chat_relay.discord_format", Kind::String),
    ("chat_relay.minecraft_format", Kind::String),
    ("chat_relay.webhook.enabled", Kind::Bool),
    ("chat_relay.webhook.username", Kind::String),
    ("chat_relay.webhook.avatar_url", Kind::String),
    ("console_relay.enabled", Kind::Bool),
    ("console_relay.channel", Kind::String),
    ("console_relay.allow_commands", Kind::Bool),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bot: BotSettings,
    pub chat_relay: ChatRelaySettings,
    pub console_relay: ConsoleRelaySettings,
}

impl Settings {
    /// Channel map built fresh from the current values.
    pub fn channels(&self) -> Result<ChannelMap, ChannelMapError> {
        ChannelMap::new(&self.bot.channels)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    /// Discord's bot token
    pub token: String,
    /// Guild the bot relays to
    pub guild: u64,
    /// Logical channel name to channel id
    pub channels: HashMap<String, u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRelaySettings {
    /// Name of the chat channel in `bot.channels`
    pub channel: String,
    pub allow_mentions: bool,
    /// Template for Minecraft chat sent to Discord
    pub discord_format: String,
    /// Template (with formatting tags) for Discord chat shown in Minecraft
    pub minecraft_format: String,
    pub webhook: WebhookSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub username: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleRelaySettings {
    pub enabled: bool,
    /// Name of the console channel in `bot.channels`
    pub channel: String,
    /// Whether messages in the console channel are executed as commands
    pub allow_commands: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required config key '{0}'")]
    MissingKey(String),
    #[error("invalid value for config key '{key}': {reason}")]
    Invalid { key: String, reason: String },
    #[error("invalid config: {0}")]
    Channels(#[from] ChannelMapError),
    #[error("config key '{key}' refers to channel '{name}', which is not in bot.channels")]
    UnknownChannel { key: String, name: String },
}

/// Copies the bundled default config to `path` if nothing is there yet.
pub fn create_config_file(path: &Path) -> Result<()> {
    if !path.exists() {
        log::info!("No config file, creating...");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    }
    Ok(())
}

/// Directory holding the user config, `BLOCKBOT_CONFIG_DIR` or `./config`.
pub fn config_dir() -> PathBuf {
    std::env::var("BLOCKBOT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"))
}

/// Collects `-Dkey=value` arguments.
pub fn parse_property_overrides<I, S>(args: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .filter_map(|arg| {
            let (key, value) = arg.as_ref().strip_prefix("-D")?.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Layers making up the config, lowest precedence first:
/// bundled default, user file, environment, property overrides.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub path: PathBuf,
    /// `None` reads the process environment.
    pub env: Option<HashMap<String, String>>,
    pub overrides: Vec<(String, String)>,
}

impl ConfigSources {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            env: None,
            overrides: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Config, ConfigError> {
        // Eg.. `BLOCKBOT_CHAT_RELAY__DISCORD_FORMAT` would set `chat_relay.discord_format`
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(self.env.clone());

        let mut builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(
                File::from(self.path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(env);

        for (key, value) in &self.overrides {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }

        builder.build()
    }
}

/// Checks that every required key resolved and has the expected type.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    for (key, kind) in REQUIRED_KEYS {
        let res = match kind {
            Kind::String => config.get_string(key).map(|_| Ok(())),
            Kind::Id => match config.get::<u64>(key) {
                Ok(0) => {
                    return Err(ValidationError::Invalid {
                        key: key.to_string(),
                        reason: "ids can't be 0".to_string(),
                    })
                }
                res => res.map(|_| Ok(())),
            },
            Kind::Bool => config.get_bool(key).map(|_| Ok(())),
            Kind::ChannelMap => config
                .get::<HashMap<String, u64>>(key)
                .map(|channels| ChannelMap::new(&channels).map(drop)),
        };

        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(ConfigError::NotFound(_)) => {
                return Err(ValidationError::MissingKey(key.to_string()))
            }
            Err(e) => {
                return Err(ValidationError::Invalid {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    let configured = config
        .get::<HashMap<String, u64>>("bot.channels")
        .unwrap_or_default();
    let mut references = vec!["chat_relay.channel"];
    if config.get_bool("console_relay.enabled").unwrap_or(false) {
        references.push("console_relay.channel");
    }
    for key in references {
        let name = config.get_string(key).unwrap_or_default();
        if channels::lookup(&configured, &name).is_none() {
            return Err(ValidationError::UnknownChannel {
                key: key.to_string(),
                name,
            });
        }
    }
    Ok(())
}

fn load_settings(sources: &ConfigSources) -> Result<Settings> {
    let config = sources.build().context("Failed to read config.")?;
    validate(&config)?;
    config
        .try_deserialize()
        .context("Failed to deserialize config.")
}

/// Owned handle to the latest valid config snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    sources: ConfigSources,
    current: RwLock<Arc<Settings>>,
}

impl ConfigStore {
    pub fn load(sources: ConfigSources) -> Result<Self> {
        let settings = load_settings(&sources)?;
        Ok(Self {
            sources,
            current: RwLock::new(Arc::new(settings)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.sources.path
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuilds every layer. On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<()> {
        let settings = load_settings(&self.sources)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
        log::info!("Reloaded config from {}", self.sources.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_CONFIG: &str = r#"
[bot]
token = "abc"
guild = 42

[bot.channels]
chat = 100
console = 200
"#;

    fn sources(dir: &tempfile::TempDir, user: Option<&str>) -> ConfigSources {
        let path = dir.path().join(FILENAME);
        if let Some(user) = user {
            std::fs::write(&path, user).unwrap();
        }
        ConfigSources {
            path,
            env: Some(HashMap::new()),
            overrides: Vec::new(),
        }
    }

    #[test]
    fn creates_missing_config_as_copy_of_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FILENAME);

        create_config_file(&path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), DEFAULT_CONFIG.as_bytes());
    }

    #[test]
    fn keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        std::fs::write(&path, USER_CONFIG).unwrap();

        create_config_file(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), USER_CONFIG);
    }

    #[test]
    fn default_config_lacks_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = sources(&dir, None).build().unwrap();

        match validate(&config) {
            Err(ValidationError::MissingKey(key)) => assert_eq!(key, "bot.token"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_key_in_every_layer_is_named() {
        let config = Config::builder()
            .add_source(File::from_str(
                "[bot]\ntoken = \"abc\"\nguild = 1\n[bot.channels]\nchat = 1",
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        match validate(&config) {
            Err(ValidationError::MissingKey(key)) => assert_eq!(key, "chat_relay.channel"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn complete_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let config = sources(&dir, Some(USER_CONFIG)).build().unwrap();

        validate(&config).unwrap();
        let settings: Settings = config.try_deserialize().unwrap();
        assert_eq!(settings.bot.guild, 42);
        assert_eq!(settings.bot.channels["console"], 200);
        assert_eq!(settings.chat_relay.channel, "chat");
    }

    #[test]
    fn wrongly_typed_key_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let user = USER_CONFIG.replace("guild = 42", "guild = \"not a number\"");
        let config = sources(&dir, Some(&user)).build().unwrap();

        match validate(&config) {
            Err(ValidationError::Invalid { key, .. }) => assert_eq!(key, "bot.guild"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn duplicate_channel_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let user = USER_CONFIG.replace("console = 200", "console = 100");
        let config = sources(&dir, Some(&user)).build().unwrap();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::Channels(ChannelMapError::DuplicateId { id: 100, .. }))
        ));
    }

    #[test]
    fn layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let user = format!("{}\n[chat_relay]\ndiscord_format = \"user\"\n", USER_CONFIG);
        let mut sources = sources(&dir, Some(&user));

        let settings = load_settings(&sources).unwrap();
        assert_eq!(settings.chat_relay.discord_format, "user");
        // Untouched keys still come from the bundled default.
        assert_eq!(settings.chat_relay.channel, "chat");

        sources.env = Some(HashMap::from([(
            "BLOCKBOT_CHAT_RELAY__DISCORD_FORMAT".to_string(),
            "env".to_string(),
        )]));
        let settings = load_settings(&sources).unwrap();
        assert_eq!(settings.chat_relay.discord_format, "env");

        sources.overrides = vec![("chat_relay.discord_format".to_string(), "prop".to_string())];
        let settings = load_settings(&sources).unwrap();
        assert_eq!(settings.chat_relay.discord_format, "prop");
    }

    #[test]
    fn env_supplies_required_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut sources = sources(&dir, None);
        sources.env = Some(HashMap::from([
            ("BLOCKBOT_BOT__TOKEN".to_string(), "from-env".to_string()),
            ("BLOCKBOT_BOT__GUILD".to_string(), "7".to_string()),
            ("BLOCKBOT_BOT__CHANNELS__CHAT".to_string(), "70".to_string()),
        ]));

        let settings = load_settings(&sources).unwrap();
        assert_eq!(settings.bot.token, "from-env");
        assert_eq!(settings.bot.guild, 7);
        assert_eq!(settings.bot.channels["chat"], 70);
    }

    #[test]
    fn mixed_case_channel_names_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let user = "[bot]\ntoken = \"abc\"\nguild = 42\n\
                    [bot.channels]\nGeneral = 10\n\
                    [chat_relay]\nchannel = \"General\"\n";

        let settings = load_settings(&sources(&dir, Some(user))).unwrap();

        assert_eq!(
            crate::resolver::channel_id(&settings, &settings.chat_relay.channel).unwrap(),
            serenity::all::ChannelId::new(10)
        );
        let channels = settings.channels().unwrap();
        assert_eq!(channels.id(&settings.chat_relay.channel), Some(10));
    }

    #[test]
    fn relay_channels_must_be_configured() {
        let dir = tempfile::tempdir().unwrap();
        let user = format!("{}\n[chat_relay]\nchannel = \"lobby\"\n", USER_CONFIG);
        let config = sources(&dir, Some(&user)).build().unwrap();

        match validate(&config) {
            Err(ValidationError::UnknownChannel { key, name }) => {
                assert_eq!(key, "chat_relay.channel");
                assert_eq!(name, "lobby");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn console_channel_only_checked_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let user = USER_CONFIG.replace("console = 200", "logs = 200");
        let mut sources = sources(&dir, Some(&user));

        load_settings(&sources).unwrap();

        sources.overrides = vec![("console_relay.enabled".to_string(), "true".to_string())];
        let config = sources.build().unwrap();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnknownChannel { key, .. }) if key == "console_relay.channel"
        ));
    }

    #[test]
    fn parses_property_overrides() {
        let overrides = parse_property_overrides([
            "blockbot",
            "-Dbot.guild=5",
            "-Dchat_relay.discord_format={player} = {message}",
            "-D=ignored",
            "--verbose",
        ]);

        assert_eq!(
            overrides,
            vec![
                ("bot.guild".to_string(), "5".to_string()),
                (
                    "chat_relay.discord_format".to_string(),
                    "{player} = {message}".to_string()
                ),
            ]
        );
    }

    #[test]
    fn reload_keeps_previous_snapshot_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let sources = sources(&dir, Some(USER_CONFIG));
        let path = sources.path.clone();
        let store = ConfigStore::load(sources).unwrap();
        let before = store.snapshot();

        std::fs::write(&path, "[bot]\ntoken = ").unwrap();
        assert!(store.reload().is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        let edited = USER_CONFIG.replace("guild = 42", "guild = 43");
        std::fs::write(&path, edited).unwrap();
        store.reload().unwrap();
        assert_eq!(store.snapshot().bot.guild, 43);
        assert_eq!(before.bot.guild, 42);
    }
}
