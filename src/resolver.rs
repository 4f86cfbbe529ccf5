use crate::{channels, settings::Settings};
use async_trait::async_trait;
use serenity::{
    http::Http,
    model::{
        channel::GuildChannel,
        guild::PartialGuild,
        id::{ChannelId, GuildId},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("channel '{0}' is not defined in the config")]
    UnknownChannel(String),
    #[error("guild {0} does not exist or the bot can't access it")]
    GuildNotFound(u64),
    #[error("channel '{name}' ({id}) does not exist in the configured guild")]
    ChannelNotFound { name: String, id: u64 },
    #[error("discord request failed: {0}")]
    Network(#[from] serenity::Error),
}

/// The remote lookups needed to turn configured ids into live handles.
#[async_trait]
pub trait DiscordApi: Sync {
    type Guild: Send + Sync;
    type Channel: Send;

    /// `Ok(None)` if the guild doesn't exist or isn't accessible.
    async fn guild(&self, id: GuildId) -> Result<Option<Self::Guild>, serenity::Error>;

    /// `Ok(None)` if the channel doesn't exist or belongs to another guild.
    async fn guild_channel(
        &self,
        guild: &Self::Guild,
        id: ChannelId,
    ) -> Result<Option<Self::Channel>, serenity::Error>;
}

/// HTTP status of a failed Discord request.
pub fn status_code(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(e) => e.status_code().map(|code| code.as_u16()),
        _ => None,
    }
}

/// Treats "not found" and "missing access" responses as an absent entity.
fn absent_on_missing<T>(res: serenity::Result<T>) -> serenity::Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(e) if matches!(status_code(&e), Some(403 | 404)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl DiscordApi for Http {
    type Guild = PartialGuild;
    type Channel = GuildChannel;

    async fn guild(&self, id: GuildId) -> Result<Option<PartialGuild>, serenity::Error> {
        absent_on_missing(self.get_guild(id).await)
    }

    async fn guild_channel(
        &self,
        guild: &PartialGuild,
        id: ChannelId,
    ) -> Result<Option<GuildChannel>, serenity::Error> {
        let channel = absent_on_missing(self.get_channel(id).await)?;
        Ok(channel
            .and_then(|channel| channel.guild())
            .filter(|channel| channel.guild_id == guild.id))
    }
}

/// Id of the channel configured under `name`.
pub fn channel_id(settings: &Settings, name: &str) -> Result<ChannelId, ResolveError> {
    match channels::lookup(&settings.bot.channels, name).filter(|id| *id != 0) {
        Some(id) => Ok(ChannelId::new(id)),
        None => {
            log::warn!(
                "Invalid channel '{}'. Make sure it is defined and correct in your config",
                name
            );
            Err(ResolveError::UnknownChannel(name.to_string()))
        }
    }
}

pub fn guild_id(settings: &Settings) -> Result<GuildId, ResolveError> {
    match settings.bot.guild {
        0 => Err(ResolveError::GuildNotFound(0)),
        id => Ok(GuildId::new(id)),
    }
}

pub async fn resolve_guild<A: DiscordApi>(
    settings: &Settings,
    api: &A,
) -> Result<A::Guild, ResolveError> {
    let id = guild_id(settings)?;
    api.guild(id)
        .await?
        .ok_or(ResolveError::GuildNotFound(id.get()))
}

pub async fn resolve_channel<A: DiscordApi>(
    settings: &Settings,
    name: &str,
    api: &A,
) -> Result<A::Channel, ResolveError> {
    let id = channel_id(settings, name)?;
    let guild = resolve_guild(settings, api).await?;
    api.guild_channel(&guild, id)
        .await?
        .ok_or_else(|| ResolveError::ChannelNotFound {
            name: name.to_string(),
            id: id.get(),
        })
}
