use crate::discord::{Context, Error};
use crate::resolver;
use poise::serenity_prelude::MessageBuilder;

/// Lists the configured channels and whether the bot can reach them.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn channels(ctx: Context<'_>) -> Result<(), Error> {
    let settings = ctx.data().config.snapshot();
    let channels = settings.channels()?;

    let http = ctx.http();
    let lookups = channels
        .iter()
        .map(|(name, _)| resolver::resolve_channel(&settings, name, http));
    let resolved = futures::future::join_all(lookups).await;

    let mut response = MessageBuilder::new();
    response.push_bold_line("Configured channels:");
    for ((name, id), res) in channels.iter().zip(resolved) {
        response.push_mono_safe(name).push(" ");
        match res {
            Ok(channel) => response.push_line(format!("<#{}>", channel.id)),
            Err(e) => response.push_line(format!("`{}` unavailable: {}", id, e)),
        };
    }
    if channels.is_empty() {
        response.push_italic_line("No channels configured.");
    }
    ctx.say(response.build()).await?;
    Ok(())
}

/// Reloads the config file.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    match ctx.data().config.reload() {
        Ok(()) => {
            log::info!("Config reloaded by '{}'", ctx.author().tag());
            ctx.say("Reloaded the config.").await?;
        }
        Err(e) => {
            log::error!("Keeping previous config: {:#}", e);
            ctx.say(
                MessageBuilder::new()
                    .push_line("Failed to reload, keeping the previous config:")
                    .push_codeblock_safe(format!("{:#}", e), None)
                    .build(),
            )
            .await?;
        }
    }
    Ok(())
}
