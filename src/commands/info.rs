use crate::discord::{Context, Error};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter, MessageBuilder};
use poise::CreateReply;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn footer() -> CreateEmbedFooter {
    CreateEmbedFooter::new(format!("BlockBot Discord v{}", VERSION))
}

/// Explains what this bot is about.
#[poise::command(slash_command)]
pub async fn about(ctx: Context<'_>) -> Result<(), Error> {
    let embed = CreateEmbed::new()
        .title(format!("BlockBot Discord v{}", VERSION))
        .field(
            "Purpose of this bot",
            "Relays chat between this server and Minecraft.",
            true,
        )
        .footer(footer());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Prints the current status of the Minecraft server.
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let server = ctx.data().server.lock().await.clone();

    if server.version.is_empty() {
        ctx.say("The Minecraft server hasn't reported its status yet.")
            .await?;
        return Ok(());
    }

    let embed = CreateEmbed::new()
        .title("Minecraft Server Status")
        .field(
            "Players",
            MessageBuilder::new()
                .push_mono(format!("{}/{}", server.online_players, server.max_players))
                .build(),
            true,
        )
        .field(
            "Version",
            MessageBuilder::new().push_mono_safe(&server.version).build(),
            true,
        )
        .field(
            "MOTD",
            MessageBuilder::new()
                .push_codeblock_safe(crate::markup::parse(&server.motd).to_plain_string(), None)
                .build(),
            false,
        )
        .footer(footer());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
