use serenity::all::{
    ChannelId, Client, Colour, Context as SerenityContext, CreateAllowedMentions, CreateMessage,
    CreateWebhook, ExecuteWebhook, FullEvent, GatewayIntents, Http, Message, MessageBuilder,
    Permissions, Webhook,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

use crate::{
    bridge::{self, BridgeEvent, CommandSink},
    channels,
    commands,
    format,
    minecraft::{Player, ServerInfo},
    resolver,
    settings::{ConfigStore, Settings},
    text::{Text, TextColor},
    Result,
};

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

const WEBHOOK_NAME: &str = "BlockBot Discord";

/// State shared by commands, the gateway handler and the bridge.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<ConfigStore>,
    pub server: Arc<Mutex<ServerInfo>>,
    pub commands: CommandSink,
    /// Relay webhooks by channel, created on first use.
    webhooks: Arc<Mutex<HashMap<ChannelId, Webhook>>>,
}

impl Data {
    pub fn new(config: Arc<ConfigStore>, commands: CommandSink) -> Self {
        Self {
            config,
            server: Arc::new(Mutex::new(ServerInfo::default())),
            commands,
            webhooks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn chat_webhook(&self, http: &Http, settings: &Settings) -> Result<Webhook> {
        let name = &settings.chat_relay.channel;
        let id = resolver::channel_id(settings, name)?;

        let mut webhooks = self.webhooks.lock().await;
        if let Some(webhook) = webhooks.get(&id) {
            return Ok(webhook.clone());
        }

        let channel = resolver::resolve_channel(settings, name, http).await?;
        let existing = channel
            .webhooks(http)
            .await?
            .into_iter()
            .find(|webhook| webhook.name.as_deref() == Some(WEBHOOK_NAME) && webhook.token.is_some());
        let webhook = match existing {
            Some(webhook) => webhook,
            None => {
                log::info!("Creating relay webhook in #{}", channel.name);
                channel
                    .create_webhook(http, CreateWebhook::new(WEBHOOK_NAME))
                    .await?
            }
        };

        webhooks.insert(id, webhook.clone());
        Ok(webhook)
    }
}

/// Console commands need Administrator or Manage Server.
fn may_run_commands(permissions: Option<Permissions>) -> bool {
    permissions.is_some_and(|permissions| permissions.administrator() || permissions.manage_guild())
}

/// Only a deleted webhook makes the cached one useless.
fn webhook_gone(error: &serenity::Error) -> bool {
    resolver::status_code(error) == Some(404)
}

fn allowed_mentions(settings: &Settings) -> CreateAllowedMentions {
    CreateAllowedMentions::new()
        .all_users(settings.chat_relay.allow_mentions)
        .all_roles(false)
        .everyone(false)
}

pub async fn run(config: Arc<ConfigStore>, sink: CommandSink) -> Result<()> {
    let settings = config.snapshot();
    let guild = resolver::guild_id(&settings)?;
    let data = Data::new(config, sink);
    let bridge_data = data.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::list(),
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            pre_command: |ctx| {
                Box::pin(async move {
                    log::info!(
                        "Got command '{}' by user '{}'",
                        ctx.command().qualified_name,
                        ctx.author().tag()
                    );
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                log::info!("Connected as {}", ready.user.name);
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild)
                    .await?;

                let settings = data.config.snapshot();
                match resolver::resolve_channel(&settings, &settings.chat_relay.channel, &*ctx.http)
                    .await
                {
                    Ok(channel) => log::info!("Relaying chat through #{}", channel.name),
                    Err(e) => log::error!("Chat relay channel unavailable: {}", e),
                }
                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&settings.bot.token, intents)
        .framework(framework)
        .await?;

    tokio::task::spawn(relay_bridge_events(client.http.clone(), bridge_data));

    Ok(client.start().await?)
}

async fn event_handler(ctx: &SerenityContext, event: &FullEvent, data: &Data) -> Result<()> {
    match event {
        FullEvent::Message { new_message } => relay_to_minecraft(ctx, new_message, data).await,
        FullEvent::Resume { .. } => {
            log::info!("Connection to discord resumed.");
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            log::error!("Failed to set up the bot: {:#}", error)
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            log::error!("Failed to handle {}: {:#}", event.snake_case_name(), error)
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!("Command '{}' failed: {:#}", ctx.command().name, error);
            let _ = ctx
                .say("Something went wrong. Please contact an admin to check the logs.")
                .await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                log::error!("Failed to handle error: {}", e);
            }
        }
    }
}

/// Highest role of the message author, from the cache.
fn top_role(ctx: &SerenityContext, msg: &Message) -> Option<(String, Colour)> {
    let member = msg.member.as_ref()?;
    let guild = msg.guild(&ctx.cache)?;
    member
        .roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .max_by_key(|role| role.position)
        .map(|role| (role.name.clone(), role.colour))
}

/// Author name and top role, both coloured like the role.
async fn sender_text(ctx: &SerenityContext, msg: &Message) -> (Text, Text) {
    let name = match msg.author_nick(ctx).await {
        Some(nick) => nick,
        None => msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone()),
    };

    match top_role(ctx, msg) {
        Some((role, colour)) if colour.0 != 0 => {
            let color = TextColor::Rgb(colour.0);
            (
                Text::literal(name).colored(color),
                Text::literal(role).colored(color),
            )
        }
        Some((role, _)) => (Text::literal(name), Text::literal(role)),
        None => (Text::literal(name), Text::empty()),
    }
}

async fn relay_to_minecraft(ctx: &SerenityContext, msg: &Message, data: &Data) -> Result<()> {
    if msg.author.bot || msg.webhook_id.is_some() {
        return Ok(());
    }
    let settings = data.config.snapshot();
    if msg.guild_id.map(|id| id.get()) != Some(settings.bot.guild) {
        return Ok(());
    }
    let configured = settings.channels()?;
    let Some(name) = configured.name(msg.channel_id.get()) else {
        return Ok(());
    };

    if name == channels::normalize(&settings.chat_relay.channel) {
        let mut content = msg.content_safe(&ctx.cache);
        for attachment in &msg.attachments {
            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(&attachment.url);
        }
        if content.is_empty() {
            return Ok(());
        }

        let (sender, top_role) = sender_text(ctx, msg).await;
        let server = data.server.lock().await.clone();
        let text = format::minecraft_chat_relay_msg(&settings, &sender, &top_role, &content, &server);
        data.commands.send(&bridge::tellraw(&text));
    } else if settings.console_relay.enabled
        && settings.console_relay.allow_commands
        && name == channels::normalize(&settings.console_relay.channel)
    {
        if !may_run_commands(msg.author_permissions(&ctx.cache)) {
            log::warn!(
                "Ignoring console command by '{}', who lacks Manage Server",
                msg.author.tag()
            );
            return Ok(());
        }
        log::info!(
            "Running console command by '{}': {}",
            msg.author.tag(),
            msg.content
        );
        data.commands.send(&msg.content);
    }

    Ok(())
}

async fn relay_chat(http: &Http, data: &Data, player: &Player, message: &str) -> Result<()> {
    let settings = data.config.snapshot();

    if settings.chat_relay.webhook.enabled {
        let webhook = data.chat_webhook(http, &settings).await?;
        let builder = ExecuteWebhook::new()
            .content(message)
            .username(format::webhook_chat_relay_username(&settings, player))
            .avatar_url(format::webhook_chat_relay_avatar(&settings, player.uuid))
            .allowed_mentions(allowed_mentions(&settings));
        if let Err(e) = webhook.execute(http, false, builder).await {
            if webhook_gone(&e) {
                if let Some(id) = webhook.channel_id {
                    log::info!("Relay webhook was deleted, creating a new one next time");
                    data.webhooks.lock().await.remove(&id);
                }
            }
            return Err(e.into());
        }
    } else {
        let channel = resolver::channel_id(&settings, &settings.chat_relay.channel)?;
        let content = format::discord_chat_relay_msg(&settings, player, message);
        channel
            .send_message(
                http,
                CreateMessage::new()
                    .content(content)
                    .allowed_mentions(allowed_mentions(&settings)),
            )
            .await?;
    }
    Ok(())
}

async fn relay_console(http: &Http, data: &Data, line: &str) -> Result<()> {
    let settings = data.config.snapshot();
    if !settings.console_relay.enabled {
        return Ok(());
    }
    let channel = resolver::channel_id(&settings, &settings.console_relay.channel)?;
    let content = MessageBuilder::new().push_codeblock_safe(line, None).build();
    channel
        .send_message(
            http,
            CreateMessage::new()
                .content(content)
                .allowed_mentions(CreateAllowedMentions::new()),
        )
        .await?;
    Ok(())
}

/// Forwards events from the Minecraft server until stdin closes.
async fn relay_bridge_events(http: Arc<Http>, data: Data) {
    let events = bridge::events(tokio::io::stdin());
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let res = match event {
            BridgeEvent::Chat { player, message } => relay_chat(&http, &data, &player, &message).await,
            BridgeEvent::Console { line } => relay_console(&http, &data, &line).await,
            BridgeEvent::Status { server } => {
                *data.server.lock().await = server;
                Ok(())
            }
        };
        if let Err(e) = res {
            log::error!("Failed to relay to discord: {:#}", e);
        }
    }

    log::info!("Bridge input closed.");
}
