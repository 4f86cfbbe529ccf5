//! Rendering of relayed chat messages from the configured templates.

use crate::{
    markup,
    minecraft::{Player, ServerInfo},
    placeholder::{self, NoContext, Substitutions},
    settings::Settings,
    text::Text,
};
use uuid::Uuid;

/// Minecraft chat as sent to Discord.
///
/// `message` is inserted as plain text, placeholders inside it are not expanded.
pub fn discord_chat_relay_msg(settings: &Settings, player: &Player, message: &str) -> String {
    let values = Substitutions::from([
        ("player", player.display_name_text()),
        ("message", Text::literal(message)),
    ]);
    placeholder::render_str(&settings.chat_relay.discord_format, &values, player)
}

/// Discord chat as shown in Minecraft.
///
/// `sender` is used as given for `{sender_colored}` and without any formatting for `{sender}`.
pub fn minecraft_chat_relay_msg(
    settings: &Settings,
    sender: &Text,
    top_role: &Text,
    message: &str,
    server: &ServerInfo,
) -> Text {
    let template = markup::parse(&settings.chat_relay.minecraft_format);
    let values = Substitutions::from([
        ("sender", sender.plain()),
        ("sender_colored", sender.clone()),
        ("top_role", top_role.clone()),
        ("message", Text::literal(message)),
    ]);
    placeholder::render(&template, &values, server)
}

/// Avatar shown on webhook messages for the player with `uuid`.
pub fn webhook_chat_relay_avatar(settings: &Settings, uuid: Uuid) -> String {
    let values = Substitutions::from([("uuid", Text::literal(uuid.to_string()))]);
    placeholder::render_str(&settings.chat_relay.webhook.avatar_url, &values, &NoContext)
}

/// Name shown on webhook messages sent for `player`.
pub fn webhook_chat_relay_username(settings: &Settings, player: &Player) -> String {
    let values = Substitutions::from([("player", player.display_name_text())]);
    placeholder::render_str(&settings.chat_relay.webhook.username, &values, player)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        settings::{
            BotSettings, ChatRelaySettings, ConsoleRelaySettings, Settings, WebhookSettings,
        },
        text::{NamedColor, TextColor},
    };
    use std::collections::HashMap;

    pub(crate) fn settings() -> Settings {
        Settings {
            bot: BotSettings {
                token: "token".to_string(),
                guild: 1,
                channels: HashMap::from([("chat".to_string(), 10), ("console".to_string(), 20)]),
            },
            chat_relay: ChatRelaySettings {
                channel: "chat".to_string(),
                allow_mentions: false,
                discord_format: "**{player}**: {message}".to_string(),
                minecraft_format: "<blue>[Discord]</blue> <{sender_colored}> {message}".to_string(),
                webhook: WebhookSettings {
                    enabled: true,
                    username: "{player}".to_string(),
                    avatar_url: "https://crafatar.com/avatars/{uuid}?overlay".to_string(),
                },
            },
            console_relay: ConsoleRelaySettings {
                enabled: true,
                channel: "console".to_string(),
                allow_commands: false,
            },
        }
    }

    fn alex() -> Player {
        Player {
            name: "Alex".to_string(),
            uuid: Uuid::parse_str("ec561538-f3fd-461d-aff5-086b22154bce").unwrap(),
            display_name: None,
        }
    }

    #[test]
    fn formats_discord_message() {
        let msg = discord_chat_relay_msg(&settings(), &alex(), "hello");

        assert_eq!(msg, "**Alex**: hello");
    }

    #[test]
    fn discord_message_is_not_expanded() {
        let mut settings = settings();
        settings.chat_relay.discord_format = "[%player:name%] {message}".to_string();

        let msg = discord_chat_relay_msg(&settings, &alex(), "{player} %player:uuid%");

        assert_eq!(msg, "[Alex] {player} %player:uuid%");
    }

    #[test]
    fn formats_minecraft_message() {
        let sender = Text::literal("Mod").colored(TextColor::Rgb(0xe91e63));
        let top_role = Text::literal("Moderator");

        let text = minecraft_chat_relay_msg(
            &settings(),
            &sender,
            &top_role,
            "hi <red>there</red>",
            &ServerInfo::default(),
        );

        assert_eq!(text.to_plain_string(), "[Discord] <Mod> hi <red>there</red>");
        assert_eq!(
            text.children[0].style.color,
            Some(TextColor::Named(NamedColor::Blue))
        );
        let json = text.to_json().to_string();
        assert!(json.contains("#E91E63"));
    }

    #[test]
    fn minecraft_message_uses_plain_sender_and_server() {
        let mut settings = settings();
        settings.chat_relay.minecraft_format =
            "{sender} ({top_role}, %server:online% online): {message}".to_string();
        let sender = Text::literal("Mod").colored(TextColor::Rgb(0xe91e63));
        let server = ServerInfo {
            online_players: 2,
            ..ServerInfo::default()
        };

        let text = minecraft_chat_relay_msg(&settings, &sender, &Text::literal("Staff"), "yo", &server);

        assert_eq!(text.to_plain_string(), "Mod (Staff, 2 online): yo");
        assert!(!text.to_json().to_string().contains("#E91E63"));
    }

    #[test]
    fn formats_webhook_avatar() {
        let url = webhook_chat_relay_avatar(&settings(), alex().uuid);

        assert_eq!(
            url,
            "https://crafatar.com/avatars/ec561538-f3fd-461d-aff5-086b22154bce?overlay"
        );
    }

    #[test]
    fn formats_webhook_username() {
        let mut settings = settings();
        settings.chat_relay.webhook.username = "{player} (MC)".to_string();
        let player = Player {
            display_name: Some("<gold>Queen Alex</gold>".to_string()),
            ..alex()
        };

        assert_eq!(webhook_chat_relay_username(&settings, &player), "Queen Alex (MC)");
    }
}
