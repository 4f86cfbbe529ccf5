use crate::{markup, placeholder::PlaceholderContext, text::Text};
use serde::Deserialize;
use uuid::Uuid;

/// A player as reported by the Minecraft server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Player {
    pub name: String,
    pub uuid: Uuid,
    /// Display name with formatting tags, e.g. from a nickname plugin.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Player {
    pub fn display_name_text(&self) -> Text {
        match &self.display_name {
            Some(display_name) => markup::parse(display_name),
            None => Text::literal(self.name.as_str()),
        }
    }
}

impl PlaceholderContext for Player {
    fn resolve(&self, namespace: &str, path: &str) -> Option<Text> {
        if namespace != "player" {
            return None;
        }
        match path {
            "name" => Some(Text::literal(self.name.as_str())),
            "displayname" => Some(self.display_name_text()),
            "uuid" => Some(Text::literal(self.uuid.to_string())),
            _ => None,
        }
    }
}

/// Last known state of the Minecraft server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub motd: String,
    pub version: String,
    pub online_players: usize,
    pub max_players: usize,
}

impl PlaceholderContext for ServerInfo {
    fn resolve(&self, namespace: &str, path: &str) -> Option<Text> {
        if namespace != "server" {
            return None;
        }
        match path {
            "motd" => Some(markup::parse(&self.motd)),
            "version" => Some(Text::literal(self.version.as_str())),
            "online" => Some(Text::literal(self.online_players.to_string())),
            "max_players" => Some(Text::literal(self.max_players.to_string())),
            _ => None,
        }
    }
}
