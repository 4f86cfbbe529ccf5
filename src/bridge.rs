//! Line protocol between the bot and the Minecraft server wrapper.
//!
//! The wrapper writes one JSON event per line to our stdin and pipes our stdout
//! into the server console, so everything written there is run as a command.

use crate::{
    minecraft::{Player, ServerInfo},
    text::Text,
};
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, Stream, StreamExt};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A player sent a chat message.
    Chat { player: Player, message: String },
    /// A line of server console output.
    Console { line: String },
    /// Fresh server information.
    Status { server: ServerInfo },
}

pub fn parse_event(line: &str) -> Option<BridgeEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Ignoring malformed bridge event '{}': {}", line, e);
            None
        }
    }
}

/// Events read from `reader` until it closes or fails.
pub fn events<R>(reader: R) -> impl Stream<Item = BridgeEvent>
where
    R: AsyncRead + Unpin,
{
    LinesStream::new(BufReader::new(reader).lines())
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                log::error!("Failed to read bridge input: {}", e);
                None
            }
        })
        .filter_map(|line| parse_event(&line))
}

/// Command showing `text` to every player.
pub fn tellraw(text: &Text) -> String {
    format!("tellraw @a {}", text.to_json())
}

/// Keeps a command on a single line so it can't smuggle in a second one.
pub fn sanitize_command(command: &str) -> String {
    command
        .trim()
        .trim_start_matches('/')
        .replace(|c: char| c == '\r' || c == '\n', " ")
}

/// Queue of console commands, written to stdout in order.
#[derive(Debug, Clone)]
pub struct CommandSink {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawns the task writing queued commands to stdout.
    pub fn stdout() -> Self {
        let (sink, mut rx) = Self::channel();
        tokio::task::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(command) = rx.recv().await {
                let line = format!("{}\n", command);
                if let Err(e) = async {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.flush().await
                }
                .await
                {
                    log::error!("Failed to write command to stdout: {}", e);
                    break;
                }
            }
        });
        sink
    }

    pub fn send(&self, command: &str) {
        let command = sanitize_command(command);
        if command.is_empty() {
            return;
        }
        if self.tx.send(command).is_err() {
            log::warn!("Command output is closed, dropping command.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{NamedColor, TextColor};

    #[test]
    fn parses_events() {
        let chat = parse_event(
            r#"{"type":"chat","player":{"name":"Steve","uuid":"069a79f4-44e9-4726-a5be-fca90e38aaf5"},"message":"hi"}"#,
        )
        .unwrap();
        assert!(matches!(chat, BridgeEvent::Chat { player, message } if player.name == "Steve" && message == "hi"));

        let status = parse_event(r#"{"type":"status","server":{"online_players":3}}"#).unwrap();
        assert_eq!(
            status,
            BridgeEvent::Status {
                server: ServerInfo {
                    online_players: 3,
                    ..ServerInfo::default()
                }
            }
        );

        assert_eq!(
            parse_event(r#"{"type":"console","line":"Done (3.2s)!"}"#),
            Some(BridgeEvent::Console {
                line: "Done (3.2s)!".to_string()
            })
        );
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        assert_eq!(parse_event("   "), None);
        assert_eq!(parse_event("<Steve> hi"), None);
        assert_eq!(parse_event(r#"{"type":"teleport"}"#), None);
    }

    #[test]
    fn builds_tellraw() {
        let text = Text::literal("hi").colored(TextColor::Named(NamedColor::Red));

        let command = tellraw(&text);
        let json: serde_json::Value =
            serde_json::from_str(command.strip_prefix("tellraw @a ").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hi", "color": "red" }));
    }

    #[test]
    fn commands_stay_on_one_line() {
        assert_eq!(sanitize_command("/say hi\nop Steve"), "say hi op Steve");
        assert_eq!(sanitize_command("  list \r\n"), "list");
    }

    #[tokio::test]
    async fn reads_event_stream() {
        let input: &[u8] = b"{\"type\":\"console\",\"line\":\"a\"}\nnot json\n\n{\"type\":\"console\",\"line\":\"b\"}\n";

        let lines: Vec<_> = events(input).collect().await;

        assert_eq!(
            lines,
            vec![
                BridgeEvent::Console {
                    line: "a".to_string()
                },
                BridgeEvent::Console {
                    line: "b".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn sink_queues_sanitized_commands() {
        let (sink, mut rx) = CommandSink::channel();

        sink.send("/say one\ntwo");
        sink.send("   ");
        sink.send("list");

        assert_eq!(rx.recv().await.unwrap(), "say one two");
        assert_eq!(rx.recv().await.unwrap(), "list");
    }
}
