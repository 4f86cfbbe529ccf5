//! Simple tag based formatting for Minecraft-bound templates.
//!
//! `<red>`, `<color:#ff8800>` (or `<c:...>`), `<bold>`/`<b>`, `<italic>`/`<i>`,
//! `<underline>`/`<u>`, `<strikethrough>`/`<st>` and `<obfuscated>`/`<obf>` open
//! a styled section. `</name>` closes the innermost open section of that kind,
//! `</>` the innermost section and `<reset>`/`<r>` all of them. Anything else
//! between angle brackets is kept as text.

use crate::text::{Style, Text, TextColor};

#[derive(Debug)]
enum Tag {
    Open(&'static str, Style),
    Close(Option<&'static str>),
    Reset,
}

impl Tag {
    fn parse(raw: &str) -> Option<Tag> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw == "reset" || raw == "r" {
            return Some(Tag::Reset);
        }
        if let Some(name) = raw.strip_prefix('/') {
            if name.is_empty() {
                return Some(Tag::Close(None));
            }
            return kind(name).map(|kind| Tag::Close(Some(kind)));
        }

        let style = match raw.split_once(':') {
            Some(("color" | "c", value)) => Style {
                color: Some(TextColor::parse(value)?),
                ..Style::default()
            },
            Some(_) => return None,
            None => match raw.as_str() {
                "bold" | "b" => Style {
                    bold: Some(true),
                    ..Style::default()
                },
                "italic" | "i" | "em" => Style {
                    italic: Some(true),
                    ..Style::default()
                },
                "underline" | "underlined" | "u" => Style {
                    underlined: Some(true),
                    ..Style::default()
                },
                "strikethrough" | "st" => Style {
                    strikethrough: Some(true),
                    ..Style::default()
                },
                "obfuscated" | "obf" => Style {
                    obfuscated: Some(true),
                    ..Style::default()
                },
                name => Style {
                    color: Some(TextColor::parse(name).filter(|_| !name.starts_with('#'))?),
                    ..Style::default()
                },
            },
        };
        Some(Tag::Open(kind(&raw)?, style))
    }
}

/// Which kind of section a tag opens or closes.
fn kind(name: &str) -> Option<&'static str> {
    let name = name.split(':').next().unwrap_or(name);
    match name {
        "bold" | "b" => Some("bold"),
        "italic" | "i" | "em" => Some("italic"),
        "underline" | "underlined" | "u" => Some("underline"),
        "strikethrough" | "st" => Some("strikethrough"),
        "obfuscated" | "obf" => Some("obfuscated"),
        "color" | "c" => Some("color"),
        name if TextColor::parse(name).is_some() && !name.starts_with('#') => Some("color"),
        _ => None,
    }
}

struct Section {
    kind: &'static str,
    text: Text,
}

fn flush(stack: &mut [Section], buf: &mut String) {
    if buf.is_empty() {
        return;
    }
    if let Some(top) = stack.last_mut() {
        top.text.push(Text::literal(std::mem::take(buf)));
    }
}

/// Closes sections until only `depth` remain open.
fn close(stack: &mut Vec<Section>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some(section) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                if !section.text.is_empty() {
                    parent.text.push(section.text);
                }
            }
        }
    }
}

/// Applies `tag`, returns false if it doesn't match anything open.
fn apply(stack: &mut Vec<Section>, buf: &mut String, tag: Tag) -> bool {
    match tag {
        Tag::Open(kind, style) => {
            flush(stack, buf);
            stack.push(Section {
                kind,
                text: Text::empty().styled(style),
            });
        }
        Tag::Close(kind) => {
            let depth = stack
                .iter()
                .skip(1)
                .rposition(|section| kind.map_or(true, |kind| section.kind == kind));
            match depth {
                Some(depth) => {
                    flush(stack, buf);
                    close(stack, depth + 1);
                }
                None => return false,
            }
        }
        Tag::Reset => {
            flush(stack, buf);
            close(stack, 1);
        }
    }
    true
}

pub fn parse(input: &str) -> Text {
    let mut stack = vec![Section {
        kind: "",
        text: Text::empty(),
    }];
    let mut buf = String::new();
    let mut rest = input;

    while let Some(pos) = rest.find('<') {
        buf.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let raw = rest[1..]
            .find(|c: char| c == '<' || c == '>')
            .filter(|&end| rest[1 + end..].starts_with('>'))
            .map(|end| &rest[1..1 + end]);

        let tag_len = raw
            .filter(|raw| {
                Tag::parse(raw).is_some_and(|tag| apply(&mut stack, &mut buf, tag))
            })
            .map(str::len);

        match tag_len {
            Some(len) => rest = &rest[len + 2..],
            None => {
                buf.push('<');
                rest = &rest[1..];
            }
        }
    }
    buf.push_str(rest);

    flush(&mut stack, &mut buf);
    close(&mut stack, 1);
    stack.pop().map(|section| section.text).unwrap_or_default()
}
