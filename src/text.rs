//! Minecraft rich text components.
//!
//! A [`Text`] is a piece of content with a [`Style`] and child components.
//! Children inherit every style property they don't set themselves, matching
//! how the game renders chat components.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl NamedColor {
    pub const ALL: [NamedColor; 16] = [
        NamedColor::Black,
        NamedColor::DarkBlue,
        NamedColor::DarkGreen,
        NamedColor::DarkAqua,
        NamedColor::DarkRed,
        NamedColor::DarkPurple,
        NamedColor::Gold,
        NamedColor::Gray,
        NamedColor::DarkGray,
        NamedColor::Blue,
        NamedColor::Green,
        NamedColor::Aqua,
        NamedColor::Red,
        NamedColor::LightPurple,
        NamedColor::Yellow,
        NamedColor::White,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NamedColor::Black => "black",
            NamedColor::DarkBlue => "dark_blue",
            NamedColor::DarkGreen => "dark_green",
            NamedColor::DarkAqua => "dark_aqua",
            NamedColor::DarkRed => "dark_red",
            NamedColor::DarkPurple => "dark_purple",
            NamedColor::Gold => "gold",
            NamedColor::Gray => "gray",
            NamedColor::DarkGray => "dark_gray",
            NamedColor::Blue => "blue",
            NamedColor::Green => "green",
            NamedColor::Aqua => "aqua",
            NamedColor::Red => "red",
            NamedColor::LightPurple => "light_purple",
            NamedColor::Yellow => "yellow",
            NamedColor::White => "white",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = match name {
            "grey" => "gray",
            "dark_grey" => "dark_gray",
            name => name,
        };
        Self::ALL.into_iter().find(|color| color.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Named(NamedColor),
    /// 24 bit RGB
    Rgb(u32),
}

impl TextColor {
    /// Parses a colour name or `#rrggbb`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            if hex.len() == 6 {
                return u32::from_str_radix(hex, 16).ok().map(TextColor::Rgb);
            }
            return None;
        }
        NamedColor::from_name(&value).map(TextColor::Named)
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextColor::Named(color) => f.write_str(color.name()),
            TextColor::Rgb(rgb) => write!(f, "#{:06X}", rgb & 0xFF_FFFF),
        }
    }
}

impl Serialize for TextColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Unset properties are inherited from the parent component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<TextColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlined: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated: Option<bool>,
}

impl Style {
    /// Properties set on `other` replace the ones set here.
    pub fn merged(&self, other: &Style) -> Style {
        Style {
            color: other.color.or(self.color),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underlined: other.underlined.or(self.underlined),
            strikethrough: other.strikethrough.or(self.strikethrough),
            obfuscated: other.obfuscated.or(self.obfuscated),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Text {
    #[serde(rename = "text")]
    pub content: String,
    #[serde(flatten)]
    pub style: Style,
    #[serde(rename = "extra", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Text>,
}

impl Text {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn literal<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, child: Text) {
        self.children.push(child);
    }

    pub fn styled(mut self, style: Style) -> Self {
        self.style = self.style.merged(&style);
        self
    }

    pub fn colored(mut self, color: TextColor) -> Self {
        self.style.color = Some(color);
        self
    }

    /// Copy with the style of this component and all of its children removed.
    pub fn plain(&self) -> Text {
        Text {
            content: self.content.clone(),
            style: Style::default(),
            children: self.children.iter().map(Text::plain).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.children.iter().all(Text::is_empty)
    }

    /// The visible characters, without any formatting.
    pub fn to_plain_string(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        out.push_str(&self.content);
        for child in &self.children {
            child.write_plain(out);
        }
    }

    /// JSON chat component as accepted by `tellraw`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::String(self.to_plain_string()))
    }
}
