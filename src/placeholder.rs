//! Placeholder substitution for relay templates.
//!
//! Two kinds of placeholders are recognised:
//! - `{name}` is filled from the values passed alongside the template.
//! - `%namespace:path%` is resolved against a live context (a player or the server).
//!
//! Only the template is scanned. Inserted values are never parsed again, so a
//! chat message containing `{message}` or `%server:online%` shows up verbatim.

use crate::text::Text;
use std::collections::HashMap;

pub type Substitutions<'a> = HashMap<&'a str, Text>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Predefined(&'a str),
    Contextual {
        raw: &'a str,
        namespace: &'a str,
        path: &'a str,
    },
}

/// Something which can fill in `%namespace:path%` placeholders.
pub trait PlaceholderContext {
    fn resolve(&self, namespace: &str, path: &str) -> Option<Text>;
}

/// Resolves nothing.
pub struct NoContext;

impl PlaceholderContext for NoContext {
    fn resolve(&self, _namespace: &str, _path: &str) -> Option<Text> {
        None
    }
}

fn is_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '{' || c == '}')
}

pub fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(offset) = template[pos..].find(|c: char| c == '{' || c == '%') {
        let start = pos + offset;
        let delimiter = if template[start..].starts_with('{') { '}' } else { '%' };
        let body_start = start + 1;

        let segment = template[body_start..]
            .find(delimiter)
            .map(|len| &template[body_start..body_start + len])
            .and_then(|body| match delimiter {
                '}' => is_name(body).then_some(Segment::Predefined(body)),
                _ => {
                    let (namespace, path) = body.split_once(':')?;
                    (is_name(namespace) && is_name(path)).then_some(
                        Segment::Contextual {
                            raw: &template[start..body_start + body.len() + 1],
                            namespace,
                            path,
                        },
                    )
                }
            });

        match segment {
            Some(segment) => {
                if literal_start < start {
                    segments.push(Segment::Literal(&template[literal_start..start]));
                }
                pos = match segment {
                    Segment::Predefined(name) => body_start + name.len() + 1,
                    Segment::Contextual { raw, .. } => start + raw.len(),
                    Segment::Literal(_) => body_start,
                };
                literal_start = pos;
                segments.push(segment);
            }
            None => pos = body_start,
        }
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    segments
}

/// Fills every placeholder in `template` and its children.
/// Placeholders without a value are left as they were written.
pub fn render(template: &Text, values: &Substitutions, ctx: &dyn PlaceholderContext) -> Text {
    let segments = tokenize(&template.content);
    let mut out = Text::empty().styled(template.style.clone());

    if segments
        .iter()
        .all(|segment| matches!(segment, Segment::Literal(_)))
    {
        out.content = template.content.clone();
    } else {
        for segment in segments {
            let piece = match segment {
                Segment::Literal(literal) => Text::literal(literal),
                Segment::Predefined(name) => values
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Text::literal(format!("{{{}}}", name))),
                Segment::Contextual {
                    raw,
                    namespace,
                    path,
                } => ctx
                    .resolve(namespace, path)
                    .unwrap_or_else(|| Text::literal(raw)),
            };
            out.push(piece);
        }
    }

    for child in &template.children {
        out.push(render(child, values, ctx));
    }
    out
}

/// Renders a plain template to a plain string.
pub fn render_str(template: &str, values: &Substitutions, ctx: &dyn PlaceholderContext) -> String {
    render(&Text::literal(template), values, ctx).to_plain_string()
}
