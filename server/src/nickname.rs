//! Nickname mini-syntax: `<skin>name`.
//!
//! * `<ninja>Alice` -> name `Alice`, skin `ninja`
//! * `<r>Zed` -> name `Zed`, skin drawn from the random skin list
//! * `<>Carl` -> name `Carl`, skin explicitly empty
//! * `Bob` -> name `Bob`, no skin

use rand::Rng;

/// Skin part of a parsed nickname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinRequest<'a> {
    /// No `<...>` prefix.
    Absent,
    /// `<>`
    Empty,
    /// `<r>`
    Random,
    Named(&'a str),
}

impl SkinRequest<'_> {
    /// Resolves to the skin to apply. `Random` with no skins available yields `None`.
    pub fn resolve(&self, skins: &[String], rng: &mut impl Rng) -> Option<String> {
        match self {
            SkinRequest::Absent => None,
            SkinRequest::Empty => Some(String::new()),
            SkinRequest::Random => {
                if skins.is_empty() {
                    None
                } else {
                    Some(skins[rng.gen_range(0..skins.len())].clone())
                }
            }
            SkinRequest::Named(skin) => Some((*skin).to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNickname<'a> {
    pub name: &'a str,
    pub skin: SkinRequest<'a>,
}

pub fn parse(text: &str) -> ParsedNickname<'_> {
    if let Some(rest) = text.strip_prefix('<') {
        if let Some(close) = rest.find('>') {
            let token = &rest[..close];
            let skin = match token {
                "" => SkinRequest::Empty,
                "r" => SkinRequest::Random,
                named => SkinRequest::Named(named),
            };
            return ParsedNickname {
                name: &rest[close + 1..],
                skin,
            };
        }
    }

    ParsedNickname {
        name: text,
        skin: SkinRequest::Absent,
    }
}

/// Keeps at most `max_chars` characters.
pub fn truncate(name: &str, max_chars: usize) -> String {
    name.chars().take(max_chars).collect()
}
