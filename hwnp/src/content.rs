//! Content classification for section payloads.
//!
//! Each section is classified once when the image is parsed. The rules are
//! checked in order and the first match wins:
//!
//! 1. `.sh` file name: [`ContentKind::Shell`], or [`ContentKind::Binary`] if
//!    the payload is not UTF-8.
//! 2. `.xml` file name: [`ContentKind::Xml`], with no text if the payload is
//!    not UTF-8.
//! 3. payload of at most [`FLAG_MAX_SIZE`] bytes: [`ContentKind::Flag`],
//!    rendered as hex.
//! 4. printable payload smaller than [`TEXT_MAX_SIZE`]: [`ContentKind::Text`];
//!    anything else is [`ContentKind::Binary`].

use snafu::Snafu;
use std::fmt;

/// Payloads up to this size are treated as flags.
pub const FLAG_MAX_SIZE: usize = 4;

/// Printable payloads must be smaller than this to be treated as text.
pub const TEXT_MAX_SIZE: usize = 65536;

/// Semantic type of a section payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Shell,
    Xml,
    Flag,
    Text,
    Binary,
}

impl ContentKind {
    /// Returns a short lowercase name for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Xml => "xml",
            Self::Flag => "flag",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Returns `true` for kinds whose payload is edited as UTF-8 text.
    #[must_use]
    pub const fn is_text_like(self) -> bool {
        matches!(self, Self::Shell | Self::Xml | Self::Text)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a payload and returns its decoded text view, if any.
///
/// `file_name` is the section path with its `file:` prefix removed.
#[must_use]
pub fn classify(file_name: &str, data: &[u8]) -> (ContentKind, Option<String>) {
    if file_name.ends_with(".sh") {
        return match decode_utf8(data) {
            Some(text) => (ContentKind::Shell, Some(text)),
            None => (ContentKind::Binary, None),
        };
    }

    if file_name.ends_with(".xml") {
        return (ContentKind::Xml, decode_utf8(data));
    }

    if data.len() <= FLAG_MAX_SIZE {
        return (ContentKind::Flag, Some(render_flag(data)));
    }

    if data.len() < TEXT_MAX_SIZE && looks_like_text(data) {
        return (ContentKind::Text, decode_utf8(data));
    }

    (ContentKind::Binary, None)
}

/// Rebuilds the text view of an already classified payload.
pub(crate) fn text_view(kind: ContentKind, data: &[u8]) -> Option<String> {
    match kind {
        ContentKind::Flag => Some(render_flag(data)),
        k if k.is_text_like() => decode_utf8(data),
        _ => None,
    }
}

/// Renders bytes as space separated uppercase hex pairs (`"0A 01 FF"`).
#[must_use]
pub fn render_flag(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Errors when parsing a hex flag value.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseFlagError {
    #[snafu(display("flag value is empty"))]
    Empty,

    #[snafu(display("invalid hex byte {token:?}"))]
    InvalidByte { token: String },
}

/// Parses whitespace separated hex bytes, the inverse of [`render_flag()`].
///
/// # Errors
///
/// Returns an error if the input is empty or a token is not a hex byte.
pub fn parse_flag(s: &str) -> Result<Vec<u8>, ParseFlagError> {
    let bytes = s
        .split_whitespace()
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16).map_err(|_| ParseFlagError::InvalidByte {
                token: token.to_owned(),
            })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    snafu::ensure!(!bytes.is_empty(), EmptySnafu);
    Ok(bytes)
}

fn looks_like_text(data: &[u8]) -> bool {
    data.iter()
        .all(|&b| b == 0 || (0x09..=0x0D).contains(&b) || (0x20..=0x7E).contains(&b))
}

fn decode_utf8(data: &[u8]) -> Option<String> {
    std::str::from_utf8(data).ok().map(str::to_owned)
}
