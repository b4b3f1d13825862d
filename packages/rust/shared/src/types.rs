//! Option types shared between the configuration file, the converter, and the CLI.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParagraphBreak
// ---------------------------------------------------------------------------

/// How many line breaks a closing `</p>` produces.
///
/// Telegram has no paragraph element, so paragraphs become plain line breaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphBreak {
    /// `<p>a</p><p>b</p>` → `a\nb\n`.
    #[default]
    Single,
    /// `<p>a</p><p>b</p>` → `a\n\nb\n\n`.
    Double,
}

impl ParagraphBreak {
    /// Number of newlines requested after a paragraph.
    pub fn newlines(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

impl std::str::FromStr for ParagraphBreak {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            other => Err(format!(
                "unknown paragraph break {other:?} (expected single or double)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderedListStyle
// ---------------------------------------------------------------------------

/// Marker used for `<li>` items inside an `<ol>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderedListStyle {
    /// Every list item gets the `• ` bullet, ordered or not.
    #[default]
    Bullet,
    /// Items of an `<ol>` are numbered `1. `, `2. `, ...
    Numbered,
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Where the converted text ends up, which decides the length limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// `sendMessage` text.
    #[default]
    Text,
    /// `sendPhoto` / `sendVideo` caption.
    Caption,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Caption => f.write_str("caption"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_break_parses_case_insensitively() {
        assert_eq!("Double".parse::<ParagraphBreak>(), Ok(ParagraphBreak::Double));
        assert_eq!(" single ".parse::<ParagraphBreak>(), Ok(ParagraphBreak::Single));
        assert!("triple".parse::<ParagraphBreak>().is_err());
    }

    #[test]
    fn paragraph_break_newlines() {
        assert_eq!(ParagraphBreak::Single.newlines(), 1);
        assert_eq!(ParagraphBreak::Double.newlines(), 2);
    }

    #[test]
    fn defaults_match_editor_conventions() {
        assert_eq!(ParagraphBreak::default(), ParagraphBreak::Single);
        assert_eq!(OrderedListStyle::default(), OrderedListStyle::Bullet);
        assert_eq!(MessageKind::default().to_string(), "text");
    }
}
