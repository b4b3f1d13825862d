//! The fixed tag vocabulary of Telegram's HTML parse mode.

/// A tag Telegram accepts in `parse_mode=HTML`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalTag {
    B,
    I,
    U,
    S,
    Code,
    Pre,
    A,
}

impl CanonicalTag {
    /// Every canonical tag.
    pub const ALL: [CanonicalTag; 7] = [
        Self::B,
        Self::I,
        Self::U,
        Self::S,
        Self::Code,
        Self::Pre,
        Self::A,
    ];

    /// Look up a canonical tag by its exact (lowercase) name.
    ///
    /// Aliases such as `strong` are *not* canonical; see [`alias_of`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "b" => Some(Self::B),
            "i" => Some(Self::I),
            "u" => Some(Self::U),
            "s" => Some(Self::S),
            "code" => Some(Self::Code),
            "pre" => Some(Self::Pre),
            "a" => Some(Self::A),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::B => "b",
            Self::I => "i",
            Self::U => "u",
            Self::S => "s",
            Self::Code => "code",
            Self::Pre => "pre",
            Self::A => "a",
        }
    }

    /// Position in [`Self::ALL`], for per-tag tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tags whose content Telegram shows verbatim.
    pub fn is_verbatim(self) -> bool {
        matches!(self, Self::Code | Self::Pre)
    }
}

impl std::fmt::Display for CanonicalTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a semantic alias onto its canonical tag (`strong` → `b`).
pub fn alias_of(name: &str) -> Option<CanonicalTag> {
    match name {
        "strong" => Some(CanonicalTag::B),
        "em" => Some(CanonicalTag::I),
        "ins" => Some(CanonicalTag::U),
        "del" | "strike" => Some(CanonicalTag::S),
        _ => None,
    }
}

/// Elements that never have content or a closing tag.
pub(crate) fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose body is raw text, never scanned for tags.
pub(crate) fn is_raw_text(name: &str) -> bool {
    matches!(name, "script" | "style")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_roundtrip() {
        for tag in CanonicalTag::ALL {
            assert_eq!(CanonicalTag::from_name(tag.as_str()), Some(tag));
        }
    }

    #[test]
    fn index_matches_position_in_all() {
        for (pos, tag) in CanonicalTag::ALL.into_iter().enumerate() {
            assert_eq!(tag.index(), pos);
        }
    }

    #[test]
    fn aliases_are_not_canonical() {
        for alias in ["strong", "em", "ins", "del", "strike"] {
            assert_eq!(CanonicalTag::from_name(alias), None);
            assert!(alias_of(alias).is_some());
        }
        assert_eq!(alias_of("strike"), Some(CanonicalTag::S));
        assert_eq!(alias_of("span"), None);
    }

    #[test]
    fn verbatim_tags() {
        assert!(CanonicalTag::Pre.is_verbatim());
        assert!(CanonicalTag::Code.is_verbatim());
        assert!(!CanonicalTag::B.is_verbatim());
    }
}
