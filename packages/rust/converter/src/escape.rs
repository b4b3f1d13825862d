//! Entity handling for Telegram's HTML parser.
//!
//! Telegram understands every numeric character reference but only four
//! named ones (`&lt;`, `&gt;`, `&amp;`, `&quot;`). Anything else after a `&`
//! makes `sendMessage` fail with "can't parse entities".

use std::fmt::Write as _;

/// Named entities Telegram's parser accepts as-is.
const SUPPORTED_NAMED: &[(&str, char)] = &[("lt", '<'), ("gt", '>'), ("amp", '&'), ("quot", '"')];

/// Named entities editors commonly emit, rewritten to numeric references.
const CONVERTIBLE_NAMED: &[(&str, char)] = &[
    ("nbsp", '\u{a0}'),
    ("apos", '\''),
    ("shy", '\u{ad}'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("lsquo", '‘'),
    ("rsquo", '’'),
    ("sbquo", '‚'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("bdquo", '„'),
    ("ndash", '–'),
    ("mdash", '—'),
    ("hellip", '…'),
    ("bull", '•'),
    ("middot", '·'),
    ("copy", '©'),
    ("reg", '®'),
    ("trade", '™'),
    ("euro", '€'),
    ("pound", '£'),
    ("yen", '¥'),
    ("cent", '¢'),
    ("sect", '§'),
    ("para", '¶'),
    ("deg", '°'),
    ("plusmn", '±'),
    ("times", '×'),
    ("divide", '÷'),
    ("frac12", '½'),
    ("frac14", '¼'),
    ("frac34", '¾'),
    ("larr", '←'),
    ("rarr", '→'),
    ("uarr", '↑'),
    ("darr", '↓'),
    ("ensp", '\u{2002}'),
    ("emsp", '\u{2003}'),
    ("thinsp", '\u{2009}'),
    ("zwnj", '\u{200c}'),
    ("zwj", '\u{200d}'),
];

/// A character reference found at the start of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntityRef {
    /// Byte length, `&` through `;`.
    pub len: usize,
    /// The character it stands for, if known.
    pub value: Option<char>,
    /// Whether Telegram accepts it as written.
    pub supported: bool,
}

/// Parse the character reference at the start of `s` (which starts with `&`).
pub(crate) fn entity_at(s: &str) -> Option<EntityRef> {
    let body = s.strip_prefix('&')?;
    let semi = body.find(';')?;
    if semi == 0 || semi > 32 {
        return None;
    }
    let name = &body[..semi];
    let len = semi + 2;

    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
                u32::from_str_radix(hex, 16).ok()
            }
            None if !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()) => num.parse().ok(),
            _ => return None,
        };
        let value = code.and_then(char::from_u32).filter(|c| *c != '\0');
        return Some(EntityRef {
            len,
            value,
            supported: value.is_some(),
        });
    }

    if !name.bytes().all(|b| b.is_ascii_alphanumeric()) || !name.as_bytes()[0].is_ascii_alphabetic()
    {
        return None;
    }
    if let Some((_, c)) = SUPPORTED_NAMED.iter().find(|(n, _)| *n == name) {
        return Some(EntityRef {
            len,
            value: Some(*c),
            supported: true,
        });
    }
    let value = CONVERTIBLE_NAMED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c);
    Some(EntityRef {
        len,
        value,
        supported: false,
    })
}

/// Append `text` to `out`, escaped for Telegram. Returns how many
/// characters or references had to be rewritten.
///
/// Already-escaped text passes through unchanged, so escaping is idempotent.
pub(crate) fn escape_text_into(text: &str, out: &mut String) -> usize {
    let mut rewritten = 0;
    let mut rest = text;

    while let Some(pos) = rest.find(|c: char| matches!(c, '<' | '>' | '&')) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let consumed = match tail.as_bytes()[0] {
            b'<' => {
                out.push_str("&lt;");
                rewritten += 1;
                1
            }
            b'>' => {
                out.push_str("&gt;");
                rewritten += 1;
                1
            }
            _ => match entity_at(tail) {
                Some(entity) if entity.supported => {
                    out.push_str(&tail[..entity.len]);
                    entity.len
                }
                Some(EntityRef {
                    len,
                    value: Some(c),
                    ..
                }) => {
                    let _ = write!(out, "&#{};", u32::from(c));
                    rewritten += 1;
                    len
                }
                _ => {
                    out.push_str("&amp;");
                    rewritten += 1;
                    1
                }
            },
        };
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    rewritten
}

/// Escape an attribute value for use inside double quotes.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_text_into(value, &mut out);
    out.replace('"', "&quot;")
}

/// Decode every reference Telegram would decode, plus the convertible named
/// ones. Unknown references stay as written.
pub(crate) fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match entity_at(tail) {
            Some(EntityRef {
                len,
                value: Some(c),
                ..
            }) => {
                out.push(c);
                rest = &tail[len..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape(text: &str) -> String {
        let mut out = String::new();
        escape_text_into(text, &mut out);
        out
    }

    #[test]
    fn escapes_bare_specials() {
        assert_eq!(escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn keeps_supported_references() {
        let text = "&lt;tag&gt; &amp; &quot;q&quot; &#128512; &#x1F600;";
        assert_eq!(escape(text), text);
    }

    #[test]
    fn converts_editor_entities_to_numeric() {
        assert_eq!(escape("a&nbsp;b&mdash;c"), "a&#160;b&#8212;c");
        assert_eq!(escape("&laquo;цитата&raquo;"), "&#171;цитата&#187;");
    }

    #[test]
    fn unknown_named_entity_is_escaped() {
        assert_eq!(escape("&bogus; &"), "&amp;bogus; &amp;");
        assert_eq!(escape("AT&T"), "AT&amp;T");
    }

    #[test]
    fn invalid_numeric_reference_is_escaped() {
        assert_eq!(escape("&#0; &#xD800;"), "&amp;#0; &amp;#xD800;");
    }

    #[test]
    fn escaping_is_idempotent() {
        let once = escape("x < y & z&nbsp;&copy; &unknown;");
        assert_eq!(escape(&once), once);
    }

    #[test]
    fn counts_rewrites() {
        let mut out = String::new();
        assert_eq!(escape_text_into("a&nbsp;<b>&amp;", &mut out), 3);
    }

    #[test]
    fn attr_escaping_quotes() {
        assert_eq!(escape_attr("https://x.test/?q=\"a\"&b=1"), "https://x.test/?q=&quot;a&quot;&amp;b=1");
    }

    #[test]
    fn decodes_references() {
        assert_eq!(decode_entities("&lt;b&gt; &amp; &#65;&#x42; &nbsp;&bogus;"), "<b> & AB \u{a0}&bogus;");
    }
}
