//! Telegram length limits.
//!
//! Telegram counts message length after parsing entities, in UTF-16 code
//! units: tags do not count, `&amp;` counts as one, an emoji usually as two.

use tgformat_shared::{DEFAULT_CAPTION_LIMIT, DEFAULT_MESSAGE_LIMIT};

use crate::escape::{decode_entities, entity_at};
use crate::repair::repair_tags;
use crate::scan::{Tag, Token, scan};
use crate::tags::CanonicalTag;

/// Maximum length of `sendMessage` text.
pub const MESSAGE_LIMIT: usize = DEFAULT_MESSAGE_LIMIT;
/// Maximum length of a media caption.
pub const CAPTION_LIMIT: usize = DEFAULT_CAPTION_LIMIT;

const ELLIPSIS: &str = "...";

/// Text Telegram displays for `html`: tags removed, entities decoded.
pub fn visible_text(html: &str) -> String {
    scan(html)
        .filter_map(|token| match token {
            Token::Text(text) => Some(decode_entities(text)),
            _ => None,
        })
        .collect()
}

/// Length of [`visible_text`] in UTF-16 code units.
pub fn visible_len(html: &str) -> usize {
    visible_text(html).encode_utf16().count()
}

pub fn fits(html: &str, limit: usize) -> bool {
    visible_len(html) <= limit
}

/// Whether `html` is too long for a caption, in which case the publisher
/// sends the media and the text as separate messages.
pub fn exceeds_caption_limit(html: &str) -> bool {
    !fits(html, CAPTION_LIMIT)
}

/// Cut `html` down to at most `limit` visible units.
///
/// Returns the input unchanged when it fits. Otherwise keeps as much text as
/// fits in `limit - 3` units, never splitting a character or an entity,
/// appends `...` and closes whatever tags were left open. Input is expected
/// to be converter output.
pub fn truncate(html: &str, limit: usize) -> String {
    if fits(html, limit) {
        return html.to_string();
    }

    let ellipsis = &ELLIPSIS[..ELLIPSIS.len().min(limit)];
    let budget = limit - ellipsis.len();
    let mut used = 0usize;
    let mut out = String::with_capacity(html.len().min(limit * 4));

    'tokens: for token in scan(html) {
        let text = match token {
            Token::Tag(tag) => {
                out.push_str(tag.raw);
                continue;
            }
            Token::Markup(_) | Token::RawText(_) => continue,
            Token::Text(text) => text,
        };

        let mut rest = text;
        while let Some((len, units)) = next_piece(rest) {
            if used + units > budget {
                break 'tokens;
            }
            out.push_str(&rest[..len]);
            used += units;
            rest = &rest[len..];
        }
    }

    out.push_str(ellipsis);
    repair_tags(&out).html
}

/// Byte length and visible UTF-16 units of the character or entity reference
/// at the start of `text`.
fn next_piece(text: &str) -> Option<(usize, usize)> {
    let c = text.chars().next()?;
    let piece = match entity_at(text) {
        Some(entity) if c == '&' => (
            entity.len,
            entity.value.map_or(entity.len, char::len_utf16),
        ),
        _ => (c.len_utf8(), c.len_utf16()),
    };
    Some(piece)
}

/// Split `html` into messages of at most `limit` visible units each.
///
/// Returns `html` alone when it fits. Otherwise every part closes the tags
/// still open where it ends and the next part reopens them, links with their
/// `href`. A cut inside a text run falls after the run's last newline, or
/// failing that its last space or tab, when the part has one; otherwise it
/// falls between two characters. Characters and entities are never split, so
/// a `limit` below 2 can leave a lone surrogate pair over it. Input is
/// expected to be converter output.
pub fn split(html: &str, limit: usize) -> Vec<String> {
    if fits(html, limit) {
        return vec![html.to_string()];
    }

    let html = repair_tags(html).html;
    let mut splitter = Splitter::new(limit);
    for token in scan(&html) {
        match token {
            Token::Text(text) => splitter.text(text),
            Token::Tag(tag) => splitter.tag(&tag),
            Token::Markup(_) | Token::RawText(_) => {}
        }
    }
    splitter.finish()
}

struct Splitter<'h> {
    limit: usize,
    parts: Vec<String>,
    current: String,
    /// Tags open at the current position, with the opener to repeat.
    open: Vec<(CanonicalTag, &'h str)>,
    /// Visible units in `current`.
    used: usize,
    /// Openers at the very end of `current`: where the run starts and how
    /// many tags it opened. A cut moves them into the next part.
    trailing: Option<(usize, usize)>,
}

impl<'h> Splitter<'h> {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            parts: Vec::new(),
            current: String::new(),
            open: Vec::new(),
            used: 0,
            trailing: None,
        }
    }

    fn tag(&mut self, tag: &Tag<'h>) {
        if tag.closing {
            self.open.pop();
            self.trailing = None;
        } else if let Some(canonical) = CanonicalTag::from_name(&tag.name) {
            let start = self.current.len();
            self.trailing = Some(self.trailing.map_or((start, 1), |(at, n)| (at, n + 1)));
            self.open.push((canonical, tag.raw));
        }
        self.current.push_str(tag.raw);
    }

    fn text(&mut self, text: &str) {
        // (length of `current`, offset in `text`) just past whitespace.
        let mut after_newline: Option<(usize, usize)> = None;
        let mut after_space: Option<(usize, usize)> = None;
        let mut i = 0;

        while let Some((len, units)) = next_piece(&text[i..]) {
            if self.used > 0 && self.used + units > self.limit {
                if let Some((keep, resume)) = after_newline.or(after_space) {
                    self.current.truncate(keep);
                    i = resume;
                }
                self.cut();
                after_newline = None;
                after_space = None;
                continue;
            }

            self.current.push_str(&text[i..i + len]);
            self.trailing = None;
            self.used += units;
            i += len;
            match text.as_bytes()[i - len] {
                b'\n' => after_newline = Some((self.current.len(), i)),
                b' ' | b'\t' => after_space = Some((self.current.len(), i)),
                _ => {}
            }
        }
    }

    fn cut(&mut self) {
        let (moved, moved_tags) = match self.trailing.take() {
            Some((at, n)) => (self.current.split_off(at), n),
            None => (String::new(), 0),
        };
        let carried = self.open.len() - moved_tags;

        for (tag, _) in self.open[..carried].iter().rev() {
            self.current.push_str("</");
            self.current.push_str(tag.as_str());
            self.current.push('>');
        }
        self.parts.push(std::mem::take(&mut self.current));

        for (_, opener) in &self.open[..carried] {
            self.current.push_str(opener);
        }
        self.current.push_str(&moved);
        self.used = 0;
    }

    fn finish(mut self) -> Vec<String> {
        // Input is balanced, so nothing is open here.
        self.parts.push(self.current);
        self.parts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
