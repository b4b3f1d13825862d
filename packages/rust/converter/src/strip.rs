//! Stage 3: attribute stripping and text escaping.
//!
//! After this stage the only markup left is bare canonical tags and
//! `<a href="...">`. Everything else is unwrapped (the tag goes, its content
//! stays) or, for comments, declarations and script/style bodies, removed.

use tracing::trace;

use crate::escape::{escape_attr, escape_text_into};
use crate::scan::{Token, scan};
use crate::tags::CanonicalTag;

/// Output of [`strip_attributes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub html: String,
    /// Non-canonical tags removed (their content kept).
    pub unwrapped_tags: usize,
    /// Comments, declarations, processing instructions, CDATA sections and
    /// script/style bodies removed.
    pub dropped_markup: usize,
    /// Characters or entity references rewritten by escaping.
    pub escaped: usize,
}

/// Reduce `html` to attribute-free canonical tags and escaped text.
pub fn strip_attributes(html: &str) -> Stripped {
    let mut out = String::with_capacity(html.len());
    let mut unwrapped_tags = 0;
    let mut dropped_markup = 0;
    let mut escaped = 0;

    for token in scan(html) {
        match token {
            Token::Text(text) => escaped += escape_text_into(text, &mut out),
            Token::Markup(_) | Token::RawText(_) => dropped_markup += 1,
            Token::Tag(tag) => {
                let Some(canonical) = CanonicalTag::from_name(&tag.name) else {
                    unwrapped_tags += 1;
                    continue;
                };
                if tag.closing {
                    out.push_str("</");
                    out.push_str(canonical.as_str());
                    out.push('>');
                } else if tag.self_closing {
                    unwrapped_tags += 1;
                } else if canonical == CanonicalTag::A {
                    match tag.attr("href").map(str::trim).filter(|h| !h.is_empty()) {
                        Some(href) => {
                            out.push_str("<a href=\"");
                            out.push_str(&escape_attr(href));
                            out.push_str("\">");
                        }
                        // Telegram rejects <a> without a URL.
                        None => unwrapped_tags += 1,
                    }
                } else {
                    out.push('<');
                    out.push_str(canonical.as_str());
                    out.push('>');
                }
            }
        }
    }

    trace!(unwrapped_tags, dropped_markup, escaped, "attribute stripping done");
    Stripped {
        html: out,
        unwrapped_tags,
        dropped_markup,
        escaped,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
