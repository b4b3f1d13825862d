//! HTML to Telegram HTML conversion.
//!
//! Rich-text HTML from editors is turned into the tag subset Telegram's
//! `parse_mode=HTML` accepts (`b`, `i`, `u`, `s`, `code`, `pre`,
//! `a href`) by four stages, each a pure string-to-string pass over the
//! shared [`scan`] tokenizer:
//!
//! 1. [`normalize_styles`]: inline CSS emphasis and alias tags → canonical tags
//! 2. [`flatten_blocks`]: paragraphs, headings, lists, `<br>` → newlines and bullets
//! 3. [`strip_attributes`]: attributes and unsupported tags removed, text escaped
//! 4. [`repair_tags`]: crossing and unclosed tags balanced, stray closers dropped
//!
//! Conversion never fails; malformed input is repaired on a best-effort basis.

mod escape;
mod flatten;
pub mod limits;
mod normalize;
mod repair;
pub mod scan;
mod strip;
pub mod tags;

use serde::Serialize;
use tracing::{debug, instrument};

use tgformat_shared::{ConvertConfig, OrderedListStyle, ParagraphBreak};

pub use flatten::flatten_blocks;
pub use normalize::normalize_styles;
pub use repair::{RepairReport, Repaired, is_well_formed, repair_tags};
pub use strip::{Stripped, strip_attributes};
pub use tags::CanonicalTag;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for [`convert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvertOptions {
    /// Line breaks after a closing `</p>`.
    pub paragraph_break: ParagraphBreak,
    /// Marker for `<li>` inside `<ol>`.
    pub ordered_lists: OrderedListStyle,
    /// Drop source indentation between block tags, cap blank lines at one and
    /// never start the output with a newline.
    pub tidy_whitespace: bool,
    /// Rewrite Markdown-like emphasis in text to tags.
    pub markdown_emphasis: bool,
}

impl From<&ConvertConfig> for ConvertOptions {
    fn from(cfg: &ConvertConfig) -> Self {
        Self {
            paragraph_break: cfg.paragraph_break,
            ordered_lists: cfg.ordered_lists,
            tidy_whitespace: cfg.tidy_whitespace,
            markdown_emphasis: cfg.markdown_emphasis,
        }
    }
}

/// Result of converting one HTML string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Telegram-ready HTML.
    pub html: String,
    pub diagnostics: Diagnostics,
}

/// What the pipeline changed on the way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Input length in bytes.
    pub input_len: usize,
    /// Output length in bytes.
    pub output_len: usize,
    /// Output length as Telegram counts it (UTF-16 units of visible text).
    pub visible_len: usize,
    /// Unsupported tags removed by the stripper, content kept.
    pub unwrapped_tags: usize,
    /// Comments, declarations and script/style bodies removed.
    pub dropped_markup: usize,
    /// Characters or entities rewritten while escaping text.
    pub escaped_chars: usize,
    /// Changes made by the tag-balance repairer.
    pub repair: RepairReport,
}

impl Diagnostics {
    /// True when nothing had to be repaired. Unwrapping, markup removal and
    /// escaping are normal for editor HTML and do not count.
    pub fn is_clean(&self) -> bool {
        self.repair.is_clean()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Convert `html` to Telegram HTML with default options.
pub fn convert_to_telegram_html(html: &str) -> String {
    convert(html, &ConvertOptions::default()).html
}

/// Run the full pipeline and report what was changed.
#[instrument(skip(html), fields(input_len = html.len()))]
pub fn convert(html: &str, opts: &ConvertOptions) -> Conversion {
    let normalized = normalize_styles(html, opts);
    let flattened = flatten_blocks(&normalized, opts);
    let stripped = strip_attributes(&flattened);
    let repaired = repair_tags(&stripped.html);

    let diagnostics = Diagnostics {
        input_len: html.len(),
        output_len: repaired.html.len(),
        visible_len: limits::visible_len(&repaired.html),
        unwrapped_tags: stripped.unwrapped_tags,
        dropped_markup: stripped.dropped_markup,
        escaped_chars: stripped.escaped,
        repair: repaired.report,
    };

    debug!(
        output_len = diagnostics.output_len,
        visible_len = diagnostics.visible_len,
        unwrapped = diagnostics.unwrapped_tags,
        stray_closers = diagnostics.repair.stray_closers,
        closed_early = diagnostics.repair.closed_early,
        closed_at_end = diagnostics.repair.closed_at_end,
        "conversion complete"
    );

    Conversion {
        html: repaired.html,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
