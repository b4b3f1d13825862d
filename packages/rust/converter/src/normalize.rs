//! Stage 1: style normalization.
//!
//! Rewrites inline-CSS emphasis and semantic alias tags onto Telegram's
//! canonical tags. Nesting and text are left alone; attributes are stripped
//! later by [`crate::strip`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::ConvertOptions;
use crate::scan::{Token, scan};
use crate::tags::{self, CanonicalTag};

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-weight\s*:\s*(?:bold|bolder|[6-9]00)\b").expect("valid regex")
});
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-style\s*:\s*(?:italic|oblique)\b").expect("valid regex")
});
static UNDERLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)text-decoration(?:-line)?\s*:[^;]*\bunderline\b").expect("valid regex")
});
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)text-decoration(?:-line)?\s*:[^;]*\bline-through\b").expect("valid regex")
});

/// Emphasis inserted after each still-open element, innermost last, per
/// element name. A closer only ever needs the innermost open element of its
/// own name, so lookups never walk other elements.
#[derive(Default)]
struct OpenElements {
    by_name: HashMap<String, Vec<Vec<CanonicalTag>>>,
    len: usize,
}

impl OpenElements {
    fn push(&mut self, name: String, emphasis: Vec<CanonicalTag>) {
        self.by_name.entry(name).or_default().push(emphasis);
        self.len += 1;
    }

    fn pop(&mut self, name: &str) -> Option<Vec<CanonicalTag>> {
        let emphasis = self.by_name.get_mut(name)?.pop()?;
        self.len -= 1;
        Some(emphasis)
    }
}

/// Rewrite styled elements and alias tags to canonical tags.
///
/// - `style` containing bold / italic / underline / line-through wraps the
///   element's content in `<b>`, `<i>`, `<u>`, `<s>` (in that order). The
///   element itself is kept so block elements still break lines.
/// - `strong`, `em`, `ins`, `del`, `strike` become `b`, `i`, `u`, `s`.
/// - With `markdown_emphasis` set, Markdown-like emphasis in text outside
///   `<code>`/`<pre>` becomes tags as well.
///
/// Style detection is pattern-based: a `style` value the scanner cannot
/// delimit (for instance one containing an unbalanced quote) is not matched.
pub fn normalize_styles(html: &str, opts: &ConvertOptions) -> String {
    let markdown = opts.markdown_emphasis;
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let mut open = OpenElements::default();
    let mut verbatim_depth = 0usize;

    for token in scan(html) {
        match token {
            Token::Text(text) if markdown && verbatim_depth == 0 => {
                markdown_emphasis_into(text, &mut out);
            }
            Token::Tag(tag) if tag.closing => {
                if let Some(emphasis) = open.pop(&tag.name) {
                    for canonical in emphasis.iter().rev() {
                        push_tag(&mut out, *canonical, true);
                    }
                    if is_verbatim(&tag.name) {
                        verbatim_depth = verbatim_depth.saturating_sub(1);
                    }
                }
                match tags::alias_of(&tag.name) {
                    Some(canonical) => push_tag(&mut out, canonical, true),
                    None => out.push_str(tag.raw),
                }
            }
            Token::Tag(tag) => {
                match tags::alias_of(&tag.name) {
                    Some(canonical) if tag.self_closing => {
                        out.push_str(&format!("<{canonical}/>"));
                    }
                    Some(canonical) => push_tag(&mut out, canonical, false),
                    None => out.push_str(tag.raw),
                }
                if !tag.opens_element() {
                    continue;
                }

                let emphasis = tag.attr("style").map(style_emphasis).unwrap_or_default();
                for canonical in &emphasis {
                    push_tag(&mut out, *canonical, false);
                }
                if is_verbatim(&tag.name) {
                    verbatim_depth += 1;
                }
                open.push(tag.name, emphasis);
            }
            other => out.push_str(other.raw()),
        }
    }

    trace!(unclosed = open.len, "style normalization done");
    out
}

/// Canonical tags implied by an inline `style` attribute value.
fn style_emphasis(style: &str) -> Vec<CanonicalTag> {
    [
        (&*BOLD_RE, CanonicalTag::B),
        (&*ITALIC_RE, CanonicalTag::I),
        (&*UNDERLINE_RE, CanonicalTag::U),
        (&*STRIKE_RE, CanonicalTag::S),
    ]
    .into_iter()
    .filter(|(re, _)| re.is_match(style))
    .map(|(_, tag)| tag)
    .collect()
}

fn is_verbatim(name: &str) -> bool {
    CanonicalTag::from_name(name).is_some_and(CanonicalTag::is_verbatim)
}

fn push_tag(out: &mut String, tag: CanonicalTag, closing: bool) {
    out.push('<');
    if closing {
        out.push('/');
    }
    out.push_str(tag.as_str());
    out.push('>');
}

// ---------------------------------------------------------------------------
// Markdown-like emphasis
// ---------------------------------------------------------------------------

static CODE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static MD_BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid regex"));
static MD_UNDERLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_\n]+?)__").expect("valid regex"));
static MD_STRIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^~\n]+?)~~").expect("valid regex"));
static MD_ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Content must not start or end with whitespace, so "2 * 3 * 4" stays text.
    Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").expect("valid regex")
});

/// Append `text` with Markdown-like emphasis turned into tags.
///
/// Code spans are cut out first so nothing inside them is rewritten.
fn markdown_emphasis_into(text: &str, out: &mut String) {
    let mut last = 0;

    for caps in CODE_SPAN_RE.captures_iter(text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&inline_emphasis(&text[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(code.as_str());
        out.push_str("</code>");
        last = whole.end();
    }

    out.push_str(&inline_emphasis(&text[last..]));
}

fn inline_emphasis(text: &str) -> String {
    let bold = MD_BOLD_RE.replace_all(text, "<b>$1</b>");
    let underline = MD_UNDERLINE_RE.replace_all(&bold, "<u>$1</u>");
    let strike = MD_STRIKE_RE.replace_all(&underline, "<s>$1</s>");
    MD_ITALIC_RE.replace_all(&strike, "<i>$1</i>").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(html: &str, markdown: bool) -> String {
        let opts = ConvertOptions {
            markdown_emphasis: markdown,
            ..ConvertOptions::default()
        };
        normalize_styles(html, &opts)
    }

    #[test]
    fn aliases_become_canonical() {
        let result = normalize("<strong>Bold</strong> <em>Italic</em>", false);
        assert_eq!(result, "<b>Bold</b> <i>Italic</i>");

        let result = normalize("<ins>u</ins><del>d</del><strike>s</strike>", false);
        assert_eq!(result, "<u>u</u><s>d</s><s>s</s>");
    }

    #[test]
    fn alias_attributes_are_discarded() {
        let result = normalize(r#"<strong class="x" data-id="1">B</strong>"#, false);
        assert_eq!(result, "<b>B</b>");
    }

    #[test]
    fn styled_block_keeps_its_tag() {
        let result = normalize(r#"<div style="font-weight:bold">X</div>"#, false);
        assert_eq!(result, r#"<div style="font-weight:bold"><b>X</b></div>"#);
    }

    #[test]
    fn numeric_font_weights() {
        for weight in ["600", "700", "900"] {
            let html = format!(r#"<span style="font-weight: {weight}">x</span>"#);
            assert!(normalize(&html, false).contains("<b>x</b>"), "weight {weight}");
        }
        let html = r#"<span style="font-weight: 400">x</span>"#;
        assert!(!normalize(html, false).contains("<b>"));
    }

    #[test]
    fn multiple_emphases_nest_in_fixed_order() {
        let html = r#"<span style="text-decoration: underline line-through; font-style: italic; font-weight: bold">x</span>"#;
        let result = normalize(html, false);
        assert!(result.ends_with("<b><i><u><s>x</s></u></i></b></span>"), "{result}");
    }

    #[test]
    fn nested_spans_close_the_right_emphasis() {
        let html = r#"<span style="font-style:italic">a<span>b</span>c</span>d"#;
        let result = normalize(html, false);
        assert_eq!(
            result,
            r#"<span style="font-style:italic"><i>a<span>b</span>c</i></span>d"#
        );
    }

    #[test]
    fn unclosed_styled_element_leaves_emphasis_open() {
        let result = normalize(r#"<span style="font-weight:bold">x"#, false);
        assert_eq!(result, r#"<span style="font-weight:bold"><b>x"#);
    }

    #[test]
    fn closers_of_unopened_elements_under_many_open_ones() {
        let n = 30_000;
        let html = "<span>".repeat(n) + &"</div>".repeat(n);
        assert_eq!(normalize(&html, false), html);

        let html = r#"<span style="font-weight:bold">"#.to_string()
            + &"<div>".repeat(n)
            + "</span>x";
        let result = normalize(&html, false);
        assert!(result.ends_with("<div></b></span>x"), "{}", &result[result.len() - 20..]);
    }

    #[test]
    fn links_code_and_pre_pass_through() {
        let html = r#"<a href="https://example.com" target="_blank">l</a><pre class="x"><code>y</code></pre>"#;
        assert_eq!(normalize(html, false), html);
    }

    #[test]
    fn markdown_emphasis_is_opt_in() {
        let text = "**bold** and *italic*";
        assert_eq!(normalize(text, false), text);
        assert_eq!(
            normalize(text, true),
            "<b>bold</b> and <i>italic</i>"
        );
    }

    #[test]
    fn markdown_underline_strike_and_code() {
        let result = normalize("__u__ ~~s~~ `a*b*c`", true);
        assert_eq!(result, "<u>u</u> <s>s</s> <code>a*b*c</code>");
    }

    #[test]
    fn markdown_skips_code_and_pre_content() {
        let result = normalize("<pre>**not bold**</pre> **bold**", true);
        assert_eq!(result, "<pre>**not bold**</pre> <b>bold</b>");
    }

    #[test]
    fn markdown_leaves_arithmetic_alone() {
        assert_eq!(normalize("2 * 3 * 4", true), "2 * 3 * 4");
    }
}
