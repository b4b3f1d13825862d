//! Stage 4: tag-balance repair, and the well-formedness check built on the
//! same stack walk.

use serde::Serialize;
use tracing::trace;

use crate::scan::{Token, scan};
use crate::tags::CanonicalTag;

/// What the repairer had to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Canonical closing tags with no matching opener, dropped.
    pub stray_closers: usize,
    /// Tags force-closed because a closer matched a tag deeper in the stack.
    pub closed_early: usize,
    /// Tags still open at end of input, closed there.
    pub closed_at_end: usize,
    /// Non-canonical or self-closing tags dropped.
    pub unsupported_dropped: usize,
}

impl RepairReport {
    /// True when the input was already balanced canonical HTML.
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Output of [`repair_tags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub html: String,
    pub report: RepairReport,
}

/// Balance the canonical tags of `html`.
///
/// Walks the tokens once with a stack of open canonical tags:
/// - an opener is kept and pushed;
/// - a closer matching the top is kept and popped;
/// - a closer matching a tag deeper in the stack first closes every tag above
///   it (they are not reopened);
/// - any other closer is dropped;
/// - tags still open at the end are closed in LIFO order.
///
/// Comments, declarations and `<script>`/`<style>` bodies are dropped. Text
/// is copied verbatim.
pub fn repair_tags(html: &str) -> Repaired {
    let mut out = String::with_capacity(html.len() + 16);
    let mut stack: Vec<CanonicalTag> = Vec::new();
    // How many of each tag are on the stack, so a stray closer is rejected
    // without walking it.
    let mut open = [0usize; CanonicalTag::ALL.len()];
    let mut report = RepairReport::default();

    for token in scan(html) {
        let tag = match token {
            Token::Text(text) => {
                out.push_str(text);
                continue;
            }
            Token::Markup(_) | Token::RawText(_) => continue,
            Token::Tag(tag) => tag,
        };

        let Some(canonical) = CanonicalTag::from_name(&tag.name) else {
            report.unsupported_dropped += 1;
            continue;
        };

        if !tag.closing {
            if tag.self_closing {
                report.unsupported_dropped += 1;
                continue;
            }
            out.push_str(tag.raw);
            stack.push(canonical);
            open[canonical.index()] += 1;
            continue;
        }

        if open[canonical.index()] == 0 {
            report.stray_closers += 1;
            continue;
        }
        // Everything walked past is drained below, so the walk is paid for
        // by the pushes.
        let Some(idx) = stack.iter().rposition(|tag| *tag == canonical) else {
            report.stray_closers += 1;
            continue;
        };
        let crossed = stack.len() - 1 - idx;
        if crossed > 0 {
            trace!(tag = %canonical, crossed, "closing crossed tags early");
        }
        report.closed_early += crossed;
        for closed in stack.drain(idx..).rev() {
            open[closed.index()] -= 1;
            push_closer(&mut out, closed);
        }
    }

    report.closed_at_end = stack.len();
    for open in stack.drain(..).rev() {
        push_closer(&mut out, open);
    }

    Repaired { html: out, report }
}

fn push_closer(out: &mut String, tag: CanonicalTag) {
    out.push_str("</");
    out.push_str(tag.as_str());
    out.push('>');
}

/// Whether every opened element in `html` is closed in LIFO order.
///
/// Applies to any tag name, not only canonical ones. Void and self-closing
/// tags never open an element; comments and declarations are ignored.
pub fn is_well_formed(html: &str) -> bool {
    let mut stack: Vec<String> = Vec::new();

    for token in scan(html) {
        let Token::Tag(tag) = token else {
            continue;
        };
        if tag.closing {
            if stack.pop().as_deref() != Some(tag.name.as_str()) {
                return false;
            }
        } else if tag.opens_element() {
            stack.push(tag.name);
        }
    }

    stack.is_empty()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_unclosed_tag_at_end() {
        let repaired = repair_tags("<b>Hi");
        assert_eq!(repaired.html, "<b>Hi</b>");
        assert_eq!(repaired.report.closed_at_end, 1);
    }

    #[test]
    fn crossing_closes_intervening_tags() {
        let repaired = repair_tags("<b>A<i>B</b>C</i>");
        assert_eq!(repaired.html, "<b>A<i>B</i></b>C");
        assert_eq!(
            repaired.report,
            RepairReport {
                stray_closers: 1,
                closed_early: 1,
                closed_at_end: 0,
                unsupported_dropped: 0,
            }
        );
    }

    #[test]
    fn drops_stray_closer() {
        let repaired = repair_tags("</b>Hello");
        assert_eq!(repaired.html, "Hello");
        assert_eq!(repaired.report.stray_closers, 1);
    }

    #[test]
    fn balanced_input_is_untouched() {
        let html = r#"<b>a <i>b</i></b> <a href="https://t.me">c</a> <pre><code>d</code></pre>"#;
        let repaired = repair_tags(html);
        assert_eq!(repaired.html, html);
        assert!(repaired.report.is_clean());
    }

    #[test]
    fn deep_crossing_closes_in_lifo_order() {
        let repaired = repair_tags("<b><i><u><s>x</b>y");
        assert_eq!(repaired.html, "<b><i><u><s>x</s></u></i></b>y");
        assert_eq!(repaired.report.closed_early, 3);
    }

    #[test]
    fn repeated_tag_matches_innermost() {
        let repaired = repair_tags("<b>1<b>2</b>3");
        assert_eq!(repaired.html, "<b>1<b>2</b>3</b>");
    }

    #[test]
    fn unsupported_and_self_closing_tags_are_dropped() {
        let repaired = repair_tags("<span>a</span><b/><tg-spoiler>b</tg-spoiler>");
        assert_eq!(repaired.html, "ab");
        assert_eq!(repaired.report.unsupported_dropped, 5);
    }

    #[test]
    fn many_stray_closers_under_a_deep_stack() {
        let n = 50_000;
        let input = "<b>".repeat(n) + &"</i>".repeat(n);
        let repaired = repair_tags(&input);
        assert_eq!(repaired.report.stray_closers, n);
        assert_eq!(repaired.report.closed_at_end, n);
        assert_eq!(repaired.html, "<b>".repeat(n) + &"</b>".repeat(n));
    }

    #[test]
    fn markup_is_dropped() {
        assert_eq!(repair_tags("a<!-- x -->b").html, "ab");
    }

    #[test]
    fn repaired_output_is_well_formed() {
        for input in ["<b>", "</i><i>", "<b><i></b></i>", "<a href=x><b>t</a>", "x</pre><pre>"] {
            let repaired = repair_tags(input);
            assert!(is_well_formed(&repaired.html), "{input} -> {}", repaired.html);
        }
    }

    #[test]
    fn well_formedness() {
        assert!(is_well_formed(""));
        assert!(is_well_formed("plain < text"));
        assert!(is_well_formed("<p>a<br>b<img src=x/></p><!-- <b> -->"));
        assert!(is_well_formed("<div><b>x</b></div>"));
        assert!(!is_well_formed("<b>x"));
        assert!(!is_well_formed("x</b>"));
        assert!(!is_well_formed("<b><i>x</b></i>"));
    }
}
