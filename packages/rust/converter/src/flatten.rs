//! Stage 2: block flattening.
//!
//! Telegram messages have no block elements, so paragraphs, headings and lists
//! become line breaks and bullet markers. Line breaks are not written when a
//! block closes but recorded as *pending*; they are emitted right before the
//! next visible content, which is what lets `</p><p>` and `<br></p>` collapse
//! into a single break.

use tracing::trace;

use tgformat_shared::OrderedListStyle;

use crate::ConvertOptions;
use crate::scan::{Tag, Token, scan};
use crate::tags::CanonicalTag;

const BULLET: &str = "• ";

/// Block-level elements the flattener understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Paragraph,
    /// `div` and elements that render like it.
    Div,
    Heading,
    List { ordered: bool },
    Item,
    Break,
}

fn classify(name: &str) -> Option<Block> {
    let block = match name {
        "p" => Block::Paragraph,
        "div" | "section" | "article" | "header" | "footer" | "nav" | "aside" | "main"
        | "blockquote" | "figure" | "figcaption" | "address" | "table" | "tr" => Block::Div,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Block::Heading,
        "ul" => Block::List { ordered: false },
        "ol" => Block::List { ordered: true },
        "li" => Block::Item,
        "br" => Block::Break,
        _ => return None,
    };
    Some(block)
}

struct ListFrame {
    ordered: bool,
    next: i64,
    /// An `<li>` of this list has not been closed yet.
    item_open: bool,
}

/// A heading being rendered as `<b>...</b>`, with the canonical inline tags
/// opened inside it that are still open.
#[derive(Default)]
struct HeadingFrame {
    inline: Vec<CanonicalTag>,
    open: [usize; CanonicalTag::ALL.len()],
}

impl HeadingFrame {
    fn opened(&mut self, tag: CanonicalTag) {
        self.inline.push(tag);
        self.open[tag.index()] += 1;
    }

    fn closed(&mut self, tag: CanonicalTag) {
        if self.open[tag.index()] == 0 {
            return;
        }
        if let Some(idx) = self.inline.iter().rposition(|t| *t == tag) {
            for dropped in self.inline.drain(idx..) {
                self.open[dropped.index()] -= 1;
            }
        }
    }
}

/// Replace block structure in `html` with newlines and list markers.
///
/// Inline tags, text and markup pass through unchanged.
pub fn flatten_blocks(html: &str, opts: &ConvertOptions) -> String {
    let mut flattener = Flattener::new(html.len(), opts);
    // Whitespace seen right after a block tag, dropped if another block tag
    // follows (tidy mode only).
    let mut held: Vec<&str> = Vec::new();

    for token in scan(html) {
        let block = match &token {
            Token::Tag(tag) => classify(&tag.name),
            _ => None,
        };
        let holdable = opts.tidy_whitespace
            && flattener.after_block
            && matches!(token, Token::Text(text) if text.contains('\n') && text.trim().is_empty());

        match (&token, block) {
            (_, Some(_)) => held.clear(),
            (Token::Markup(_), None) => {}
            _ if holdable => {}
            _ => {
                for ws in held.drain(..) {
                    flattener.text(ws);
                }
            }
        }

        match token {
            Token::Text(text) if holdable => held.push(text),
            Token::Text(text) => flattener.text(text),
            Token::Tag(tag) => match block {
                Some(block) => flattener.block(&tag, block),
                None => flattener.inline(&tag),
            },
            Token::Markup(raw) | Token::RawText(raw) => flattener.out.push_str(raw),
        }
    }

    flattener.finish()
}

struct Flattener<'o> {
    opts: &'o ConvertOptions,
    out: String,
    /// Line breaks owed before the next visible content.
    pending: usize,
    lists: Vec<ListFrame>,
    /// Open `ul` and `ol` elements, indexed by `ordered`.
    open_lists: [usize; 2],
    headings: Vec<HeadingFrame>,
    /// The last significant token was a block tag (or nothing yet).
    after_block: bool,
    /// Nothing but spaces and tabs since the last newline in `out`.
    line_start: bool,
}

impl<'o> Flattener<'o> {
    fn new(capacity: usize, opts: &'o ConvertOptions) -> Self {
        Self {
            opts,
            out: String::with_capacity(capacity),
            pending: 0,
            lists: Vec::new(),
            open_lists: [0; 2],
            headings: Vec::new(),
            after_block: true,
            line_start: true,
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.flush();
        self.out.push_str(text);
        self.after_block = false;
        let blank = |s: &str| s.bytes().all(|b| b == b' ' || b == b'\t');
        match text.rfind('\n') {
            Some(nl) => self.line_start = blank(&text[nl + 1..]),
            None => self.line_start &= blank(text),
        }
    }

    fn inline(&mut self, tag: &Tag<'_>) {
        if !tag.closing {
            self.flush();
        }
        self.out.push_str(tag.raw);
        self.after_block = false;
        self.line_start = false;

        let (Some(heading), Some(canonical)) =
            (self.headings.last_mut(), CanonicalTag::from_name(&tag.name))
        else {
            return;
        };
        if tag.closing {
            heading.closed(canonical);
        } else if tag.opens_element() {
            heading.opened(canonical);
        }
    }

    fn block(&mut self, tag: &Tag<'_>, block: Block) {
        self.after_block = true;

        if tag.closing {
            match block {
                Block::Paragraph => self.request(self.opts.paragraph_break.newlines()),
                Block::Div => self.request(1),
                Block::Item => {
                    if let Some(list) = self.lists.last_mut() {
                        list.item_open = false;
                    }
                    self.request(1);
                }
                Block::Heading => {
                    if let Some(heading) = self.headings.pop() {
                        for open in heading.inline.iter().rev() {
                            self.out.push_str("</");
                            self.out.push_str(open.as_str());
                            self.out.push('>');
                        }
                        self.out.push_str("</b>");
                        self.line_start = false;
                    }
                    self.request(2);
                }
                Block::List { ordered } => self.close_list(ordered),
                Block::Break => {}
            }
            return;
        }

        if block == Block::Break {
            self.pending += 1;
            return;
        }

        // A block that starts mid-line starts on a new one.
        if !self.line_start {
            self.request(1);
        }

        match block {
            Block::Heading => {
                self.flush();
                self.out.push_str("<b>");
                self.line_start = false;
                self.headings.push(HeadingFrame::default());
            }
            Block::List { ordered } => {
                let start = tag
                    .attr("start")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(1);
                self.lists.push(ListFrame {
                    ordered,
                    next: start,
                    item_open: false,
                });
                self.open_lists[usize::from(ordered)] += 1;
            }
            Block::Item => {
                self.flush();
                let marker = self.item_marker();
                self.out.push_str(&marker);
                self.line_start = false;
                if let Some(list) = self.lists.last_mut() {
                    list.item_open = true;
                }
            }
            Block::Paragraph | Block::Div | Block::Break => {}
        }
    }

    /// List wrappers produce no text. An item the source left open ends with
    /// its list, as if it had been closed.
    fn close_list(&mut self, ordered: bool) {
        if self.open_lists[usize::from(ordered)] == 0 {
            return;
        }
        let Some(idx) = self.lists.iter().rposition(|l| l.ordered == ordered) else {
            return;
        };
        let mut item_open = false;
        for list in self.lists.drain(idx..) {
            self.open_lists[usize::from(list.ordered)] -= 1;
            item_open |= list.item_open;
        }
        if item_open {
            self.request(1);
        }
    }

    fn item_marker(&mut self) -> String {
        if self.opts.ordered_lists == OrderedListStyle::Numbered {
            if let Some(list) = self.lists.last_mut().filter(|l| l.ordered) {
                let n = list.next;
                list.next += 1;
                return format!("{n}. ");
            }
        }
        BULLET.to_string()
    }

    fn request(&mut self, newlines: usize) {
        self.pending = self.pending.max(newlines);
    }

    fn flush(&mut self) {
        let mut newlines = std::mem::take(&mut self.pending);
        if newlines == 0 {
            return;
        }
        if self.opts.tidy_whitespace {
            if self.out.is_empty() {
                return;
            }
            let trailing = self.out.bytes().rev().take_while(|b| *b == b'\n').count();
            newlines = newlines.min(2usize.saturating_sub(trailing));
        }
        self.out.extend(std::iter::repeat_n('\n', newlines));
        if newlines > 0 {
            self.line_start = true;
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        trace!(
            open_lists = self.lists.len(),
            open_headings = self.headings.len(),
            "block flattening done"
        );
        self.out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tgformat_shared::ParagraphBreak;

    fn flatten(html: &str) -> String {
        flatten_blocks(html, &ConvertOptions::default())
    }

    fn tidy() -> ConvertOptions {
        ConvertOptions {
            tidy_whitespace: true,
            ..ConvertOptions::default()
        }
    }

    #[test]
    fn paragraphs_become_lines() {
        assert_eq!(flatten("<p>Line one</p><p>Line two</p>"), "Line one\nLine two\n");
    }

    #[test]
    fn double_paragraph_break() {
        let opts = ConvertOptions {
            paragraph_break: ParagraphBreak::Double,
            ..ConvertOptions::default()
        };
        assert_eq!(
            flatten_blocks("<p>a</p><p>b</p>", &opts),
            "a\n\nb\n\n"
        );
    }

    #[test]
    fn div_and_section_like_blocks() {
        assert_eq!(flatten("<div>a</div><section>b</section>c"), "a\nb\nc");
        assert_eq!(flatten("<blockquote>q</blockquote>"), "q\n");
    }

    #[test]
    fn headings_become_bold() {
        assert_eq!(flatten("<h2 id=\"t\">Title</h2>Body"), "<b>Title</b>\n\nBody");
    }

    #[test]
    fn inline_closer_precedes_pending_break() {
        assert_eq!(flatten("<p><b>x</b></p><p>y</p>"), "<b>x</b>\ny\n");
        assert_eq!(flatten("<p><i>x</p></i>"), "<i>x</i>\n");
    }

    #[test]
    fn breaks_add_up_and_merge_with_closers() {
        assert_eq!(flatten("a<br>b<br/><br>c"), "a\nb\n\nc");
        assert_eq!(flatten("<p>a<br></p><p>b</p>"), "a\nb\n");
    }

    #[test]
    fn block_opened_mid_line_starts_new_line() {
        assert_eq!(flatten("text<p>para</p>"), "text\npara\n");
        assert_eq!(flatten("<div>a<div>b</div></div>"), "a\nb\n");
    }

    #[test]
    fn bullet_lists() {
        assert_eq!(flatten("<ul><li>one</li><li>two</li></ul>"), "• one\n• two\n");
    }

    #[test]
    fn nested_lists_are_not_indented() {
        assert_eq!(
            flatten("<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"),
            "• a\n• b\n• c\n"
        );
    }

    #[test]
    fn ordered_lists_are_bulleted_by_default() {
        assert_eq!(flatten("<ol><li>x</li><li>y</li></ol>"), "• x\n• y\n");
    }

    #[test]
    fn numbered_ordered_lists() {
        let opts = ConvertOptions {
            ordered_lists: OrderedListStyle::Numbered,
            ..ConvertOptions::default()
        };
        let html = r#"<ol start="3"><li>c</li><li>d<ul><li>in</li></ul></li><li>e</li></ol><ol><li>a</li></ol>"#;
        assert_eq!(
            flatten_blocks(html, &opts),
            "3. c\n4. d\n• in\n5. e\n1. a\n"
        );
    }

    #[test]
    fn inline_tags_and_markup_pass_through() {
        let html = r#"<a href="x">l</a><!-- c --><span class="y">s</span>"#;
        assert_eq!(flatten(html), html);
    }

    #[test]
    fn untidy_keeps_source_whitespace() {
        assert_eq!(flatten("<ul>\n<li>a</li>\n</ul>"), "\n• a\n\n");
    }

    #[test]
    fn indentation_does_not_count_as_mid_line() {
        assert_eq!(flatten("<ul>\n  <li>a</li>\n</ul>"), "\n  • a\n\n");
        assert_eq!(flatten("x\n\t<p>y</p>"), "x\n\ty\n");
    }

    #[test]
    fn list_wrappers_add_nothing() {
        assert_eq!(flatten("<ul><li>a</li></ul>b"), "• a\nb");
        assert_eq!(flatten("<ol></ol>x"), "x");
    }

    #[test]
    fn unclosed_item_ends_with_its_list() {
        assert_eq!(flatten("<ul><li>a</ul>b"), "• a\nb");
        assert_eq!(flatten("a</ul>b"), "ab");
    }

    #[test]
    fn heading_closes_inline_tags_left_open_inside() {
        assert_eq!(
            flatten("<h1><b>T</h1><p>body</p>"),
            "<b><b>T</b></b>\n\nbody\n"
        );
        assert_eq!(
            flatten("<h2><i>a<u>b</u></h2>"),
            "<b><i>a<u>b</u></i></b>\n\n"
        );
    }

    #[test]
    fn stray_heading_closer_only_breaks_the_line() {
        assert_eq!(flatten("a</h3>b"), "a\n\nb");
    }

    #[test]
    fn tidy_drops_indentation_between_blocks() {
        let html = "\n<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>\n<p>c</p>\n";
        assert_eq!(flatten_blocks(html, &tidy()), "• a\n• b\nc\n");
    }

    #[test]
    fn tidy_caps_consecutive_newlines() {
        assert_eq!(flatten_blocks("a<br><br><br><br>b", &tidy()), "a\n\nb");
        assert_eq!(flatten_blocks("<br><br>a", &tidy()), "a");
    }

    #[test]
    fn tidy_keeps_whitespace_between_inline_content() {
        assert_eq!(flatten_blocks("<b>a</b>\n<i>b</i>", &tidy()), "<b>a</b>\n<i>b</i>");
    }
}
