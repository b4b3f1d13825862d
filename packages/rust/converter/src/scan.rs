//! Single-pass tag tokenizer shared by every pipeline stage.
//!
//! The scanner walks the input once, left to right, and yields borrowed
//! tokens. It never fails: a `<` that does not start a complete construct is
//! simply part of the surrounding text.

use crate::tags;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// One piece of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text between constructs, verbatim (entities are not decoded).
    Text(&'a str),
    /// An opening, closing, or self-closing tag.
    Tag(Tag<'a>),
    /// Comment, CDATA section, DOCTYPE or other `<!...>` declaration, or a
    /// processing instruction.
    Markup(&'a str),
    /// Body of a `<script>` or `<style>` element.
    RawText(&'a str),
}

impl<'a> Token<'a> {
    /// The exact source text of this token.
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Text(s) | Token::Markup(s) | Token::RawText(s) => s,
            Token::Tag(tag) => tag.raw,
        }
    }
}

/// A tag as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Full source text, `<` through `>`.
    pub raw: &'a str,
    /// Lowercased tag name.
    pub name: String,
    /// `</name>`.
    pub closing: bool,
    /// `<name/>`.
    pub self_closing: bool,
    /// Byte offset of the `<` in the scanned input.
    pub offset: usize,
    attrs: &'a str,
}

impl<'a> Tag<'a> {
    /// Value of the first attribute called `name` (case-insensitive).
    ///
    /// Bare attributes (`<input disabled>`) have an empty value. Entities in
    /// the value are left as written.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        Attributes::new(self.attrs)
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Whether this tag starts an element that can have content and a closer.
    pub fn opens_element(&self) -> bool {
        !self.closing && !self.self_closing && !tags::is_void(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Tokenize `input`.
pub fn scan(input: &str) -> Scanner<'_> {
    Scanner {
        input,
        pos: 0,
        last_gt: input.rfind('>'),
        comment_unterminated: false,
        cdata_unterminated: false,
        dead_ends: None,
        pending: None,
        raw_text_of: None,
    }
}

/// Iterator over the [`Token`]s of a string.
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// No construct can start at or after this offset.
    last_gt: Option<usize>,
    /// A search for `-->` already ran off the end, so no later `<!--` can
    /// terminate either.
    comment_unterminated: bool,
    /// Same for `]]>`.
    cdata_unterminated: bool,
    /// Per byte, one bit per attribute-scan state from which a tag is known
    /// to run to the end of input unterminated. Allocated on the first such
    /// tag.
    dead_ends: Option<Vec<u8>>,
    /// Construct found after a run of text, returned on the next call.
    pending: Option<Token<'a>>,
    /// Set after `<script>`/`<style>`: the next token is its raw body.
    raw_text_of: Option<String>,
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }

        if let Some(name) = self.raw_text_of.take() {
            let start = self.pos;
            let end = find_raw_text_end(self.input, start, &name).unwrap_or(self.input.len());
            self.pos = end;
            if end > start {
                return Some(Token::RawText(&self.input[start..end]));
            }
        }

        let input = self.input;
        let bytes = input.as_bytes();
        let start = self.pos;
        let Some(last_gt) = self.last_gt else {
            self.pos = bytes.len();
            return (start < bytes.len()).then(|| Token::Text(&input[start..]));
        };

        let mut i = start;
        while i < last_gt {
            if bytes[i] == b'<' {
                if let Some((token, end)) = self.construct_at(i) {
                    if let Token::Tag(tag) = &token {
                        if tag.opens_element() && tags::is_raw_text(&tag.name) {
                            self.raw_text_of = Some(tag.name.clone());
                        }
                    }
                    self.pos = end;
                    if i > start {
                        self.pending = Some(token);
                        return Some(Token::Text(&input[start..i]));
                    }
                    return Some(token);
                }
            }
            i += 1;
        }

        self.pos = bytes.len();
        (start < bytes.len()).then(|| Token::Text(&input[start..]))
    }
}

impl<'a> Scanner<'a> {
    /// Try to read a construct starting at the `<` at byte `at`.
    /// Returns the token and the offset just past it.
    fn construct_at(&mut self, at: usize) -> Option<(Token<'a>, usize)> {
        let input = self.input;
        let rest = &input[at..];
        let bytes = rest.as_bytes();

        if rest.starts_with("<!--") {
            let end = at + 4 + find_once(&rest[4..], "-->", &mut self.comment_unterminated)? + 3;
            return Some((Token::Markup(&input[at..end]), end));
        }
        if bytes.len() >= 9 && bytes[..9].eq_ignore_ascii_case(b"<![cdata[") {
            let end = at + 9 + find_once(&rest[9..], "]]>", &mut self.cdata_unterminated)? + 3;
            return Some((Token::Markup(&input[at..end]), end));
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            // `at < last_gt`, so this always finds a `>`.
            let end = at + rest.find('>')? + 1;
            return Some((Token::Markup(&input[at..end]), end));
        }

        let closing = bytes.get(1) == Some(&b'/');
        let name_start = if closing { 2 } else { 1 };
        if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
            return None;
        }

        let mut name_end = name_start;
        while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
            name_end += 1;
        }
        match bytes.get(name_end) {
            Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {}
            _ => return None,
        }

        let gt = self.find_tag_end(at + name_end)? - at;
        let attrs = &rest[name_end..gt];
        let tag = Tag {
            raw: &rest[..=gt],
            name: rest[name_start..name_end].to_ascii_lowercase(),
            closing,
            self_closing: !closing && attrs.trim_end().ends_with('/'),
            offset: at,
            attrs: if closing { "" } else { attrs },
        };
        Some((Token::Tag(tag), at + gt + 1))
    }

    /// Offset of the `>` ending the tag whose attributes start at `from`.
    fn find_tag_end(&mut self, from: usize) -> Option<usize> {
        let input = self.input;
        let bytes = input.as_bytes();
        if let Some(gt) = tag_end(bytes, from, self.dead_ends.as_deref_mut(), false) {
            return Some(gt);
        }
        let dead = self.dead_ends.get_or_insert_with(|| vec![0; bytes.len()]);
        tag_end(bytes, from, Some(dead.as_mut_slice()), true);
        None
    }
}

/// `haystack.find(needle)`, remembering a miss in `missing`.
///
/// Callers search suffixes of one input left to right, so once the needle is
/// absent from one suffix it is absent from every later one.
fn find_once(haystack: &str, needle: &str, missing: &mut bool) -> Option<usize> {
    if *missing {
        return None;
    }
    let found = haystack.find(needle);
    *missing = found.is_none();
    found
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

/// Index of the `>` closing a tag, skipping `>` inside quoted attribute values.
///
/// The walk gives up on reaching a state marked in `dead`; with `mark` set it
/// marks every state it passes through.
fn tag_end(bytes: &[u8], from: usize, mut dead: Option<&mut [u8]>, mark: bool) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_eq = false;

    for (k, &b) in bytes.iter().enumerate().skip(from) {
        if let Some(dead) = dead.as_deref_mut() {
            let state = match quote {
                None => 0,
                Some(b'"') => 2,
                Some(_) => 4,
            } + u8::from(after_eq);
            let bit = 1 << state;
            if dead[k] & bit != 0 {
                return None;
            }
            if mark {
                dead[k] |= bit;
            }
        }

        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'>' => return Some(k),
            b'"' | b'\'' if after_eq => {
                quote = Some(b);
                continue;
            }
            b'=' => after_eq = true,
            _ if b.is_ascii_whitespace() => {}
            _ => after_eq = false,
        }
    }
    None
}

/// Offset of the `</name` that ends a raw-text element body.
fn find_raw_text_end(input: &str, from: usize, name: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let needle = name.as_bytes();
    let mut k = from;

    while let Some(off) = input[k..].find("</") {
        let at = k + off;
        let name_at = at + 2;
        let name_end = name_at + needle.len();
        if name_end <= bytes.len()
            && bytes[name_at..name_end].eq_ignore_ascii_case(needle)
            && !bytes.get(name_end).is_some_and(|b| is_name_byte(*b))
        {
            return Some(at);
        }
        k = name_at;
    }
    None
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Iterator over `(name, value)` pairs of a tag's attribute region.
struct Attributes<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Attributes<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.src.as_bytes();
        let len = bytes.len();

        loop {
            while self.pos < len && (bytes[self.pos].is_ascii_whitespace() || bytes[self.pos] == b'/')
            {
                self.pos += 1;
            }
            if self.pos >= len {
                return None;
            }

            let name_start = self.pos;
            while self.pos < len
                && !bytes[self.pos].is_ascii_whitespace()
                && !matches!(bytes[self.pos], b'=' | b'/')
            {
                self.pos += 1;
            }
            if self.pos == name_start {
                // Stray '='.
                self.pos += 1;
                continue;
            }
            let name = &self.src[name_start..self.pos];

            let mut p = self.pos;
            while p < len && bytes[p].is_ascii_whitespace() {
                p += 1;
            }
            if p >= len || bytes[p] != b'=' {
                return Some((name, ""));
            }

            p += 1;
            while p < len && bytes[p].is_ascii_whitespace() {
                p += 1;
            }
            if p < len && matches!(bytes[p], b'"' | b'\'') {
                let quote = bytes[p] as char;
                let value_start = p + 1;
                let value_end = self.src[value_start..]
                    .find(quote)
                    .map_or(len, |off| value_start + off);
                self.pos = (value_end + 1).min(len);
                return Some((name, &self.src[value_start..value_end]));
            }

            let value_start = p;
            while p < len && !bytes[p].is_ascii_whitespace() {
                p += 1;
            }
            self.pos = p;
            return Some((name, &self.src[value_start..p]));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_of(input: &str) -> Vec<(String, bool, bool)> {
        scan(input)
            .filter_map(|t| match t {
                Token::Tag(tag) => Some((tag.name, tag.closing, tag.self_closing)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn splits_text_and_tags() {
        let tokens: Vec<_> = scan("a<b>c</b>d").collect();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::Text("a"));
        assert_eq!(tokens[2], Token::Text("c"));
        assert_eq!(tokens[4], Token::Text("d"));
        let Token::Tag(open) = &tokens[1] else {
            panic!("expected tag, got {:?}", tokens[1]);
        };
        assert_eq!(open.name, "b");
        assert_eq!(open.offset, 1);
        assert!(!open.closing);
    }

    #[test]
    fn tokens_reassemble_the_input() {
        let input = "x <p class=\"a>b\">y<!-- c --></p><br/>z < 3 & 4";
        let rebuilt: String = scan(input).map(|t| t.raw()).collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn lowercases_names_and_flags_closers() {
        assert_eq!(
            tags_of("<STRONG>x</Strong><br/>"),
            vec![
                ("strong".to_string(), false, false),
                ("strong".to_string(), true, false),
                ("br".to_string(), false, true),
            ]
        );
    }

    #[test]
    fn quoted_gt_does_not_end_tag() {
        let tokens: Vec<_> = scan(r#"<span title="a > b">x</span>"#).collect();
        let Token::Tag(tag) = &tokens[0] else {
            panic!("expected tag");
        };
        assert_eq!(tag.attr("title"), Some("a > b"));
        assert_eq!(tokens[1], Token::Text("x"));
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        let tokens: Vec<_> = scan("1 < 2 and 3 > 2").collect();
        assert_eq!(tokens, vec![Token::Text("1 < 2 and 3 > 2")]);

        let tokens: Vec<_> = scan("<b").collect();
        assert_eq!(tokens, vec![Token::Text("<b")]);
    }

    #[test]
    fn unterminated_tag_is_text_but_later_tags_still_scan() {
        let tokens: Vec<_> = scan("<a href=\"x>y</b>").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], Token::Text("<a href=\"x>y"));
        assert!(matches!(&tokens[1], Token::Tag(t) if t.closing && t.name == "b"));
    }

    #[test]
    fn markup_constructs() {
        let tokens: Vec<_> =
            scan("<!DOCTYPE html><!-- note --><?xml version=\"1.0\"?><![CDATA[x<y]]>t").collect();
        assert_eq!(tokens.len(), 5);
        assert!(tokens[..4].iter().all(|t| matches!(t, Token::Markup(_))));
        assert_eq!(tokens[4], Token::Text("t"));
    }

    #[test]
    fn unterminated_comment_is_text() {
        let tokens: Vec<_> = scan("a<!-- b <i>c</i>").collect();
        assert_eq!(tokens[0], Token::Text("a<!-- b "));
        assert!(matches!(&tokens[1], Token::Tag(t) if t.name == "i"));
    }

    #[test]
    fn many_unterminated_comments_scan_as_text() {
        let input = "<!--a".repeat(20_000) + "<b>x</b>";
        let tokens: Vec<_> = scan(&input).collect();
        assert_eq!(tokens[0], Token::Text(&input[..input.len() - 8]));
        assert!(matches!(&tokens[1], Token::Tag(t) if t.name == "b"));

        let input = "<![CDATA[".repeat(20_000) + ">";
        assert_eq!(scan(&input).count(), 1);
    }

    #[test]
    fn many_tags_with_unclosed_quotes_scan_as_text() {
        let input = "<a x=".repeat(20_000) + "\">";
        let tokens: Vec<_> = scan(&input).collect();
        assert_eq!(tokens, vec![Token::Text(&input)]);

        let input = "<a x=\"".to_string() + &"<b>".repeat(10_000);
        let tokens: Vec<_> = scan(&input).collect();
        assert_eq!(tokens[0], Token::Text("<a x=\""));
        assert_eq!(tokens.len(), 10_001);
    }

    #[test]
    fn script_body_is_raw_text() {
        let tokens: Vec<_> = scan("<script>if (a<b) {}</b></SCRIPT>after").collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1], Token::RawText("if (a<b) {}</b>"));
        assert!(matches!(&tokens[2], Token::Tag(t) if t.closing && t.name == "script"));
        assert_eq!(tokens[3], Token::Text("after"));
    }

    #[test]
    fn unterminated_style_runs_to_end() {
        let tokens: Vec<_> = scan("<style>p { color: red }").collect();
        assert_eq!(tokens[1], Token::RawText("p { color: red }"));
    }

    #[test]
    fn attribute_forms() {
        let tokens: Vec<_> =
            scan(r#"<a HREF='https://x.test/?a=1&b=2' data-x=plain hidden title = "t">"#).collect();
        let Token::Tag(tag) = &tokens[0] else {
            panic!("expected tag");
        };
        assert_eq!(tag.attr("href"), Some("https://x.test/?a=1&b=2"));
        assert_eq!(tag.attr("data-x"), Some("plain"));
        assert_eq!(tag.attr("hidden"), Some(""));
        assert_eq!(tag.attr("title"), Some("t"));
        assert_eq!(tag.attr("missing"), None);
    }

    #[test]
    fn void_and_self_closing_do_not_open() {
        let tokens: Vec<_> = scan("<br><img src=x /><b/><b>").collect();
        let opens: Vec<bool> = tokens
            .iter()
            .map(|t| match t {
                Token::Tag(tag) => tag.opens_element(),
                _ => false,
            })
            .collect();
        assert_eq!(opens, vec![false, false, false, true]);
    }

    #[test]
    fn non_ascii_text_around_tags() {
        let tokens: Vec<_> = scan("Привет <b>мир</b> 👋").collect();
        assert_eq!(tokens[0], Token::Text("Привет "));
        assert_eq!(tokens[2], Token::Text("мир"));
        assert_eq!(tokens[4], Token::Text(" 👋"));
    }
}
