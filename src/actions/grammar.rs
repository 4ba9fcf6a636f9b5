//! Hand-written tokenizer for the action call syntax.
//!
//! The accepted shape is `name(key='value', key="value", key=bare)`. Values
//! are read in a single forward pass with no backtracking, so adversarial
//! model output costs linear time at worst.

use crate::actions::types::{BoundingBox, Coordinate, Point};

/// Label the extractor puts in front of every expression it emits.
pub const ACTION_LABEL: &str = "Action:";

/// Name and raw argument text of a call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParts<'a> {
    /// Lowercased call name. For text that is not a call this is the whole
    /// lowercased expression.
    pub name: String,
    pub args: &'a str,
}

/// Removes a leading `Action:` label (any case) and surrounding whitespace.
pub fn strip_label(expression: &str) -> &str {
    let raw = expression.trim();
    match raw.get(..ACTION_LABEL.len()) {
        Some(head) if head.eq_ignore_ascii_case(ACTION_LABEL) => raw[ACTION_LABEL.len()..].trim(),
        _ => raw,
    }
}

/// Splits `name(args)` into its parts. Text that does not have the call shape
/// comes back as a pass-through whose name is the lowercased text and whose
/// argument list is empty.
pub fn split_call(expression: &str) -> CallParts<'_> {
    let raw = strip_label(expression);
    match try_split_call(raw) {
        Some((name, args)) => CallParts {
            name: name.to_ascii_lowercase(),
            args: args.trim(),
        },
        None => CallParts {
            name: raw.to_lowercase(),
            args: "",
        },
    }
}

fn try_split_call(raw: &str) -> Option<(&str, &str)> {
    let mut cursor = Cursor::new(raw);
    let name = cursor.ident()?;
    cursor.skip_ws();
    if !cursor.eat('(') {
        return None;
    }
    let body = cursor.rest();
    let body = body.strip_suffix(')')?;
    Some((name, body))
}

/// Tokenizes a `key=value` list. Keys are lowercased; a key that appears more
/// than once keeps every occurrence, and lookups take the first. Malformed
/// entries are skipped up to the next top-level comma.
pub fn parse_arguments(args: &str) -> Vec<(String, String)> {
    let mut cursor = Cursor::new(args);
    let mut out = Vec::new();

    loop {
        cursor.skip_ws();
        if cursor.at_end() {
            break;
        }
        if cursor.eat(',') {
            continue;
        }

        let Some(key) = cursor.ident() else {
            cursor.skip_entry();
            continue;
        };
        let key = key.to_ascii_lowercase();
        cursor.skip_ws();
        if !cursor.eat('=') {
            cursor.skip_entry();
            continue;
        }
        cursor.skip_ws();

        let value = match cursor.peek() {
            Some(quote @ ('\'' | '"')) => {
                cursor.bump();
                match cursor.quoted(quote) {
                    Some(v) => v,
                    // Unterminated string: nothing after it can be trusted.
                    None => break,
                }
            }
            _ => cursor.bare(),
        };
        out.push((key, value));
    }

    out
}

/// First value bound to `name` in an argument list.
pub fn find_argument<'a>(args: &'a [(String, String)], name: &str) -> Option<&'a str> {
    args.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Parses a point literal such as `<point>512 384</point>`, `512,384` or
/// `[100, 100, 300, 300]`. Exactly four numbers make a box; otherwise the
/// first two numbers make a point. Non-finite numbers are rejected.
pub fn parse_point_literal(text: &str) -> Option<Coordinate> {
    let lowered = text.to_ascii_lowercase();
    let cleaned = lowered.replace("<point>", " ").replace("</point>", " ");
    let cleaned = cleaned.trim().trim_matches(|c| matches!(c, '[' | ']' | '(' | ')'));

    let parts: Vec<&str> = cleaned
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }

    if parts.len() == 4 {
        if let Some(n) = parse_numbers(&parts) {
            return Some(Coordinate::Box(BoundingBox::new(n[0], n[1], n[2], n[3])));
        }
    }

    let n = parse_numbers(&parts[..2])?;
    Some(Coordinate::Point(Point::new(n[0], n[1])))
}

/// Running count of unescaped `quote` bytes; entry `i` covers `src[..i]`.
/// Quotes are ASCII, so byte offsets never land inside a multi-byte char.
fn quote_prefix(src: &str, quote: u8) -> Vec<u32> {
    let bytes = src.as_bytes();
    let mut counts = Vec::with_capacity(bytes.len() + 1);
    let mut seen = 0u32;
    counts.push(seen);
    for (i, &b) in bytes.iter().enumerate() {
        if b == quote && (i == 0 || bytes[i - 1] != b'\\') {
            seen += 1;
        }
        counts.push(seen);
    }
    counts
}

fn parse_numbers(parts: &[&str]) -> Option<Vec<f64>> {
    parts
        .iter()
        .map(|p| p.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    /// Unescaped `'` seen before each byte offset.
    single_quotes: Vec<u32>,
    /// Unescaped `"` seen before each byte offset.
    double_quotes: Vec<u32>,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            single_quotes: quote_prefix(src, b'\''),
            double_quotes: quote_prefix(src, b'"'),
        }
    }

    /// Unescaped `quote` characters in `src[from..]`.
    fn quotes_after(&self, quote: char, from: usize) -> u32 {
        let counts = if quote == '"' {
            &self.double_quotes
        } else {
            &self.single_quotes
        };
        let from = from.min(self.src.len());
        counts[self.src.len()] - counts[from]
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        Some(&self.src[start..self.pos])
    }

    /// Reads up to the closing `quote`. A backslash directly before the quote
    /// character escapes it only when an odd number of unescaped quotes
    /// follow, i.e. when something later can still close the string.
    /// Otherwise the backslash is literal and the quote closes, so values
    /// such as `'C:\'` end where they look like they end. Every other
    /// backslash is kept verbatim.
    fn quoted(&mut self, quote: char) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                return Some(value);
            }
            if c == '\\'
                && self.peek() == Some(quote)
                && self.quotes_after(quote, self.pos + quote.len_utf8()) % 2 == 1
            {
                self.bump();
                value.push(quote);
                continue;
            }
            value.push(c);
        }
        None
    }

    /// Unquoted value: everything up to the next comma outside brackets.
    fn bare(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => break,
                _ => {}
            }
            self.bump();
        }
        self.src[start..self.pos].trim().to_string()
    }

    /// Skips a malformed entry, stepping over quoted strings so that commas
    /// inside them do not end the skip early.
    fn skip_entry(&mut self) {
        while let Some(c) = self.bump() {
            match c {
                ',' => return,
                '\'' | '"' => {
                    if self.quoted(c).is_none() {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_labelled_call() {
        let parts = split_call("Action: Click(point='<point>1 2</point>')");
        assert_eq!(parts.name, "click");
        assert_eq!(parts.args, "point='<point>1 2</point>'");
    }

    #[test]
    fn non_call_text_passes_through_lowercased() {
        let parts = split_call("action: I Cannot Help With That");
        assert_eq!(parts.name, "i cannot help with that");
        assert_eq!(parts.args, "");

        let unclosed = split_call("click(point='<point>1 2</point>'");
        assert_eq!(unclosed.args, "");
    }

    #[test]
    fn tokenizes_mixed_quotes_and_bare_values() {
        let args = parse_arguments(r#"content="say \"hi\"", direction='up', n=3, box=[1, 2]"#);
        assert_eq!(
            args,
            vec![
                ("content".to_string(), "say \"hi\"".to_string()),
                ("direction".to_string(), "up".to_string()),
                ("n".to_string(), "3".to_string()),
                ("box".to_string(), "[1, 2]".to_string()),
            ]
        );
    }

    #[test]
    fn keeps_literal_backslash_n() {
        let args = parse_arguments(r"content='hello\n'");
        assert_eq!(find_argument(&args, "content"), Some("hello\\n"));
    }

    #[test]
    fn trailing_backslash_does_not_swallow_the_closing_quote() {
        let args = parse_arguments(r"content='C:\Users\me\'");
        assert_eq!(find_argument(&args, "content"), Some(r"C:\Users\me\"));

        let args = parse_arguments(r"content='dir C:\', mode='x'");
        assert_eq!(find_argument(&args, "content"), Some(r"dir C:\"));
        assert_eq!(find_argument(&args, "mode"), Some("x"));

        let args = parse_arguments(r"content='it\'s', mode='x'");
        assert_eq!(find_argument(&args, "content"), Some("it's"));
        assert_eq!(find_argument(&args, "mode"), Some("x"));
    }

    #[test]
    fn skips_malformed_entries() {
        let args = parse_arguments("garbage 'x, y', key='v', =oops, other='w'");
        assert_eq!(find_argument(&args, "key"), Some("v"));
        assert_eq!(find_argument(&args, "other"), Some("w"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn stray_quote_swallows_following_keys() {
        let args = parse_arguments("a='1', b='never closed, c='3'");
        assert_eq!(find_argument(&args, "a"), Some("1"));
        assert_eq!(find_argument(&args, "b"), Some("never closed, c="));
        assert_eq!(find_argument(&args, "c"), None);
    }

    #[test]
    fn unterminated_quote_stops_tokenizing() {
        let args = parse_arguments("a='1', b='open");
        assert_eq!(args, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn key_lookup_is_exact() {
        let args = parse_arguments("start_point='<point>1 2</point>'");
        assert_eq!(find_argument(&args, "point"), None);
        assert!(find_argument(&args, "start_point").is_some());
    }

    #[test]
    fn point_literals() {
        assert_eq!(
            parse_point_literal("<point>512 384</point>"),
            Some(Coordinate::Point(Point::new(512.0, 384.0)))
        );
        assert_eq!(
            parse_point_literal("<POINT> 1.5, -2 </POINT>"),
            Some(Coordinate::Point(Point::new(1.5, -2.0)))
        );
        assert_eq!(
            parse_point_literal("[100, 100, 300, 300]"),
            Some(Coordinate::Box(BoundingBox::new(100.0, 100.0, 300.0, 300.0)))
        );
        assert_eq!(
            parse_point_literal("<point>1 2 3</point>"),
            Some(Coordinate::Point(Point::new(1.0, 2.0)))
        );
        assert_eq!(parse_point_literal("<point>512</point>"), None);
        assert_eq!(parse_point_literal("<point>a b</point>"), None);
        assert_eq!(parse_point_literal("<point>inf 3</point>"), None);
    }
}
