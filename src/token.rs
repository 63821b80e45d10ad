//! Context-sensitive tokenizer for access log lines.
//!
//! A combined log line mixes plain words with two compound fields, the
//! bracketed timestamp (`[01/Jan/2023:00:00:01 +0000]`) and quoted strings
//! such as the request line or the user agent. Splitting on whitespace would
//! shatter those, so the tokenizer keeps every bracket or quote span intact:
//!
//! ```rust
//! use rsla::token::tokenize;
//!
//! let tokens = tokenize(r#"1.2.3.4 - - [01/Jan/2023:00:00:01 +0000] "GET / HTTP/1.1" 200"#);
//! assert_eq!(tokens[3], "[01/Jan/2023:00:00:01 +0000]");
//! assert_eq!(tokens[4], r#""GET / HTTP/1.1""#);
//! ```

use regex::Regex;
use std::sync::OnceLock;

/// Iterator over the tokens of a single line.
///
/// Tokens borrow from the line. Escape sequences inside quotes are kept
/// verbatim, only their effect on where the quote ends is honoured.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    /// Create a tokenizer over `line`.
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    /// End (exclusive) of a bracketed span opening at `start`.
    ///
    /// An unterminated bracket runs to the end of the line.
    fn bracket_end(&self, start: usize) -> usize {
        match self.line[start + 1..].find(']') {
            Some(i) => start + 1 + i + 1,
            None => self.line.len(),
        }
    }

    /// End (exclusive) of a quoted span opening at `start`.
    ///
    /// A backslash swallows the character after it, so `\"` never closes the
    /// quote. An unterminated quote runs to the end of the line.
    fn quote_end(&self, start: usize) -> usize {
        let body = &self.line[start + 1..];
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => return start + 1 + i + 1,
                _ => {}
            }
        }
        self.line.len()
    }

    /// End (exclusive) of a plain word starting at `start`.
    fn word_end(&self, start: usize) -> usize {
        match self.line[start..].find(' ') {
            Some(i) => start + i,
            None => self.line.len(),
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.line[self.pos..];
        let start = self.pos + (rest.len() - rest.trim_start_matches(' ').len());
        if start >= self.line.len() {
            self.pos = self.line.len();
            return None;
        }

        let end = match self.line[start..].chars().next() {
            Some('[') => self.bracket_end(start),
            Some('"') => self.quote_end(start),
            _ => self.word_end(start),
        };

        self.pos = end;
        let token = &self.line[start..end];
        tracing::trace!(token, "token found");
        Some(token)
    }
}

/// Split a raw log line into tokens.
///
/// Never fails: whatever can be recovered from a malformed line is returned.
pub fn tokenize(line: &str) -> Vec<&str> {
    Tokens::new(line).collect()
}

fn request_line() -> &'static Regex {
    static REQUEST_LINE: OnceLock<Regex> = OnceLock::new();
    REQUEST_LINE.get_or_init(|| {
        Regex::new(r"^([A-Z]+) +(\S+)").expect("valid request line regex")
    })
}

/// Tokenize a field that may be wrapped in double quotes.
///
/// A quoted request line (`"GET /x HTTP/1.1"`) yields exactly the method and
/// the path, the protocol is dropped. Any other quoted content comes back as
/// a single token. Unquoted input is handed to [`tokenize`].
///
/// ```rust
/// use rsla::token::tokenize_unquote;
///
/// assert_eq!(tokenize_unquote(r#""GET /x HTTP/1.1""#), vec!["GET", "/x"]);
/// assert_eq!(tokenize_unquote(r#""-""#), vec!["-"]);
/// ```
pub fn tokenize_unquote(token: &str) -> Vec<&str> {
    let Some(inner) = strip_quotes(token) else {
        return tokenize(token);
    };

    if let Some(captures) = request_line().captures(inner) {
        if let (Some(method), Some(path)) = (captures.get(1), captures.get(2)) {
            return vec![method.as_str(), path.as_str()];
        }
    }

    if inner.is_empty() {
        Vec::new()
    } else {
        vec![inner]
    }
}

/// Remove one pair of surrounding double quotes, if present.
pub fn unquote(field: &str) -> &str {
    strip_quotes(field).unwrap_or(field)
}

fn strip_quotes(s: &str) -> Option<&str> {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words() {
        assert_eq!(
            tokenize("token1 token2 token3"),
            vec!["token1", "token2", "token3"]
        );
        assert_eq!(tokenize("  padded   words  "), vec!["padded", "words"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("    ").is_empty());
    }

    #[test]
    fn test_brackets() {
        assert_eq!(tokenize("[a b c] d"), vec!["[a b c]", "d"]);
        assert_eq!(
            tokenize("[token1] [token2] token3"),
            vec!["[token1]", "[token2]", "token3"]
        );
    }

    #[test]
    fn test_quotes() {
        assert_eq!(tokenize(r#""a b" c"#), vec![r#""a b""#, "c"]);
        assert_eq!(tokenize(r#""a\"b" c"#), vec![r#""a\"b""#, "c"]);
        assert_eq!(tokenize(r#""a\\" c"#), vec![r#""a\\""#, "c"]);
    }

    #[test]
    fn test_unterminated_spans_run_to_end() {
        assert_eq!(tokenize("a [b c"), vec!["a", "[b c"]);
        assert_eq!(tokenize(r#"a "b c"#), vec!["a", r#""b c"#]);
        assert_eq!(tokenize(r#"a "b\"#), vec!["a", r#""b\"#]);
        assert_eq!(tokenize(r#"""#), vec![r#"""#]);
    }

    #[test]
    fn test_multibyte_content() {
        assert_eq!(
            tokenize(r#"é "ü ñ" [日本 語] ok"#),
            vec!["é", r#""ü ñ""#, "[日本 語]", "ok"]
        );
        assert_eq!(tokenize(r#""ü\ñ" x"#), vec![r#""ü\ñ""#, "x"]);
    }

    #[test]
    fn test_adjacent_span_without_space() {
        assert_eq!(tokenize(r#""a"b c"#), vec![r#""a""#, "b", "c"]);
    }

    #[test]
    fn test_tokenize_unquote() {
        assert_eq!(tokenize_unquote(r#""GET /x HTTP/1.1""#), vec!["GET", "/x"]);
        assert_eq!(tokenize_unquote(r#""POST /api""#), vec!["POST", "/api"]);
        assert_eq!(tokenize_unquote(r#""not a request""#), vec!["not a request"]);
        assert_eq!(tokenize_unquote(r#""-""#), vec!["-"]);
        assert!(tokenize_unquote(r#""""#).is_empty());
        assert_eq!(tokenize_unquote("GET /x HTTP/1.1"), vec!["GET", "/x", "HTTP/1.1"]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""agentA""#), "agentA");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote(r#"""#), r#"""#);
    }
}
