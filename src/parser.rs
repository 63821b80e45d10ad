//! Mapping of tokenized lines onto [`LogRecord`]s.

use crate::entry::LogRecord;
use crate::error::{Error, Result};
use crate::token::{tokenize, tokenize_unquote, unquote};

/// Fewest tokens a combined log line may have and still yield a record.
pub const MIN_FIELDS: usize = 5;

/// Value logs write for an absent field, e.g. an empty referrer.
pub const PLACEHOLDER: &str = "-";

/// Agent recorded when the line carries no usable user agent.
pub const MISSING_AGENT: &str = "-";

const IP: usize = 0;
const TIMESTAMP: usize = 3;
const REQUEST: usize = 4;
const STATUS: usize = 5;
const AGENT: usize = 7;
const AGENT_FALLBACK: usize = 8;

/// Trait for parsing log lines into records.
pub trait StringParser {
    /// Parse a log line into a record.
    fn parse_string(&self, line: &str) -> Result<LogRecord>;
}

/// Sentinel values used while extracting fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Token value treated as "field not present".
    pub placeholder: String,
    /// Agent stored when neither agent position holds a real value.
    pub missing_agent: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            placeholder: PLACEHOLDER.to_string(),
            missing_agent: MISSING_AGENT.to_string(),
        }
    }
}

impl ParserOptions {
    /// Use `missing_agent` for lines without a user agent.
    pub fn with_missing_agent(mut self, missing_agent: impl Into<String>) -> Self {
        self.missing_agent = missing_agent.into();
        self
    }
}

/// Positional parser for combined-format access log lines.
///
/// Field positions after tokenizing:
///
/// | index | field |
/// |-------|-------|
/// | 0 | client ip |
/// | 3 | `[timestamp]` |
/// | 4 | `"METHOD path PROTOCOL"` |
/// | 5 | status |
/// | 7, 8 | referrer / user agent |
///
/// The agent is read from position 7 and, when that holds the placeholder,
/// from position 8. Lines with an inserted extra field shift these
/// positions; no attempt is made to detect that.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    options: ParserOptions,
}

impl LineParser {
    /// Create a parser with the default sentinels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom sentinels.
    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Get the sentinels in use.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse one log line.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rsla::LineParser;
    ///
    /// let line = r#"1.2.3.4 - - [01/Jan/2023:00:00:01 +0000] "GET /file HTTP/1.1" 200 1024 "-" "agentA""#;
    /// let record = LineParser::new().parse_line(line)?;
    ///
    /// assert_eq!(record.path, "/file");
    /// assert_eq!(record.agent, "agentA");
    /// # Ok::<(), rsla::Error>(())
    /// ```
    pub fn parse_line(&self, line: &str) -> Result<LogRecord> {
        let tokens = tokenize(line);
        if tokens.len() < MIN_FIELDS {
            return Err(Error::too_few_fields(line, tokens.len(), MIN_FIELDS));
        }

        let timestamp = strip_brackets(tokens[TIMESTAMP]);
        if timestamp.is_empty() {
            return Err(Error::missing_timestamp(line));
        }

        let request = tokenize_unquote(tokens[REQUEST]);
        let method = request.first().copied().unwrap_or_default();
        let path = request.get(1).copied().unwrap_or_default();
        let status = tokens.get(STATUS).copied().unwrap_or_default();

        if path.is_empty() {
            return Err(Error::missing_required_field("path", line));
        }
        if method.is_empty() {
            return Err(Error::missing_required_field("method", line));
        }
        if status.is_empty() {
            return Err(Error::missing_required_field("status", line));
        }

        let agent = self.agent(&tokens);
        let record = LogRecord::new(tokens[IP], timestamp, method, path, status, agent);
        tracing::debug!(
            ip = %record.ip,
            method = %record.method,
            path = %record.path,
            status = %record.status,
            "parsed line"
        );
        Ok(record)
    }

    fn agent<'a>(&'a self, tokens: &[&'a str]) -> &'a str {
        let present = |i: usize| {
            tokens
                .get(i)
                .map(|t| unquote(*t))
                .filter(|v| !v.is_empty() && *v != self.options.placeholder)
        };

        present(AGENT)
            .or_else(|| present(AGENT_FALLBACK))
            .unwrap_or(self.options.missing_agent.as_str())
    }
}

impl StringParser for LineParser {
    fn parse_string(&self, line: &str) -> Result<LogRecord> {
        self.parse_line(line)
    }
}

fn strip_brackets(token: &str) -> &str {
    let token = token.strip_prefix('[').unwrap_or(token);
    token.strip_suffix(']').unwrap_or(token)
}
