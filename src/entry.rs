//! The structured record produced for each accepted log line.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Column names of a [`LogRecord`], in export order.
pub const COLUMNS: [&str; 6] = ["ip", "timestamp", "method", "path", "status", "agent"];

/// One parsed access log line.
///
/// Records are built once by the parser and only read afterwards. All
/// fields are kept as the raw strings found in the log; typed accessors
/// convert on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogRecord {
    pub ip: String,
    /// Bracketed timestamp content without the brackets.
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status: String,
    pub agent: String,
}

impl LogRecord {
    /// Create a record from its six fields.
    pub fn new(
        ip: impl Into<String>,
        timestamp: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        status: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            timestamp: timestamp.into(),
            method: method.into(),
            path: path.into(),
            status: status.into(),
            agent: agent.into(),
        }
    }

    /// Get a field value by column name.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use rsla::LogRecord;
    /// let record = LogRecord::new("1.2.3.4", "01/Jan/2023:00:00:01 +0000", "GET", "/", "200", "-");
    ///
    /// assert_eq!(record.field("status").unwrap(), "200");
    /// assert!(record.field("referer").is_err());
    /// ```
    pub fn field(&self, name: &str) -> Result<&str> {
        match name {
            "ip" => Ok(&self.ip),
            "timestamp" => Ok(&self.timestamp),
            "method" => Ok(&self.method),
            "path" => Ok(&self.path),
            "status" => Ok(&self.status),
            "agent" => Ok(&self.agent),
            _ => Err(Error::field_not_found(name)),
        }
    }

    /// Get the status as a numeric HTTP status code.
    pub fn status_code(&self) -> Result<u16> {
        self.status
            .parse::<u16>()
            .map_err(|e| Error::field_parse_error("status", &self.status, "u16", e))
    }

    /// Field values in [`COLUMNS`] order.
    pub fn values(&self) -> [&str; 6] {
        [
            self.ip.as_str(),
            self.timestamp.as_str(),
            self.method.as_str(),
            self.path.as_str(),
            self.status.as_str(),
            self.agent.as_str(),
        ]
    }
}
