//! Error types for the rsla library.

use thiserror::Error;

/// Result type alias for rsla operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, aggregating and reporting.
#[derive(Error, Debug)]
pub enum Error {
    /// The line tokenized into fewer fields than a record needs.
    #[error("log line '{line}' has {found} fields, at least {expected} required")]
    TooFewFields {
        line: String,
        found: usize,
        expected: usize,
    },

    /// The bracketed timestamp field is empty.
    #[error("log line '{line}' has no timestamp")]
    MissingTimestamp { line: String },

    /// Method, path or status came out empty after extraction.
    #[error("log line '{line}' is missing required field '{field}'")]
    MissingRequiredField { field: &'static str, line: String },

    /// Error when a field is not found in a record.
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// Error when a field value cannot be parsed as the requested type.
    #[error("field '{field}' with value '{value}' cannot be parsed as {target_type}: {source}")]
    FieldParseError {
        field: String,
        value: String,
        target_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Only /24 and /16 masks are supported.
    #[error("unsupported subnet mask '{value}', expected 24 or 16")]
    InvalidSubnetMask { value: String },

    /// An action rule with an empty tag or action.
    #[error("action rule {index} is badly formed: {reason}")]
    InvalidActionRule { index: usize, reason: String },

    /// A metric name outside ip, agent, path, time, endpoint, status, subnet, summary.
    #[error("unknown metric '{name}'")]
    UnknownMetric { name: String },

    /// An output format other than json, yaml or csv.
    #[error("unknown output format '{name}', expected json, yaml or csv")]
    UnknownOutputFormat { name: String },

    /// IO error when reading log files or rule files.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed action rules, or a report that failed to encode as YAML.
    #[error("YAML error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    /// A report that failed to encode as JSON.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A report that failed to encode as CSV.
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

impl Error {
    /// Create a new too few fields error.
    pub fn too_few_fields(line: impl Into<String>, found: usize, expected: usize) -> Self {
        Self::TooFewFields {
            line: line.into(),
            found,
            expected,
        }
    }

    /// Create a new missing timestamp error.
    pub fn missing_timestamp(line: impl Into<String>) -> Self {
        Self::MissingTimestamp { line: line.into() }
    }

    /// Create a new missing required field error.
    pub fn missing_required_field(field: &'static str, line: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field,
            line: line.into(),
        }
    }

    /// Create a new field not found error.
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    /// Create a new field parse error.
    pub fn field_parse_error(
        field: impl Into<String>,
        value: impl Into<String>,
        target_type: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::FieldParseError {
            field: field.into(),
            value: value.into(),
            target_type: target_type.into(),
            source: Box::new(source),
        }
    }

    /// Create a new invalid subnet mask error.
    pub fn invalid_subnet_mask(value: impl Into<String>) -> Self {
        Self::InvalidSubnetMask {
            value: value.into(),
        }
    }

    /// Create a new invalid action rule error.
    pub fn invalid_action_rule(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidActionRule {
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error rejects a single log line rather than the whole run.
    ///
    /// Batch processing skips lines failing with these and keeps going.
    pub fn is_line_error(&self) -> bool {
        matches!(
            self,
            Self::TooFewFields { .. }
                | Self::MissingTimestamp { .. }
                | Self::MissingRequiredField { .. }
        )
    }

    /// Short reason used when recording a rejected line.
    pub fn reason(&self) -> String {
        match self {
            Self::TooFewFields { .. } => "Invalid format (too few parts)".to_string(),
            Self::MissingTimestamp { .. } => "Missing timestamp".to_string(),
            Self::MissingRequiredField { field, .. } => {
                format!("Invalid format (missing required field {})", field)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_errors_are_recoverable() {
        assert!(Error::too_few_fields("a b", 2, 5).is_line_error());
        assert!(Error::missing_timestamp("x").is_line_error());
        assert!(Error::missing_required_field("path", "x").is_line_error());
        assert!(!Error::invalid_subnet_mask("8").is_line_error());

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(!io.is_line_error());
    }

    #[test]
    fn test_reason_text() {
        assert_eq!(
            Error::too_few_fields("a", 1, 5).reason(),
            "Invalid format (too few parts)"
        );
        assert_eq!(
            Error::missing_required_field("status", "a").reason(),
            "Invalid format (missing required field status)"
        );
    }
}
