//! # rsla - Rust Log Analyst
//!
//! A Rust library for tallying web-server access logs written in the
//! Apache/NGINX combined format.
//!
//! This library provides functionality to:
//! - Tokenize log lines, keeping `[timestamp]` and `"quoted"` fields intact
//! - Map tokens onto a fixed-shape record (ip, timestamp, method, path, status, agent)
//! - Aggregate records into frequency tables by ip, agent, path, status,
//!   hour, endpoint and subnet
//! - Render the tables as JSON, YAML or CSV
//!
//! ## Quick Start
//!
//! ```rust
//! use rsla::{Aggregator, Reader};
//! use rsla::report::{format, Metric, OutputFormat};
//! use std::io::Cursor;
//!
//! let log_data = r#"127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612 "-" "curl/7.64.1""#;
//!
//! let mut aggregator = Aggregator::default();
//! let summary = Reader::new(Cursor::new(log_data)).summarize(&mut aggregator, None)?;
//! assert_eq!(summary.accepted, 1);
//!
//! let report = format(&aggregator.finish(), Metric::Path, OutputFormat::Csv)?;
//! assert_eq!(report, "pathCounts\n/api/foo,1");
//! # Ok::<(), rsla::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Hand-rolled Tokenizer**: bracket and quote spans, escapes preserved verbatim
//! - **Lenient Batches**: malformed lines are counted and skipped, never fatal
//! - **Mergeable Results**: tables combine by summing counts
//! - **Action Rules**: YAML tag/action rules planned against lines and subnets
//! - **Error Handling**: Comprehensive error types using `thiserror`

pub mod action;
pub mod analysis;
pub mod entry;
pub mod error;
pub mod logging;
pub mod parser;
pub mod reader;
pub mod report;
pub mod token;

// Re-export main types for convenience
pub use analysis::{aggregate, AggregateResult, Aggregator, SubnetMask};
pub use entry::LogRecord;
pub use error::{Error, Result};
pub use parser::{LineParser, ParserOptions};
pub use reader::{BatchSummary, Reader};
pub use token::{tokenize, tokenize_unquote};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_basic_parsing() {
        let log_line = r#"1.2.3.4 - - [01/Jan/2023:00:00:01 +0000] "GET /file HTTP/1.1" 200 1024 "-" "agentA""#;

        let mut reader = Reader::new(Cursor::new(log_line));
        let record = reader.read().unwrap().unwrap();

        assert_eq!(record.field("ip").unwrap(), "1.2.3.4");
        assert_eq!(record.field("timestamp").unwrap(), "01/Jan/2023:00:00:01 +0000");
        assert_eq!(record.field("method").unwrap(), "GET");
        assert_eq!(record.field("path").unwrap(), "/file");
        assert_eq!(record.status_code().unwrap(), 200);
        assert_eq!(record.field("agent").unwrap(), "agentA");
    }

    #[test]
    fn test_multiple_lines() {
        let log_data = r#"127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612 "-" "curl"
192.168.1.1 - - [08/Nov/2013:13:40:18 +0000] "POST /api/bar HTTP/1.1" 404 0 "-" "curl""#;

        let records: Result<Vec<_>> = Reader::new(Cursor::new(log_data)).collect();
        let records = records.unwrap();

        let result = aggregate(&records);
        assert_eq!(result.status_counts.get("200"), Some(&1));
        assert_eq!(result.status_counts.get("404"), Some(&1));
        assert_eq!(result.agent_counts.get("curl"), Some(&2));
    }
}
