//! Log file reading and batch processing.

use crate::analysis::Aggregator;
use crate::entry::LogRecord;
use crate::error::{Error, Result};
use crate::parser::{LineParser, StringParser};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};

/// Counters reported at the end of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Non-blank lines seen.
    pub processed: u64,
    /// Lines that produced a record.
    pub accepted: u64,
    /// Lines rejected by the parser.
    pub skipped: u64,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} log entries (accepted: {}, skipped: {})",
            self.processed, self.accepted, self.skipped
        )
    }
}

/// A reader that parses access logs line by line.
///
/// The reader implements the Iterator trait, allowing you to process log
/// records using standard Rust iterator patterns. Blank lines are skipped.
#[derive(Debug)]
pub struct Reader<R: Read> {
    /// The underlying buffered reader.
    reader: BufReader<R>,
    /// The parser for converting lines to records.
    parser: LineParser,
    /// Raw bytes of the current line.
    buf: Vec<u8>,
    /// Current line, invalid UTF-8 replaced by U+FFFD.
    line: String,
    /// 1-based number of the last line read.
    line_number: u64,
}

impl<R: Read> Reader<R> {
    /// Create a new reader with the default parser.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rsla::Reader;
    /// use std::io::Cursor;
    ///
    /// let log_data = r#"127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612 "-" "curl/7.64.1""#;
    /// let mut reader = Reader::new(Cursor::new(log_data));
    ///
    /// let record = reader.read().unwrap()?;
    /// assert_eq!(record.agent, "curl/7.64.1");
    /// # Ok::<(), rsla::Error>(())
    /// ```
    pub fn new(input: R) -> Self {
        Self::with_parser(input, LineParser::new())
    }

    /// Create a new reader with a configured parser.
    pub fn with_parser(input: R, parser: LineParser) -> Self {
        Self {
            reader: BufReader::new(input),
            parser,
            buf: Vec::new(),
            line: String::new(),
            line_number: 0,
        }
    }

    /// Get a reference to the underlying parser.
    pub fn parser(&self) -> &LineParser {
        &self.parser
    }

    /// Number of the last line read, counting blank lines.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Load the next non-blank line into the line buffer.
    ///
    /// Lines are split on `\n` as bytes, so a line that is not valid UTF-8
    /// is decoded lossily instead of failing the read.
    fn advance(&mut self) -> Option<Result<()>> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    if self.buf.ends_with(b"\n") {
                        self.buf.pop();
                        if self.buf.ends_with(b"\r") {
                            self.buf.pop();
                        }
                    }

                    self.line.clear();
                    let decoded = String::from_utf8_lossy(&self.buf);
                    if let Cow::Owned(_) = decoded {
                        tracing::debug!(
                            line_number = self.line_number,
                            "replaced invalid UTF-8 in log line"
                        );
                    }
                    self.line.push_str(&decoded);

                    if !self.line.trim().is_empty() {
                        return Some(Ok(()));
                    }
                }
                Err(e) => return Some(Err(Error::Io { source: e })),
            }
        }
    }

    /// Read the next record from the log.
    ///
    /// # Returns
    ///
    /// An `Option<Result<LogRecord>>` where:
    /// - `None` indicates end of input
    /// - `Some(Ok(record))` indicates a successfully parsed line
    /// - `Some(Err(error))` indicates a rejected line or an I/O error
    pub fn read(&mut self) -> Option<Result<LogRecord>> {
        if let Err(e) = self.advance()? {
            return Some(Err(e));
        }
        Some(self.parser.parse_string(&self.line))
    }

    /// Collect all records into a vector, failing on the first bad line.
    pub fn collect_all(mut self) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();

        while let Some(result) = self.read() {
            records.push(result?);
        }

        Ok(records)
    }

    /// Process records with a closure.
    ///
    /// Stops at the first rejected line or closure error.
    pub fn process_entries<F, E>(&mut self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&LogRecord) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        while let Some(result) = self.read() {
            let record = result?;
            f(&record)?;
        }
        Ok(())
    }

    /// Feed every parseable line into `aggregator`, skipping the rest.
    ///
    /// Rejected lines are logged and, when `rejects` is given, appended to it
    /// as `Failed: <reason>` / `Line: <line>` / `---` blocks. Only I/O
    /// errors end the batch early.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rsla::{Aggregator, Reader};
    /// use std::io::Cursor;
    ///
    /// let log_data = "garbage\n10.0.0.1 - - [01/Jan/2023:00:00:01 +0000] \"GET / HTTP/1.1\" 200 5\n";
    /// let mut aggregator = Aggregator::default();
    /// let summary = Reader::new(Cursor::new(log_data)).summarize(&mut aggregator, None)?;
    ///
    /// assert_eq!((summary.accepted, summary.skipped), (1, 1));
    /// # Ok::<(), rsla::Error>(())
    /// ```
    pub fn summarize(
        &mut self,
        aggregator: &mut Aggregator,
        mut rejects: Option<&mut dyn Write>,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        while let Some(step) = self.advance() {
            step?;
            let line = self.line.as_str();
            summary.processed += 1;

            match self.parser.parse_string(line) {
                Ok(record) => {
                    aggregator.add(&record);
                    summary.accepted += 1;
                }
                Err(e) if e.is_line_error() => {
                    summary.skipped += 1;
                    tracing::warn!(
                        line_number = self.line_number,
                        reason = %e.reason(),
                        line,
                        "skipped invalid log line"
                    );
                    if let Some(sink) = rejects.as_deref_mut() {
                        write!(sink, "Failed: {}\nLine: {}\n---\n", e.reason(), line)?;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            processed = summary.processed,
            accepted = summary.accepted,
            skipped = summary.skipped,
            "batch complete"
        );
        Ok(summary)
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = r#"192.168.1.1 - - [01/Jan/2023:00:00:01 +0000] "GET /file HTTP/1.1" 200 1024 "-" "agent1"
192.168.1.2 - - [01/Jan/2023:01:00:02 +0000] "GET /file HTTP/1.1" 200 1024 "-" "agent2"
192.168.1.1 - - [01/Jan/2023:00:00:03 +0000] "GET /other HTTP/1.1" 200 1024 "-" "agent1""#;

    #[test]
    fn test_reader_basic() {
        let mut reader = Reader::new(Cursor::new(LOG));

        let record = reader.read().unwrap().unwrap();
        assert_eq!(record.ip, "192.168.1.1");
        assert_eq!(record.agent, "agent1");
        assert_eq!(reader.line_number(), 1);
    }

    #[test]
    fn test_reader_iterator() {
        let records: Result<Vec<_>> = Reader::new(Cursor::new(LOG)).collect();
        let records = records.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2].path, "/other");
    }

    #[test]
    fn test_reader_blank_and_crlf_lines() {
        let log_data = "\n  \r\n192.168.1.1 - - [01/Jan/2023:00:00:01 +0000] \"GET / HTTP/1.1\" 200 1\r\n\n";
        let mut reader = Reader::new(Cursor::new(log_data));

        let record = reader.read().unwrap().unwrap();
        assert_eq!(record.status, "200");
        assert_eq!(reader.line_number(), 3);
        assert!(reader.read().is_none());
    }

    #[test]
    fn test_invalid_utf8_line_is_decoded_lossily() {
        let mut log_data = Vec::new();
        log_data.extend_from_slice(LOG.lines().next().unwrap().as_bytes());
        log_data.extend_from_slice(
            b"\n10.0.0.9 - - [01/Jan/2023:00:00:02 +0000] \"GET /x HTTP/1.1\" 200 1 \"-\" \"bad\xffagent\"\n",
        );
        log_data.extend_from_slice(LOG.lines().last().unwrap().as_bytes());

        let mut aggregator = Aggregator::default();
        let summary = Reader::new(Cursor::new(log_data))
            .summarize(&mut aggregator, None)
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                processed: 3,
                accepted: 3,
                skipped: 0
            }
        );
        assert_eq!(
            aggregator.result().agent_counts.get("bad\u{FFFD}agent"),
            Some(&1)
        );
    }

    #[test]
    fn test_collect_all_fails_on_bad_line() {
        let log_data = format!("{}\nnot a log line", LOG);
        let result = Reader::new(Cursor::new(log_data)).collect_all();
        assert!(matches!(result, Err(Error::TooFewFields { .. })));
    }

    #[test]
    fn test_summarize_skips_and_records_rejects() {
        let log_data = format!("{}\nshort line\n", LOG);
        let mut aggregator = Aggregator::default();
        let mut rejects: Vec<u8> = Vec::new();
        let sink: &mut dyn Write = &mut rejects;

        let summary = Reader::new(Cursor::new(log_data))
            .summarize(&mut aggregator, Some(sink))
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                processed: 4,
                accepted: 3,
                skipped: 1
            }
        );
        assert_eq!(aggregator.result().total(), 3);
        assert_eq!(
            String::from_utf8(rejects).unwrap(),
            "Failed: Invalid format (too few parts)\nLine: short line\n---\n"
        );
    }
}
