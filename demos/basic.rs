//! Basic usage example for the rsla library.
//!
//! This example demonstrates how to tokenize and parse combined-format access
//! log lines, aggregate them and render the frequency tables.

use rsla::report::{format, Metric, OutputFormat};
use rsla::{tokenize, Aggregator, LineParser, Reader, SubnetMask};
use std::io::Cursor;

const LOG: &str = r#"192.168.1.1 - - [01/Jan/2023:00:00:01 +0000] "GET /file HTTP/1.1" 200 1024 "-" "agent1"
192.168.1.2 - - [01/Jan/2023:01:00:02 +0000] "POST /file HTTP/1.1" 201 17 "-" "agent2"
this line is not an access log entry
192.168.7.1 - - [01/Jan/2023:00:00:03 +0000] "GET /other HTTP/1.1" 404 0 "https://example.com/" "agent1""#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== rsla Basic Usage Example ===\n");

    // Example 1: Tokenizing a single line
    tokenize_example();

    // Example 2: Parsing a line into a record
    parsing_example()?;

    // Example 3: Aggregating a batch and rendering reports
    aggregation_example()?;

    Ok(())
}

/// Example 1: How a line splits into tokens
fn tokenize_example() {
    println!("1. Tokenizing");
    println!("-------------");

    let line = LOG.lines().next().unwrap_or_default();
    for (i, token) in tokenize(line).iter().enumerate() {
        println!("  [{}] {}", i, token);
    }

    println!("\n");
}

/// Example 2: Positional field extraction
fn parsing_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("2. Parsing");
    println!("----------");

    let parser = LineParser::new();
    for line in LOG.lines() {
        match parser.parse_line(line) {
            Ok(record) => println!(
                "  {} {} {} -> {} ({})",
                record.ip, record.method, record.path, record.status_code()?, record.agent
            ),
            Err(e) => println!("  rejected: {}", e),
        }
    }

    println!("\n");
    Ok(())
}

/// Example 3: Lenient batch aggregation and the three output formats
fn aggregation_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("3. Aggregating");
    println!("--------------");

    let mut aggregator = Aggregator::new(SubnetMask::Slash16);
    let summary = Reader::new(Cursor::new(LOG)).summarize(&mut aggregator, None)?;
    println!("  {}\n", summary);

    let result = aggregator.finish();
    println!("{}\n", format(&result, Metric::Endpoint, OutputFormat::Json)?);
    println!("{}", format(&result, Metric::Subnet, OutputFormat::Yaml)?);
    println!("{}", format(&result, Metric::Summary, OutputFormat::Csv)?);

    Ok(())
}
