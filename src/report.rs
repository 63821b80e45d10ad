//! Rendering of aggregate results as JSON, YAML or CSV.

use crate::analysis::{AggregateResult, CountTable, EndpointTable};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Output encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON object.
    #[default]
    Json,
    /// YAML mapping, same shape as the JSON.
    Yaml,
    /// Per metric a header line then `key,count` lines. Keys holding a
    /// comma, quote or newline are quoted.
    Csv,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            _ => Err(Error::UnknownOutputFormat { name: s.to_string() }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        })
    }
}

/// Which tables to include in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    Ip,
    Agent,
    Path,
    Time,
    Endpoint,
    Status,
    Subnet,
    /// All seven tables.
    #[default]
    Summary,
}

impl Metric {
    /// Whether the report for `self` carries the table of `other`.
    pub fn includes(self, other: Metric) -> bool {
        self == Metric::Summary || self == other
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ip" => Ok(Self::Ip),
            "agent" => Ok(Self::Agent),
            "path" => Ok(Self::Path),
            "time" => Ok(Self::Time),
            "endpoint" => Ok(Self::Endpoint),
            "status" => Ok(Self::Status),
            "subnet" => Ok(Self::Subnet),
            "summary" => Ok(Self::Summary),
            _ => Err(Error::UnknownMetric { name: s.to_string() }),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ip => "ip",
            Self::Agent => "agent",
            Self::Path => "path",
            Self::Time => "time",
            Self::Endpoint => "endpoint",
            Self::Status => "status",
            Self::Subnet => "subnet",
            Self::Summary => "summary",
        })
    }
}

/// Borrowed view of the selected tables, in report order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_counts: Option<&'a CountTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_counts: Option<&'a CountTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path_counts: Option<&'a CountTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_period_counts: Option<&'a CountTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint_counts: Option<&'a EndpointTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_counts: Option<&'a CountTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subnet_counts: Option<&'a CountTable>,
}

impl<'a> Report<'a> {
    fn select(result: &'a AggregateResult, metric: Metric) -> Self {
        let pick = |m: Metric| metric.includes(m);
        Self {
            ip_counts: pick(Metric::Ip).then_some(&result.ip_counts),
            agent_counts: pick(Metric::Agent).then_some(&result.agent_counts),
            path_counts: pick(Metric::Path).then_some(&result.path_counts),
            time_period_counts: pick(Metric::Time).then_some(&result.time_period_counts),
            endpoint_counts: pick(Metric::Endpoint).then_some(&result.endpoint_counts),
            status_counts: pick(Metric::Status).then_some(&result.status_counts),
            subnet_counts: pick(Metric::Subnet).then_some(&result.subnet_counts),
        }
    }

    fn to_csv(&self) -> Result<String> {
        let sections = [
            self.ip_counts.map(|t| csv_section("ipCounts", t)),
            self.agent_counts.map(|t| csv_section("agentCounts", t)),
            self.path_counts.map(|t| csv_section("pathCounts", t)),
            self.time_period_counts.map(|t| csv_section("timePeriodCounts", t)),
            self.endpoint_counts.map(csv_endpoint_section),
            self.status_counts.map(|t| csv_section("statusCounts", t)),
            self.subnet_counts.map(|t| csv_section("subnetCounts", t)),
        ];

        let sections = sections.into_iter().flatten().collect::<Result<Vec<_>>>()?;
        Ok(sections.join("\n\n"))
    }
}

// Sections mix one-field header rows with two- or three-field data rows.
fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new())
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| Error::from(e.into_error()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches('\n').to_string())
}

fn csv_section(name: &str, table: &CountTable) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record([name])?;
    for (key, count) in table {
        writer.write_record([key.as_str(), count.to_string().as_str()])?;
    }
    finish_csv(writer)
}

/// The endpoint table is flattened to `path,method,count` rows.
fn csv_endpoint_section(endpoints: &EndpointTable) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(["endpointCounts"])?;
    for (path, methods) in endpoints {
        for (method, count) in methods {
            writer.write_record([path.as_str(), method.as_str(), count.to_string().as_str()])?;
        }
    }
    finish_csv(writer)
}

/// Render the tables selected by `metric` in the given encoding.
///
/// # Example
///
/// ```rust
/// use rsla::analysis::aggregate;
/// use rsla::report::{format, Metric, OutputFormat};
/// use rsla::LogRecord;
///
/// let records = vec![LogRecord::new("1.2.3.4", "01/Jan/2023:00:00:01 +0000", "GET", "/", "200", "-")];
/// let out = format(&aggregate(&records), Metric::Status, OutputFormat::Csv)?;
///
/// assert_eq!(out, "statusCounts\n200,1");
/// # Ok::<(), rsla::Error>(())
/// ```
pub fn format(result: &AggregateResult, metric: Metric, mode: OutputFormat) -> Result<String> {
    let report = Report::select(result, metric);
    match mode {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&report)?),
        OutputFormat::Csv => report.to_csv(),
    }
}
