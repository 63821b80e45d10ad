//! Frequency tables over parsed log records.
//!
//! Every table is a pure count keyed by something derived from a single
//! record, so the reduction is commutative and associative: partial results
//! over disjoint slices of the input can be combined with
//! [`AggregateResult::merge`].

use crate::entry::LogRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key → occurrence count.
pub type CountTable = BTreeMap<String, u64>;

/// Path → method → occurrence count.
pub type EndpointTable = BTreeMap<String, CountTable>;

/// Length of the time bucket prefix, `dd/Mon/yyyy:hh`.
pub const TIME_BUCKET_LEN: usize = 14;

/// IPv4 prefix length used to group clients into subnets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubnetMask {
    #[default]
    Slash24,
    Slash16,
}

impl SubnetMask {
    /// Number of leading bits kept.
    pub fn bits(self) -> u8 {
        match self {
            Self::Slash24 => 24,
            Self::Slash16 => 16,
        }
    }
}

impl fmt::Display for SubnetMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.bits())
    }
}

impl FromStr for SubnetMask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('/') {
            "24" => Ok(Self::Slash24),
            "16" => Ok(Self::Slash16),
            _ => Err(Error::invalid_subnet_mask(s)),
        }
    }
}

/// Derive the CIDR subnet key for an IPv4 address.
///
/// Anything that is not four dot-separated octets in `0..=255` is returned
/// unchanged, so malformed addresses still get counted under their own name.
///
/// ```rust
/// use rsla::analysis::{subnet_key, SubnetMask};
///
/// assert_eq!(subnet_key("192.168.1.5", SubnetMask::Slash24), "192.168.1.0/24");
/// assert_eq!(subnet_key("192.168.1.5", SubnetMask::Slash16), "192.168.0.0/16");
/// assert_eq!(subnet_key("bad-ip", SubnetMask::Slash24), "bad-ip");
/// ```
pub fn subnet_key(ip: &str, mask: SubnetMask) -> String {
    let octets: Vec<&str> = ip.split('.').collect();
    let parsed: Option<Vec<u8>> = if octets.len() == 4 {
        octets.iter().map(|o| o.parse::<u8>().ok()).collect()
    } else {
        None
    };

    let Some(o) = parsed else {
        tracing::debug!(ip, "not an IPv4 address, keeping raw subnet key");
        return ip.to_string();
    };

    match mask {
        SubnetMask::Slash24 => format!("{}.{}.{}.0/24", o[0], o[1], o[2]),
        SubnetMask::Slash16 => format!("{}.{}.0.0/16", o[0], o[1]),
    }
}

/// Truncate a timestamp to its day+hour bucket, e.g. `01/Jan/2023:00`.
pub fn time_bucket(timestamp: &str) -> &str {
    match timestamp.char_indices().nth(TIME_BUCKET_LEN) {
        Some((i, _)) => &timestamp[..i],
        None => timestamp,
    }
}

/// The seven frequency tables of an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub ip_counts: CountTable,
    pub agent_counts: CountTable,
    pub path_counts: CountTable,
    pub status_counts: CountTable,
    pub time_period_counts: CountTable,
    pub endpoint_counts: EndpointTable,
    pub subnet_counts: CountTable,
}

impl AggregateResult {
    /// Fold another result into this one by summing per-key counts.
    pub fn merge(&mut self, other: AggregateResult) {
        merge_counts(&mut self.ip_counts, other.ip_counts);
        merge_counts(&mut self.agent_counts, other.agent_counts);
        merge_counts(&mut self.path_counts, other.path_counts);
        merge_counts(&mut self.status_counts, other.status_counts);
        merge_counts(&mut self.time_period_counts, other.time_period_counts);
        merge_counts(&mut self.subnet_counts, other.subnet_counts);
        for (path, methods) in other.endpoint_counts {
            merge_counts(self.endpoint_counts.entry(path).or_default(), methods);
        }
    }

    /// Number of records counted.
    pub fn total(&self) -> u64 {
        self.ip_counts.values().sum()
    }

    /// Whether no record has been counted.
    pub fn is_empty(&self) -> bool {
        self.ip_counts.is_empty()
    }
}

fn merge_counts(into: &mut CountTable, from: CountTable) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

fn bump(table: &mut CountTable, key: &str) {
    match table.get_mut(key) {
        Some(count) => *count += 1,
        None => {
            table.insert(key.to_string(), 1);
        }
    }
}

/// Incremental builder of an [`AggregateResult`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    mask: SubnetMask,
    result: AggregateResult,
}

impl Aggregator {
    /// Create an aggregator grouping subnets with `mask`.
    pub fn new(mask: SubnetMask) -> Self {
        Self {
            mask,
            result: AggregateResult::default(),
        }
    }

    /// Get the subnet mask in use.
    pub fn mask(&self) -> SubnetMask {
        self.mask
    }

    /// Count one record in every table.
    pub fn add(&mut self, record: &LogRecord) {
        let r = &mut self.result;
        bump(&mut r.ip_counts, &record.ip);
        bump(&mut r.agent_counts, &record.agent);
        bump(&mut r.path_counts, &record.path);
        bump(&mut r.status_counts, &record.status);
        bump(&mut r.time_period_counts, time_bucket(&record.timestamp));
        bump(
            r.endpoint_counts.entry(record.path.clone()).or_default(),
            &record.method,
        );
        bump(&mut r.subnet_counts, &subnet_key(&record.ip, self.mask));
    }

    /// Fold a partial result, e.g. from another slice of the input.
    pub fn merge(&mut self, other: AggregateResult) {
        self.result.merge(other);
    }

    /// Get the tables accumulated so far.
    pub fn result(&self) -> &AggregateResult {
        &self.result
    }

    /// Finish the run and take the tables.
    pub fn finish(self) -> AggregateResult {
        self.result
    }
}

impl<'a> Extend<&'a LogRecord> for Aggregator {
    fn extend<I: IntoIterator<Item = &'a LogRecord>>(&mut self, records: I) {
        for record in records {
            self.add(record);
        }
    }
}

/// Aggregate records with the default /24 subnet mask.
pub fn aggregate<'a, I>(records: I) -> AggregateResult
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    aggregate_with_mask(records, SubnetMask::default())
}

/// Aggregate records grouping subnets with `mask`.
pub fn aggregate_with_mask<'a, I>(records: I, mask: SubnetMask) -> AggregateResult
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let mut aggregator = Aggregator::new(mask);
    aggregator.extend(records);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(ip: &str, ts: &str, method: &str, path: &str, agent: &str) -> LogRecord {
        LogRecord::new(ip, ts, method, path, "200", agent)
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            record("192.168.1.1", "01/Jan/2023:00:00:01 +0000", "GET", "/file", "agent1"),
            record("192.168.1.2", "01/Jan/2023:01:00:02 +0000", "POST", "/file", "agent2"),
            record("192.168.1.1", "01/Jan/2023:00:00:03 +0000", "GET", "/other", "agent1"),
        ]
    }

    fn table(pairs: &[(&str, u64)]) -> CountTable {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_subnet_key() {
        assert_eq!(subnet_key("192.168.1.5", SubnetMask::Slash24), "192.168.1.0/24");
        assert_eq!(subnet_key("10.20.30.40", SubnetMask::Slash16), "10.20.0.0/16");
        assert_eq!(subnet_key("bad-ip", SubnetMask::Slash24), "bad-ip");
        assert_eq!(subnet_key("1.2.3", SubnetMask::Slash24), "1.2.3");
        assert_eq!(subnet_key("1.2.3.x", SubnetMask::Slash24), "1.2.3.x");
        assert_eq!(subnet_key("1.2.3.256", SubnetMask::Slash24), "1.2.3.256");
        assert_eq!(subnet_key("", SubnetMask::Slash24), "");
    }

    #[test]
    fn test_subnet_mask_from_str() {
        assert_eq!("24".parse::<SubnetMask>().unwrap(), SubnetMask::Slash24);
        assert_eq!("/16".parse::<SubnetMask>().unwrap(), SubnetMask::Slash16);
        assert!(matches!(
            "8".parse::<SubnetMask>(),
            Err(Error::InvalidSubnetMask { .. })
        ));
        assert_eq!(SubnetMask::Slash16.to_string(), "/16");
    }

    #[test]
    fn test_time_bucket() {
        assert_eq!(time_bucket("01/Jan/2023:00:00:01 +0000"), "01/Jan/2023:00");
        assert_eq!(time_bucket("short"), "short");
        assert_eq!(time_bucket("01/Jan/2023:00"), "01/Jan/2023:00");
    }

    #[test]
    fn test_aggregate_tables() {
        let result = aggregate(&sample());

        assert_eq!(result.ip_counts, table(&[("192.168.1.1", 2), ("192.168.1.2", 1)]));
        assert_eq!(result.agent_counts, table(&[("agent1", 2), ("agent2", 1)]));
        assert_eq!(result.path_counts, table(&[("/file", 2), ("/other", 1)]));
        assert_eq!(result.status_counts, table(&[("200", 3)]));
        assert_eq!(
            result.time_period_counts,
            table(&[("01/Jan/2023:00", 2), ("01/Jan/2023:01", 1)])
        );
        assert_eq!(result.subnet_counts, table(&[("192.168.1.0/24", 3)]));

        let mut endpoints = EndpointTable::new();
        endpoints.insert("/file".to_string(), table(&[("GET", 1), ("POST", 1)]));
        endpoints.insert("/other".to_string(), table(&[("GET", 1)]));
        assert_eq!(result.endpoint_counts, endpoints);
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let records = sample();
        let forward = aggregate(&records);
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        let rotated: Vec<_> = records.iter().cycle().skip(1).take(records.len()).cloned().collect();

        assert_eq!(forward, aggregate(&reversed));
        assert_eq!(forward, aggregate(&rotated));
    }

    #[test]
    fn test_merge_of_partitions_matches_single_pass() {
        let records = sample();
        let whole = aggregate(&records);

        let mut parts = aggregate(&records[..1]);
        parts.merge(aggregate(&records[1..]));
        assert_eq!(whole, parts);
    }

    #[test]
    fn test_slash16_grouping() {
        let records = vec![
            record("10.1.2.3", "01/Jan/2023:00:00:01 +0000", "GET", "/", "a"),
            record("10.1.9.9", "01/Jan/2023:00:00:01 +0000", "GET", "/", "a"),
            record("not-an-ip", "01/Jan/2023:00:00:01 +0000", "GET", "/", "a"),
        ];
        let result = aggregate_with_mask(&records, SubnetMask::Slash16);
        assert_eq!(
            result.subnet_counts,
            table(&[("10.1.0.0/16", 2), ("not-an-ip", 1)])
        );
    }
}
