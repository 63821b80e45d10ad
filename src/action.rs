//! Tag/action rules for reacting to misbehaving clients.
//!
//! Rules come from a YAML list:
//!
//! ```yaml
//! - tag: wp-login.php
//!   action: ufw deny from {ipaddress}
//! - tag: swarm
//!   action: ufw deny from {ipaddress}
//! ```
//!
//! A rule matches a raw log line when its tag is a substring of the line.
//! `{ipaddress}` in the action is replaced by the client address (or, for
//! `swarm` rules, by the offending subnet). Planned commands are returned
//! as strings; running them is left to the caller.

use crate::analysis::CountTable;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

/// Placeholder substituted in actions.
pub const IP_PLACEHOLDER: &str = "{ipaddress}";

/// Tag of rules applied to subnets whose request count crosses a threshold.
pub const SWARM_TAG: &str = "swarm";

/// Subnet request count above which `swarm` rules fire.
pub const DEFAULT_SWARM_THRESHOLD: u64 = 100;

/// A single tag → action rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    pub tag: String,
    pub action: String,
}

/// A command produced by a matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub tag: String,
    /// Address or subnet substituted for the placeholder.
    pub ip: String,
    pub command: String,
}

/// An ordered set of validated rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRules {
    rules: Vec<ActionRule>,
}

impl ActionRules {
    /// Parse rules from YAML text.
    ///
    /// Tags and actions are trimmed; a rule with an empty tag or action
    /// rejects the whole list.
    pub fn parse(yaml: &str) -> Result<Self> {
        let raw: Vec<ActionRule> = serde_yaml::from_str(yaml)?;
        let mut rules = Vec::with_capacity(raw.len());

        for (index, rule) in raw.into_iter().enumerate() {
            let tag = rule.tag.trim();
            let action = rule.action.trim();
            if tag.is_empty() {
                return Err(Error::invalid_action_rule(index, "empty tag"));
            }
            if action.is_empty() {
                return Err(Error::invalid_action_rule(index, "empty action"));
            }
            rules.push(ActionRule {
                tag: tag.to_string(),
                action: action.to_string(),
            });
        }

        tracing::debug!(count = rules.len(), "loaded action rules");
        Ok(Self { rules })
    }

    /// Read rules from any input source.
    pub fn from_reader<R: Read>(mut input: R) -> Result<Self> {
        let mut yaml = String::new();
        input.read_to_string(&mut yaml)?;
        Self::parse(&yaml)
    }

    /// Read rules from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::parse(&yaml)
    }

    /// Get the rules in file order.
    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// Whether the rule list is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Plan commands for every rule whose tag occurs in a line.
    ///
    /// Each (address, action) pair is planned once, in first-seen order.
    ///
    /// ```rust
    /// use rsla::action::ActionRules;
    ///
    /// let rules = ActionRules::parse("- tag: wp-login\n  action: deny {ipaddress}\n")?;
    /// let planned = rules.plan_lines([
    ///     r#"6.6.6.6 - - [01/Jan/2023:00:00:01 +0000] "GET /wp-login.php HTTP/1.1" 404 0"#,
    ///     r#"6.6.6.6 - - [01/Jan/2023:00:00:02 +0000] "GET /wp-login.php HTTP/1.1" 404 0"#,
    /// ]);
    ///
    /// assert_eq!(planned.len(), 1);
    /// assert_eq!(planned[0].command, "deny 6.6.6.6");
    /// # Ok::<(), rsla::Error>(())
    /// ```
    pub fn plan_lines<'a, I>(&self, lines: I) -> Vec<PlannedAction>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut planned = Vec::new();

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let ip = line_ip(line);
            for rule in self.rules.iter().filter(|r| line.contains(r.tag.as_str())) {
                if seen.entry(ip.to_string()).or_default().insert(rule.action.as_str()) {
                    planned.push(plan(rule, ip));
                }
            }
        }

        planned
    }

    /// Plan `swarm` commands for subnets seen more than `threshold` times.
    pub fn plan_swarms(&self, subnets: &CountTable, threshold: u64) -> Vec<PlannedAction> {
        let swarm_rules: Vec<&ActionRule> =
            self.rules.iter().filter(|r| r.tag == SWARM_TAG).collect();

        subnets
            .iter()
            .filter(|(_, count)| **count > threshold)
            .flat_map(|(subnet, count)| {
                tracing::info!(subnet = %subnet, count, "swarming subnet");
                swarm_rules.iter().map(move |rule| plan(rule, subnet))
            })
            .collect()
    }
}

fn plan(rule: &ActionRule, ip: &str) -> PlannedAction {
    PlannedAction {
        tag: rule.tag.clone(),
        ip: ip.to_string(),
        command: rule.action.replace('\n', " ").replace(IP_PLACEHOLDER, ip),
    }
}

fn ipv4_like() -> &'static Regex {
    static IPV4_LIKE: OnceLock<Regex> = OnceLock::new();
    IPV4_LIKE.get_or_init(|| {
        Regex::new(r"[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+").expect("valid ipv4 regex")
    })
}

/// First space-separated part of a line that looks like an IPv4 address.
fn line_ip(line: &str) -> &str {
    line.split(' ')
        .find(|part| ipv4_like().is_match(part))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
- tag: wp-login
  action: " ufw deny from {ipaddress} "
- tag: swarm
  action: |
    iptables -A INPUT
    -s {ipaddress} -j DROP
"#;

    #[test]
    fn test_parse_trims_rules() {
        let rules = ActionRules::parse(RULES).unwrap();
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(rules.rules()[0].action, "ufw deny from {ipaddress}");
        assert_eq!(rules.rules()[1].tag, "swarm");
    }

    #[test]
    fn test_parse_rejects_empty_fields() {
        let yaml = "- tag: a\n  action: b\n- tag: '  '\n  action: c\n";
        let err = ActionRules::parse(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidActionRule { index: 1, .. }));

        assert!(matches!(
            ActionRules::parse("- tag: a\n"),
            Err(Error::Yaml { .. })
        ));
    }

    #[test]
    fn test_plan_lines_dedups_per_ip() {
        let rules = ActionRules::parse(RULES).unwrap();
        let lines = [
            "1.1.1.1 - - [x] \"GET /wp-login.php HTTP/1.1\" 404 0",
            "",
            "1.1.1.1 - - [x] \"GET /wp-login.php HTTP/1.1\" 404 0",
            "2.2.2.2 - - [x] \"GET /wp-login.php HTTP/1.1\" 404 0",
            "3.3.3.3 - - [x] \"GET / HTTP/1.1\" 200 0",
        ];
        let planned = rules.plan_lines(lines);

        let commands: Vec<&str> = planned.iter().map(|p| p.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["ufw deny from 1.1.1.1", "ufw deny from 2.2.2.2"]
        );
    }

    #[test]
    fn test_plan_swarms_over_threshold() {
        let rules = ActionRules::parse(RULES).unwrap();
        let mut subnets = CountTable::new();
        subnets.insert("10.0.0.0/24".to_string(), 101);
        subnets.insert("10.0.1.0/24".to_string(), 100);

        let planned = rules.plan_swarms(&subnets, DEFAULT_SWARM_THRESHOLD);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].ip, "10.0.0.0/24");
        assert_eq!(
            planned[0].command,
            "iptables -A INPUT -s 10.0.0.0/24 -j DROP"
        );
    }

    #[test]
    fn test_line_ip() {
        assert_eq!(line_ip("host 10.1.2.3 rest"), "10.1.2.3");
        assert_eq!(line_ip("no address here"), "");
    }
}
