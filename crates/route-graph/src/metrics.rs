//! Link metrics supplied by the external collector

use crate::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Averaged metrics for one server pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkMetric {
    #[serde(alias = "latency")]
    pub latency_ms: f64,
    #[serde(alias = "availability")]
    pub availability_pct: f64,
    #[serde(alias = "packet_loss")]
    pub packet_loss_pct: f64,
}

impl LinkMetric {
    pub fn new(latency_ms: f64, availability_pct: f64, packet_loss_pct: f64) -> Self {
        Self {
            latency_ms,
            availability_pct,
            packet_loss_pct,
        }
    }

    /// Reject negative or non-finite latency and percentages outside [0, 100]
    pub fn validate(&self, pair: &PairKey) -> Result<()> {
        let invalid = |reason: String| {
            Err(RoutingError::InvalidMetric {
                pair: pair.to_string(),
                reason,
            })
        };

        if !self.latency_ms.is_finite() || self.latency_ms < 0.0 {
            return invalid(format!("latency {} ms", self.latency_ms));
        }
        if !is_percentage(self.availability_pct) {
            return invalid(format!("availability {}%", self.availability_pct));
        }
        if !is_percentage(self.packet_loss_pct) {
            return invalid(format!("packet loss {}%", self.packet_loss_pct));
        }
        Ok(())
    }
}

fn is_percentage(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

/// Server pair as written by the collector, `"<first>-<second>"`
///
/// Equality is ordered; [`lookup`] tries both orderings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Parse `"A-B"` against the declared servers.
    ///
    /// Identifiers may themselves contain `-`, so every split point is tried
    /// and the first one naming two declared servers wins.
    pub fn parse<S: AsRef<str>>(text: &str, servers: &[S]) -> Option<Self> {
        let declared = |id: &str| servers.iter().any(|s| s.as_ref() == id);

        text.match_indices('-').find_map(|(i, _)| {
            let (first, second) = (&text[..i], &text[i + 1..]);
            (declared(first) && declared(second)).then(|| Self::new(first, second))
        })
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Averaged metrics keyed by server pair
pub type MetricsTable = HashMap<PairKey, LinkMetric>;

/// Find the metrics for `a`/`b` under either ordering
pub fn lookup<'a>(table: &'a MetricsTable, a: &str, b: &str) -> Option<(&'a PairKey, &'a LinkMetric)> {
    table
        .get_key_value(&PairKey::new(a, b))
        .or_else(|| table.get_key_value(&PairKey::new(b, a)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_dashes_in_ids() {
        let servers = ["us-east", "eu-west", "AWS"];
        let key = PairKey::parse("us-east-eu-west", &servers).unwrap();
        assert_eq!(key, PairKey::new("us-east", "eu-west"));

        let key = PairKey::parse("AWS-us-east", &servers).unwrap();
        assert_eq!(key, PairKey::new("AWS", "us-east"));

        assert!(PairKey::parse("AWS-Azure", &servers).is_none());
        assert!(PairKey::parse("AWS", &servers).is_none());
    }

    #[test]
    fn test_lookup_both_orders() {
        let mut table = MetricsTable::new();
        table.insert(PairKey::new("B", "A"), LinkMetric::new(10.0, 99.0, 0.5));

        let (key, metric) = lookup(&table, "A", "B").unwrap();
        assert_eq!(key, &PairKey::new("B", "A"));
        assert_eq!(metric.latency_ms, 10.0);
        assert!(lookup(&table, "A", "C").is_none());
    }

    #[test]
    fn test_validate_metric() {
        let pair = PairKey::new("A", "B");
        assert!(LinkMetric::new(0.0, 100.0, 0.0).validate(&pair).is_ok());
        assert!(LinkMetric::new(-1.0, 99.0, 0.0).validate(&pair).is_err());
        assert!(LinkMetric::new(10.0, 101.0, 0.0).validate(&pair).is_err());
        assert!(LinkMetric::new(10.0, 99.0, -0.1).validate(&pair).is_err());
        assert!(LinkMetric::new(f64::NAN, 99.0, 0.0).validate(&pair).is_err());
    }

    #[test]
    fn test_metric_accepts_short_field_names() {
        let json = r#"{"latency": 20.0, "availability": 99.9, "packet_loss": 0.1}"#;
        let metric: LinkMetric = serde_json::from_str(json).unwrap();
        assert_eq!(metric, LinkMetric::new(20.0, 99.9, 0.1));
    }
}
