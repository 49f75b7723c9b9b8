//! Metrics snapshots from the external collector
//!
//! The collector writes one JSON object keyed `"<server>-<server>"`, holding
//! either averaged metrics per pair or the raw samples of each window.
//! Raw samples are averaged here before the graph is built.

use crate::Result;
use chrono::NaiveDateTime;
use route_graph::{LinkMetric, MetricsTable, PairKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// One measurement window for a server pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    /// Missing when every ping in the window failed
    #[serde(alias = "latency")]
    pub latency_ms: Option<f64>,
    #[serde(alias = "packet_loss")]
    pub packet_loss_pct: f64,
    #[serde(alias = "availability")]
    pub availability_pct: f64,
    #[serde(default, alias = "jitter")]
    pub jitter_ms: f64,
}

/// Average a pair's samples.
///
/// Latency is averaged over samples that measured one (missing or zero
/// latencies are skipped); loss and availability over all samples. `None`
/// when no sample carries a latency.
pub fn average_samples(samples: &[MetricSample]) -> Option<LinkMetric> {
    let latencies: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.latency_ms)
        .filter(|&l| l != 0.0)
        .collect();
    if latencies.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    Some(LinkMetric {
        latency_ms: latencies.iter().sum::<f64>() / latencies.len() as f64,
        availability_pct: samples.iter().map(|s| s.availability_pct).sum::<f64>() / n,
        packet_loss_pct: samples.iter().map(|s| s.packet_loss_pct).sum::<f64>() / n,
    })
}

/// Average every pair, skipping pairs without usable samples
pub fn average_snapshot(raw: &HashMap<PairKey, Vec<MetricSample>>) -> MetricsTable {
    raw.iter()
        .filter_map(|(pair, samples)| match average_samples(samples) {
            Some(metric) => Some((pair.clone(), metric)),
            None => {
                warn!(pair = %pair, samples = samples.len(), "no latency measured, pair skipped");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSnapshot {
    Averaged(HashMap<String, LinkMetric>),
    Samples(HashMap<String, Vec<MetricSample>>),
}

/// Resolve textual pair keys against the declared servers, dropping unknown ones
fn resolve_keys<T>(raw: HashMap<String, T>, servers: &[String]) -> HashMap<PairKey, T> {
    let mut resolved = HashMap::with_capacity(raw.len());
    let mut skipped = 0;

    for (text, value) in raw {
        match PairKey::parse(&text, servers) {
            Some(pair) => {
                resolved.insert(pair, value);
            }
            None => {
                warn!(key = %text, "pair key names no declared servers");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unknown pair keys", skipped);
    }
    resolved
}

/// Parse a snapshot (averaged or raw) into an averaged metrics table
pub fn parse_metrics(json: &str, servers: &[String]) -> Result<MetricsTable> {
    let snapshot: RawSnapshot = serde_json::from_str(json)?;
    Ok(from_snapshot(snapshot, servers))
}

/// Load a snapshot file into an averaged metrics table
pub fn load_metrics(path: impl AsRef<Path>, servers: &[String]) -> Result<MetricsTable> {
    let path = path.as_ref();
    info!("Loading metrics snapshot from {:?}", path);

    let file = File::open(path)?;
    let snapshot: RawSnapshot = serde_json::from_reader(BufReader::new(file))?;
    let table = from_snapshot(snapshot, servers);

    info!("Loaded metrics for {} server pairs", table.len());
    Ok(table)
}

fn from_snapshot(snapshot: RawSnapshot, servers: &[String]) -> MetricsTable {
    match snapshot {
        RawSnapshot::Averaged(metrics) => resolve_keys(metrics, servers),
        RawSnapshot::Samples(samples) => average_snapshot(&resolve_keys(samples, servers)),
    }
}

/// Load recorded route latencies keyed `"<source>_to_<destination>"`
pub fn load_actuals(path: impl AsRef<Path>) -> Result<HashMap<String, f64>> {
    let path = path.as_ref();
    info!("Loading measured route latencies from {:?}", path);

    let file = File::open(path)?;
    let actuals: HashMap<String, f64> = serde_json::from_reader(BufReader::new(file))?;
    Ok(actuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn servers() -> Vec<String> {
        ["Google_Cloud", "AWS", "Azure"].iter().map(|s| s.to_string()).collect()
    }

    fn sample(latency: Option<f64>, loss: f64, availability: f64) -> MetricSample {
        MetricSample {
            timestamp: None,
            latency_ms: latency,
            packet_loss_pct: loss,
            availability_pct: availability,
            jitter_ms: 0.0,
        }
    }

    #[test]
    fn test_average_samples() {
        let samples = vec![
            sample(Some(10.0), 0.0, 100.0),
            sample(None, 100.0, 50.0),
            sample(Some(30.0), 0.0, 90.0),
        ];
        let metric = average_samples(&samples).unwrap();
        assert_eq!(metric.latency_ms, 20.0);
        assert!((metric.packet_loss_pct - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(metric.availability_pct, 80.0);
    }

    #[test]
    fn test_average_without_latency() {
        assert!(average_samples(&[]).is_none());
        assert!(average_samples(&[sample(None, 100.0, 0.0), sample(Some(0.0), 0.0, 100.0)]).is_none());
    }

    #[test]
    fn test_average_snapshot_skips_empty_pairs() {
        let mut raw = HashMap::new();
        raw.insert(PairKey::new("AWS", "Azure"), vec![sample(Some(12.0), 0.0, 100.0)]);
        raw.insert(PairKey::new("AWS", "Google_Cloud"), vec![sample(None, 100.0, 0.0)]);

        let table = average_snapshot(&raw);
        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&PairKey::new("AWS", "Azure")));
    }

    #[test]
    fn test_parse_averaged_snapshot() {
        let json = r#"{
            "Google_Cloud-AWS": {"latency": 20.0, "availability": 99.9, "packet_loss": 0.1},
            "Azure-AWS": {"latency_ms": 35.0, "availability_pct": 98.0, "packet_loss_pct": 0.5},
            "AWS-Nowhere": {"latency": 1.0, "availability": 100.0, "packet_loss": 0.0}
        }"#;

        let table = parse_metrics(json, &servers()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&PairKey::new("Google_Cloud", "AWS")].latency_ms, 20.0);
        assert_eq!(table[&PairKey::new("Azure", "AWS")].availability_pct, 98.0);
    }

    #[test]
    fn test_load_raw_snapshot() {
        let json = r#"{
            "Google_Cloud-AWS": [
                {"timestamp": "2024-05-01T10:00:00.123456", "latency": 18.0, "packet_loss": 0.0, "availability": 100.0, "jitter": 1.2},
                {"timestamp": "2024-05-01T10:00:30.654321", "latency": 22.0, "packet_loss": 0.0, "availability": 100.0, "jitter": 0.8}
            ],
            "Google_Cloud-Azure": []
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let table = load_metrics(file.path(), &servers()).unwrap();
        assert_eq!(table.len(), 1);
        let metric = table[&PairKey::new("Google_Cloud", "AWS")];
        assert_eq!(metric.latency_ms, 20.0);
        assert_eq!(metric.availability_pct, 100.0);
    }

    #[test]
    fn test_load_actuals() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"AWS_to_Azure": 35.5}"#).unwrap();

        let actuals = load_actuals(file.path()).unwrap();
        assert_eq!(actuals["AWS_to_Azure"], 35.5);
    }
}
