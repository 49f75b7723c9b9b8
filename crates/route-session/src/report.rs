//! Optimization report export

use crate::session::{RouteAnalysis, RouteValidation};
use crate::Result;
use chrono::{DateTime, Utc};
use route_graph::BuildSummary;
use route_validation::AggregateMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_routes_analyzed: usize,
    pub validation_samples: usize,
    /// Graph build the routes were computed on
    pub build: BuildSummary,
}

/// Outcome of one optimization cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub metadata: ReportMetadata,
    pub routes: Vec<RouteAnalysis>,
    pub validations: Vec<RouteValidation>,
    /// Statistics over the session's whole validation history
    pub aggregate: Option<AggregateMetrics>,
    pub key_findings: Vec<String>,
}

impl OptimizationReport {
    pub fn new(
        routes: Vec<RouteAnalysis>,
        validations: Vec<RouteValidation>,
        aggregate: Option<AggregateMetrics>,
        build: BuildSummary,
        threshold_pct: f64,
    ) -> Self {
        let key_findings = key_findings(&routes, aggregate.as_ref(), threshold_pct);

        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                total_routes_analyzed: routes.len(),
                validation_samples: validations.len(),
                build,
            },
            routes,
            validations,
            aggregate,
            key_findings,
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Human-readable highlights of a cycle
pub fn key_findings(
    routes: &[RouteAnalysis],
    aggregate: Option<&AggregateMetrics>,
    threshold_pct: f64,
) -> Vec<String> {
    let mut findings = Vec::new();

    if let Some(metrics) = aggregate {
        if metrics.mape <= threshold_pct {
            findings.push(format!("Highly accurate model: MAPE = {:.2}%", metrics.mape));
        } else {
            findings.push(format!("Moderate model accuracy: MAPE = {:.2}%", metrics.mape));
        }
        findings.push(format!("Prediction fit: R² = {:.3}", metrics.r_squared));
    }

    let fastest_direct = routes
        .iter()
        .filter(|r| r.optimal.is_direct())
        .min_by(|a, b| {
            a.optimal
                .estimated_latency_ms
                .total_cmp(&b.optimal.estimated_latency_ms)
        });
    if let Some(best) = fastest_direct {
        findings.push(format!(
            "Most efficient route: {} ({:.1}ms)",
            best.key, best.optimal.estimated_latency_ms
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_graph::RouteResult;

    fn analysis(source: &str, destination: &str, path: &[&str], latency: f64) -> RouteAnalysis {
        let optimal = RouteResult {
            path: path.iter().map(|s| s.to_string()).collect(),
            total_weight: path.len() as f64,
            estimated_latency_ms: latency,
            min_availability_pct: 99.0,
            max_packet_loss_pct: 0.5,
        };
        RouteAnalysis {
            key: format!("{}_to_{}", source, destination),
            source: source.to_string(),
            destination: destination.to_string(),
            optimal,
            alternatives: Vec::new(),
        }
    }

    fn metrics(mape: f64) -> AggregateMetrics {
        AggregateMetrics {
            mae: 4.0,
            rmse: 5.0,
            mape,
            correlation: 0.98,
            r_squared: 0.9512,
            sample_size: 4,
            mape_samples: 4,
        }
    }

    #[test]
    fn test_findings_accurate_model() {
        let routes = vec![
            analysis("A", "B", &["A", "B"], 20.0),
            analysis("A", "C", &["A", "B", "C"], 5.0),
            analysis("B", "C", &["B", "C"], 12.345),
        ];
        let findings = key_findings(&routes, Some(&metrics(7.5)), 10.0);

        assert_eq!(
            findings,
            vec![
                "Highly accurate model: MAPE = 7.50%",
                "Prediction fit: R² = 0.951",
                "Most efficient route: B_to_C (12.3ms)",
            ]
        );
    }

    #[test]
    fn test_findings_moderate_model() {
        let findings = key_findings(&[], Some(&metrics(14.2)), 10.0);
        assert_eq!(findings[0], "Moderate model accuracy: MAPE = 14.20%");
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_findings_without_validation() {
        let routes = vec![analysis("A", "C", &["A", "B", "C"], 5.0)];
        assert!(key_findings(&routes, None, 10.0).is_empty());
    }

    #[test]
    fn test_report_json() {
        let routes = vec![analysis("A", "B", &["A", "B"], 20.0)];
        let report = OptimizationReport::new(routes, Vec::new(), None, BuildSummary::default(), 10.0);

        assert_eq!(report.metadata.total_routes_analyzed, 1);
        let json = report.to_json().unwrap();
        let parsed: OptimizationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
