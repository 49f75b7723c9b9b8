//! Routing session - current graph snapshot, all-pairs analysis, validation

use crate::config::SessionConfig;
use crate::report::OptimizationReport;
use crate::Result;
use link_quality::FuzzyQualityEvaluator;
use parking_lot::{Mutex, RwLock};
use route_graph::{BuildSummary, GraphOptimizer, MetricsTable, RankedRoute, RouteResult};
use route_validation::{AggregateMetrics, PredictionValidator, ValidationRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Re-measures a route after it has been predicted
pub trait RouteProbe {
    /// Measured end-to-end latency (ms), `None` when the route cannot be measured
    fn measure_route(&self, route_key: &str, path: &[String]) -> Option<f64>;
}

/// Recorded measurements keyed by route key
impl RouteProbe for HashMap<String, f64> {
    fn measure_route(&self, route_key: &str, _path: &[String]) -> Option<f64> {
        self.get(route_key).copied()
    }
}

impl<F> RouteProbe for F
where
    F: Fn(&str, &[String]) -> Option<f64>,
{
    fn measure_route(&self, route_key: &str, path: &[String]) -> Option<f64> {
        self(route_key, path)
    }
}

/// Route key used in reports and recorded measurements
pub fn route_key(source: &str, destination: &str) -> String {
    format!("{}_to_{}", source, destination)
}

/// Optimal route and ranked alternatives for one ordered server pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub key: String,
    pub source: String,
    pub destination: String,
    pub optimal: RouteResult,
    pub alternatives: Vec<RankedRoute>,
}

/// A predicted route checked against its measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteValidation {
    pub route: String,
    pub path: String,
    pub record: ValidationRecord,
}

/// Holds the current graph snapshot and the prediction history.
///
/// Refreshing builds a new optimizer and swaps it in; readers that already
/// cloned the previous snapshot finish on it undisturbed.
pub struct RoutingSession {
    config: SessionConfig,
    optimizer: RwLock<Arc<GraphOptimizer>>,
    validator: Mutex<PredictionValidator>,
}

impl RoutingSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let evaluator = FuzzyQualityEvaluator::with_config(config.fuzzy.clone())?;
        let optimizer = GraphOptimizer::with_evaluator(config.server_ids(), evaluator);
        let validator = PredictionValidator::with_threshold(config.accuracy_threshold_pct);

        info!(
            servers = config.servers.len(),
            alternatives = config.alternatives,
            "routing session created"
        );

        Ok(Self {
            config,
            optimizer: RwLock::new(Arc::new(optimizer)),
            validator: Mutex::new(validator),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current graph snapshot
    pub fn optimizer(&self) -> Arc<GraphOptimizer> {
        self.optimizer.read().clone()
    }

    /// Rebuild the graph from fresh metrics and swap it in
    pub fn refresh(&self, metrics: &MetricsTable) -> BuildSummary {
        self.swap_in(metrics).1
    }

    fn swap_in(&self, metrics: &MetricsTable) -> (Arc<GraphOptimizer>, BuildSummary) {
        let (next, summary) = self.optimizer().rebuilt(metrics);
        let next = Arc::new(next);
        *self.optimizer.write() = Arc::clone(&next);
        (next, summary)
    }

    pub fn route(&self, source: &str, destination: &str) -> Result<RouteResult> {
        Ok(self.optimizer().find_optimal_route(source, destination)?)
    }

    /// Optimal route plus alternatives for every ordered pair of declared servers
    pub fn analyze(&self) -> Vec<RouteAnalysis> {
        self.analyze_on(&self.optimizer())
    }

    fn analyze_on(&self, optimizer: &GraphOptimizer) -> Vec<RouteAnalysis> {
        let servers: Vec<&str> = optimizer.graph().node_ids().collect();
        let mut analyses = Vec::new();

        for &source in &servers {
            for &destination in &servers {
                if source == destination {
                    continue;
                }

                let optimal = match optimizer.find_optimal_route(source, destination) {
                    Ok(route) => route,
                    Err(e) => {
                        debug!(source, destination, error = %e, "pair skipped");
                        continue;
                    }
                };
                let alternatives =
                    optimizer.compare_routes(source, destination, self.config.alternatives);

                info!(
                    "Route {} -> {}: {} (weight {:.2}, latency {:.1}ms, {} alternatives)",
                    source,
                    destination,
                    optimal.path_label(),
                    optimal.total_weight,
                    optimal.estimated_latency_ms,
                    alternatives.len()
                );

                analyses.push(RouteAnalysis {
                    key: route_key(source, destination),
                    source: source.to_string(),
                    destination: destination.to_string(),
                    optimal,
                    alternatives,
                });
            }
        }

        analyses
    }

    /// Validate each optimal route's latency estimate against `probe`.
    ///
    /// Routes the probe cannot measure are skipped. The history lock is only
    /// held while recording, never across a measurement.
    pub fn validate(&self, routes: &[RouteAnalysis], probe: &dyn RouteProbe) -> Vec<RouteValidation> {
        let mut validations = Vec::new();

        for analysis in routes {
            let Some(actual) = probe.measure_route(&analysis.key, &analysis.optimal.path) else {
                debug!(route = %analysis.key, "no measurement, validation skipped");
                continue;
            };

            let recorded = self
                .validator
                .lock()
                .validate(analysis.optimal.estimated_latency_ms, actual);
            let record = match recorded {
                Ok(record) => record,
                Err(e) => {
                    warn!(route = %analysis.key, error = %e, "measurement rejected");
                    continue;
                }
            };

            info!(
                "Validated {}: predicted {:.1}ms, actual {:.1}ms, error {:.2}%",
                analysis.key, record.predicted, record.actual, record.percentage_error
            );
            validations.push(RouteValidation {
                route: analysis.key.clone(),
                path: analysis.optimal.path_label(),
                record,
            });
        }

        validations
    }

    /// Statistics over every validation recorded by this session
    pub fn aggregate(&self) -> Result<AggregateMetrics> {
        Ok(self.validator.lock().aggregate()?)
    }

    pub fn validation_count(&self) -> usize {
        self.validator.lock().len()
    }

    /// Refresh, analyze, optionally validate, and report
    pub fn run_cycle(&self, metrics: &MetricsTable, probe: Option<&dyn RouteProbe>) -> OptimizationReport {
        let (optimizer, build) = self.swap_in(metrics);
        let routes = self.analyze_on(&optimizer);
        let validations = probe
            .map(|probe| self.validate(&routes, probe))
            .unwrap_or_default();
        let aggregate = self.aggregate().ok();

        info!(
            routes = routes.len(),
            validations = validations.len(),
            "optimization cycle complete"
        );

        OptimizationReport::new(
            routes,
            validations,
            aggregate,
            build,
            self.config.accuracy_threshold_pct,
        )
    }
}
