//! Route results and per-route metric aggregation
//!
//! A route carries the path plus metrics folded over its edges:
//! - Total weight - sum of fuzzy edge weights
//! - Estimated latency - sum of edge latencies
//! - Minimum availability - weakest edge
//! - Maximum packet loss - lossiest edge

use crate::search::{k_shortest_paths, shortest_path, Exclusions};
use crate::{Result, RouteGraph, RoutingError};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Separator used when rendering a path for reports
pub const PATH_SEPARATOR: &str = " → ";

/// A route between two servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Server IDs in traversal order (at least two, no repeats)
    pub path: Vec<String>,
    /// Sum of traversed edge weights
    pub total_weight: f64,
    /// Sum of traversed edge latencies (ms)
    pub estimated_latency_ms: f64,
    /// Lowest availability along the path (%)
    pub min_availability_pct: f64,
    /// Highest packet loss along the path (%)
    pub max_packet_loss_pct: f64,
}

impl RouteResult {
    pub fn source(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    pub fn destination(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Direct link, no intermediate servers
    pub fn is_direct(&self) -> bool {
        self.path.len() == 2
    }

    /// `A → B → C`
    pub fn path_label(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }
}

/// One entry of an alternatives comparison, ranked from 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRoute {
    pub rank: usize,
    #[serde(flatten)]
    pub route: RouteResult,
}

impl RouteGraph {
    /// Minimum-weight route from `source` to `destination` (Dijkstra)
    pub fn find_optimal_route(&self, source: &str, destination: &str) -> Result<RouteResult> {
        let (from, to) = self.endpoints(source, destination)?;

        shortest_path(self, from, to, &Exclusions::default())
            .and_then(|path| self.summarize(&path))
            .ok_or_else(|| {
                debug!(source, destination, "no path");
                RoutingError::NoPath(source.to_string(), destination.to_string())
            })
    }

    /// Up to `k` simple routes in non-decreasing weight order.
    ///
    /// Empty when either server is unknown or no path exists.
    pub fn compare_routes(&self, source: &str, destination: &str, k: usize) -> Vec<RankedRoute> {
        let (from, to) = match self.endpoints(source, destination) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                debug!(source, destination, error = %e, "no alternatives");
                return Vec::new();
            }
        };

        k_shortest_paths(self, from, to, k)
            .iter()
            .filter_map(|path| self.summarize(path))
            .enumerate()
            .map(|(i, route)| RankedRoute { rank: i + 1, route })
            .collect()
    }

    fn endpoints(&self, source: &str, destination: &str) -> Result<(NodeIndex, NodeIndex)> {
        let from = self
            .index_of(source)
            .ok_or_else(|| RoutingError::NodeNotFound(source.to_string()))?;
        let to = self
            .index_of(destination)
            .ok_or_else(|| RoutingError::NodeNotFound(destination.to_string()))?;
        if from == to {
            return Err(RoutingError::NoPath(source.to_string(), destination.to_string()));
        }
        Ok((from, to))
    }

    /// Fold edge metrics along a node path; `None` if a hop has no edge
    fn summarize(&self, path: &[NodeIndex]) -> Option<RouteResult> {
        if path.len() < 2 {
            return None;
        }

        let mut total_weight = 0.0;
        let mut total_latency = 0.0;
        let mut min_availability = f64::INFINITY;
        let mut max_packet_loss = f64::NEG_INFINITY;

        for hop in path.windows(2) {
            let edge = self.index_edge(hop[0], hop[1])?;
            total_weight += edge.weight;
            total_latency += edge.metric.latency_ms;
            min_availability = min_availability.min(edge.metric.availability_pct);
            max_packet_loss = max_packet_loss.max(edge.metric.packet_loss_pct);
        }

        Some(RouteResult {
            path: path.iter().map(|&n| self.inner()[n].id.clone()).collect(),
            total_weight,
            estimated_latency_ms: total_latency,
            min_availability_pct: min_availability,
            max_packet_loss_pct: max_packet_loss,
        })
    }
}
