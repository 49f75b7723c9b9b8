//! Route Graph - fuzzy-weighted server topology
//!
//! Provides graph-based routing between a fixed set of servers:
//!
//! - Topology built wholesale from averaged link metrics
//! - Edge weights from the fuzzy link quality evaluator (always >= 1)
//! - Optimal route search (Dijkstra)
//! - Ranked alternatives (Yen's k shortest simple paths)
//!
//! A [`RouteGraph`] is an owned snapshot: rebuilding produces a new value
//! rather than mutating the old one, so callers can swap snapshots while
//! readers finish on the previous graph.

use link_quality::FuzzyQualityEvaluator;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod metrics;
pub mod routing;
mod search;

pub use metrics::{lookup, LinkMetric, MetricsTable, PairKey};
pub use routing::{RankedRoute, RouteResult, PATH_SEPARATOR};

/// Routing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("No path found between {0} and {1}")]
    NoPath(String, String),
    #[error("Invalid metric for {pair}: {reason}")]
    InvalidMetric { pair: String, reason: String },
}

impl RoutingError {
    /// Missing node or missing path; callers usually skip the pair
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::NoPath(_, _))
    }
}

pub type Result<T> = std::result::Result<T, RoutingError>;

/// A server vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerNode {
    pub id: String,
}

/// Undirected link between two servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    /// Routing cost (>= 1, lower = better)
    pub weight: f64,
    /// Defuzzified quality (0-10)
    pub quality_score: f64,
    /// Metrics the weight was derived from
    pub metric: LinkMetric,
}

/// A metric that was left out of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedLink {
    pub pair: PairKey,
    pub reason: String,
}

/// Outcome of a graph build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub nodes: usize,
    pub edges: usize,
    /// Invalid metrics, omitted per edge
    pub rejected: Vec<RejectedLink>,
    /// Table entries that name no declared server pair
    pub ignored: usize,
}

/// Graph statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Servers with no link at all
    pub isolated_nodes: usize,
}

/// Weighted undirected server graph
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    graph: UnGraph<ServerNode, WeightedEdge>,
    node_index: HashMap<String, NodeIndex>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph over `servers` from averaged metrics.
    ///
    /// Every declared pair with an entry (either ordering) gets one edge.
    /// Pairs with invalid metrics are omitted and reported; they do not
    /// abort the build.
    pub fn from_metrics(
        servers: &[String],
        metrics: &MetricsTable,
        evaluator: &FuzzyQualityEvaluator,
    ) -> (Self, BuildSummary) {
        let mut graph = Self::new();
        let mut summary = BuildSummary::default();
        let mut used: HashSet<&PairKey> = HashSet::new();

        for id in servers {
            graph.add_node(id);
        }

        let nodes: Vec<(NodeIndex, String)> = graph
            .graph
            .node_indices()
            .map(|n| (n, graph.graph[n].id.clone()))
            .collect();
        for (i, (a, first)) in nodes.iter().enumerate() {
            for (b, second) in &nodes[i + 1..] {
                let Some((key, metric)) = lookup(metrics, first, second) else {
                    continue;
                };
                used.insert(key);

                if let Err(e) = metric.validate(key) {
                    warn!(pair = %key, error = %e, "rejecting link metric");
                    summary.rejected.push(RejectedLink {
                        pair: key.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }

                let assessment = evaluator.assess(
                    metric.latency_ms,
                    metric.availability_pct,
                    metric.packet_loss_pct,
                );
                debug!(
                    pair = %key,
                    weight = assessment.weight,
                    quality = assessment.quality_score,
                    "adding edge"
                );
                let edge = WeightedEdge {
                    weight: assessment.weight,
                    quality_score: assessment.quality_score,
                    metric: *metric,
                };
                graph.graph.add_edge(*a, *b, edge);
            }
        }

        summary.nodes = graph.graph.node_count();
        summary.edges = graph.graph.edge_count();
        summary.ignored = metrics.len() - used.len();
        if summary.ignored > 0 {
            warn!(ignored = summary.ignored, "metrics for undeclared server pairs ignored");
        }
        info!(
            nodes = summary.nodes,
            edges = summary.edges,
            rejected = summary.rejected.len(),
            "route graph built"
        );

        (graph, summary)
    }

    /// Add a server; re-adding an existing ID returns its index
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(ServerNode { id: id.to_string() });
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    /// Link two servers, replacing any existing edge between them
    pub fn add_edge(&mut self, a: &str, b: &str, edge: WeightedEdge) -> Result<()> {
        let from = self
            .index_of(a)
            .ok_or_else(|| RoutingError::NodeNotFound(a.to_string()))?;
        let to = self
            .index_of(b)
            .ok_or_else(|| RoutingError::NodeNotFound(b.to_string()))?;

        match self.graph.find_edge(from, to) {
            Some(existing) => self.graph[existing] = edge,
            None => {
                self.graph.add_edge(from, to, edge);
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Server IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|n| n.id.as_str())
    }

    /// Edge between two servers, in either direction
    pub fn edge(&self, a: &str, b: &str) -> Option<&WeightedEdge> {
        self.index_edge(self.index_of(a)?, self.index_of(b)?)
    }

    /// Exact sum of edge weights along `path`; `None` if a hop has no edge
    pub fn path_weight<S: AsRef<str>>(&self, path: &[S]) -> Option<f64> {
        let indices = path
            .iter()
            .map(|id| self.index_of(id.as_ref()))
            .collect::<Option<Vec<_>>>()?;
        self.index_path_weight(&indices)
    }

    pub fn stats(&self) -> GraphStats {
        let isolated_nodes = self
            .graph
            .node_indices()
            .filter(|&n| self.graph.neighbors(n).next().is_none())
            .count();

        GraphStats {
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            isolated_nodes,
        }
    }

    pub(crate) fn inner(&self) -> &UnGraph<ServerNode, WeightedEdge> {
        &self.graph
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub(crate) fn index_edge(&self, a: NodeIndex, b: NodeIndex) -> Option<&WeightedEdge> {
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    pub(crate) fn index_path_weight(&self, path: &[NodeIndex]) -> Option<f64> {
        let mut total = 0.0;
        for hop in path.windows(2) {
            total += self.index_edge(hop[0], hop[1])?.weight;
        }
        Some(total)
    }
}

/// Owns the evaluator and the current graph for a declared server set
#[derive(Debug, Clone)]
pub struct GraphOptimizer {
    servers: Vec<String>,
    evaluator: FuzzyQualityEvaluator,
    graph: RouteGraph,
}

impl GraphOptimizer {
    pub fn new(servers: Vec<String>) -> Self {
        Self::with_evaluator(servers, FuzzyQualityEvaluator::new())
    }

    pub fn with_evaluator(servers: Vec<String>, evaluator: FuzzyQualityEvaluator) -> Self {
        Self {
            servers,
            evaluator,
            graph: RouteGraph::new(),
        }
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Replace the graph with one built from `metrics`
    pub fn build(&mut self, metrics: &MetricsTable) -> BuildSummary {
        let (graph, summary) = RouteGraph::from_metrics(&self.servers, metrics, &self.evaluator);
        self.graph = graph;
        summary
    }

    /// A new optimizer over the same servers with a graph built from
    /// `metrics`; `self` is left untouched for readers still using it
    pub fn rebuilt(&self, metrics: &MetricsTable) -> (Self, BuildSummary) {
        let (graph, summary) = RouteGraph::from_metrics(&self.servers, metrics, &self.evaluator);
        let next = Self {
            servers: self.servers.clone(),
            evaluator: self.evaluator.clone(),
            graph,
        };
        (next, summary)
    }

    pub fn graph(&self) -> &RouteGraph {
        &self.graph
    }

    pub fn find_optimal_route(&self, source: &str, destination: &str) -> Result<RouteResult> {
        self.graph.find_optimal_route(source, destination)
    }

    pub fn compare_routes(&self, source: &str, destination: &str, k: usize) -> Vec<RankedRoute> {
        self.graph.compare_routes(source, destination, k)
    }
}
