//! Route Session - optimization cycles over a server set
//!
//! Ties the pieces together:
//!
//! - [`config`] - declared servers and evaluator parameters
//! - [`samples`] - collector snapshots, averaged per server pair
//! - [`session`] - the current graph, all-pairs analysis, validation
//! - [`report`] - JSON report of one cycle
//!
//! ## Cycle
//!
//! ```text
//! snapshot ──► average ──► rebuild graph ──► swap ──► analyze pairs
//!                                                          │
//!                              report ◄── aggregate ◄── validate
//! ```

use link_quality::QualityError;
use route_graph::RoutingError;
use route_validation::ValidationError;
use thiserror::Error;

pub mod config;
pub mod report;
pub mod samples;
pub mod session;

pub use config::{ServerEntry, SessionConfig, DEFAULT_ALTERNATIVES};
pub use report::{key_findings, OptimizationReport, ReportMetadata};
pub use samples::{average_samples, load_actuals, load_metrics, parse_metrics, MetricSample};
pub use session::{route_key, RouteAnalysis, RouteProbe, RouteValidation, RoutingSession};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
