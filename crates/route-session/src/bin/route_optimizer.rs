//! Route Optimization CLI
//!
//! Builds the fuzzy-weighted server graph from a metrics snapshot, computes
//! optimal and alternative routes for every server pair, and optionally
//! validates the latency estimates against recorded measurements.
//!
//! Usage:
//!   route-optimizer --metrics data/metrics_snapshot.json \
//!                   --actuals data/measured_routes.json \
//!                   --output data/optimization_report.json

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use route_session::{samples, RouteProbe, RoutingSession, SessionConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "route-optimizer",
    about = "Fuzzy-weighted route optimization across a server set"
)]
struct Args {
    /// Session config JSON (servers, alternatives, evaluator tuning)
    #[arg(short, long, default_value = "server_config.json")]
    config: PathBuf,

    /// Metrics snapshot JSON, averaged or raw samples per server pair
    #[arg(short, long)]
    metrics: PathBuf,

    /// Measured route latencies JSON keyed "<source>_to_<destination>"
    #[arg(short, long)]
    actuals: Option<PathBuf>,

    /// Output report file (defaults to a timestamped name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of ranked alternatives per pair
    #[arg(long)]
    alternatives: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Fuzzy Route Optimizer");
    info!("{}", "=".repeat(60));

    let mut config = SessionConfig::load_or_default(&args.config)?;
    if let Some(k) = args.alternatives {
        config.alternatives = k;
    }
    let session = RoutingSession::new(config)?;

    let metrics = samples::load_metrics(&args.metrics, &session.config().server_ids())?;
    let actuals = args.actuals.as_ref().map(samples::load_actuals).transpose()?;
    let probe = actuals.as_ref().map(|a| a as &dyn RouteProbe);

    let report = session.run_cycle(&metrics, probe);

    for rejected in &report.metadata.build.rejected {
        warn!("Link {} left out: {}", rejected.pair, rejected.reason);
    }

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "optimization_report_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    info!("\nWriting report to {:?}", output);
    let file = File::create(&output)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &report)?;

    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!(
        "Graph: {} servers, {} links",
        report.metadata.build.nodes, report.metadata.build.edges
    );
    info!("Routes analyzed: {}", report.metadata.total_routes_analyzed);
    info!("Validations: {}", report.metadata.validation_samples);
    if let Some(metrics) = &report.aggregate {
        info!(
            "  MAE {:.2}ms | RMSE {:.2}ms | MAPE {:.2}% | r {:.3} | R² {:.3}",
            metrics.mae, metrics.rmse, metrics.mape, metrics.correlation, metrics.r_squared
        );
    }
    for finding in &report.key_findings {
        info!("  {}", finding);
    }

    Ok(())
}
