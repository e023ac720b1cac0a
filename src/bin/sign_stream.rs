//! Sign Stream CLI
//!
//! Runs the kernel algorithms over JSON documents:
//! - `linearize`: every reading of a line
//! - `validate`: check a line's anchors and paths
//! - `reconcile`: edit plan merging a source line into a target line
//! - `place-roi`: place an ROI on its artefact
//! - `validate-shape`: normalize a WKT polygon
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SIGN_STREAM_CONFIG`: path to a JSON kernel config (or pass `--config`)
//! - `SIGN_STREAM_ALIGNMENT_HINT`, `SIGN_STREAM_AUTHOR`, ...: see `KernelConfig`
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin sign_stream -- reconcile --target stored.json --source imported.json --hint prefer-earlier
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sign_stream_kernel::{
    AlignmentHint, ArtefactGeometry, InterpretationRoi, KernelConfig, Line, LineAnchors,
    Linearizer, Reconciler, RoiTransform, ShapeValidator, SimpleShapeValidator,
};

#[derive(Parser)]
#[command(name = "sign_stream", version, about = "Sign-interpretation stream tools")]
struct Cli {
    /// Path to a JSON kernel config (overrides SIGN_STREAM_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every reading path of a line
    Linearize {
        /// Line JSON
        #[arg(long, value_name = "PATH")]
        line: PathBuf,
    },
    /// Check that a line runs from its start anchor to an end anchor
    Validate {
        /// Line JSON
        #[arg(long, value_name = "PATH")]
        line: PathBuf,
    },
    /// Print the edit plan merging a source line into a target line
    Reconcile {
        /// Stored line JSON
        #[arg(long, value_name = "PATH")]
        target: PathBuf,
        /// Ingested line JSON
        #[arg(long, value_name = "PATH")]
        source: PathBuf,
        /// strict, prefer-earlier or prefer-later (default: from config)
        #[arg(long)]
        hint: Option<AlignmentHint>,
    },
    /// Place an ROI on its artefact
    PlaceRoi {
        /// ROI JSON
        #[arg(long, value_name = "PATH")]
        roi: PathBuf,
        /// Artefact geometry JSON
        #[arg(long, value_name = "PATH")]
        artefact: PathBuf,
    },
    /// Validate and normalize a WKT polygon
    ValidateShape {
        /// WKT text, e.g. "POLYGON((0 0,4 0,4 3,0 3,0 0))"
        wkt: String,
    },
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sign_stream=info,sign_stream_kernel=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&text)
        .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KernelConfig::from_file(path)?.with_overrides(|name| std::env::var(name).ok()),
        None => KernelConfig::from_env()?,
    };
    let vocabulary = &config.vocabulary;

    match cli.command {
        Commands::Linearize { line } => {
            let line: Line = read_json(&line)?;
            let sequences = Linearizer::new(vocabulary).linearize(&line)?;
            info!(line = %line.id, sequences = sequences.len(), "linearized");
            print_json(&sequences, cli.pretty)?;
        }
        Commands::Validate { line } => {
            let line: Line = read_json(&line)?;
            LineAnchors::new(vocabulary).validate(&line)?;
            info!(line = %line.id, "line is well formed");
        }
        Commands::Reconcile { target, source, hint } => {
            let target: Line = read_json(&target)?;
            let source: Line = read_json(&source)?;
            let hint = hint.unwrap_or(config.alignment.hint);
            let plan = Reconciler::new(vocabulary, config.author)
                .with_config(config.alignment)
                .reconcile_with_hint(&target, &source, hint)?;
            info!(
                line = %target.id,
                hint = %hint,
                inserts = plan.num_inserts(),
                updates = plan.num_updates(),
                deletes = plan.num_deletes(),
                "reconciled"
            );
            print_json(&plan, cli.pretty)?;
        }
        Commands::PlaceRoi { roi, artefact } => {
            let roi: InterpretationRoi = read_json(&roi)?;
            let artefact: ArtefactGeometry = read_json(&artefact)?;
            let shape = SimpleShapeValidator.validate(&roi.shape)?;
            let placed = RoiTransform::place(&InterpretationRoi { shape, ..roi }, &artefact)?;
            print_json(&placed, cli.pretty)?;
        }
        Commands::ValidateShape { wkt } => {
            let polygon = SimpleShapeValidator.validate_wkt(&wkt)?;
            println!("{}", sign_stream_kernel::roi::to_wkt(&polygon));
        }
    }
    Ok(())
}
