//! labelscan - read batch number, manufacturing and expiry dates off product labels.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labelscan_ocr::FieldClassifier;
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;
use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "labelscan", version)]
#[command(about = "Extract batch number, manufacturing date and expiry date from label OCR results")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Minimum OCR score to keep a detection; overrides the configured value
    #[arg(short, long, global = true)]
    threshold: Option<f32>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify saved OCR engine results (JSON)
    Classify {
        #[arg(required = true)]
        results: Vec<PathBuf>,
    },
    /// OCR a captured frame and classify it
    Scan {
        image: PathBuf,
        /// Replay a saved OCR result instead of running the OCR command
        #[arg(long)]
        ocr_json: Option<PathBuf>,
    },
    /// Scan every frame dropped into a folder
    Watch {
        /// Folder to watch (defaults to the configured intake folder)
        dir: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(args.config.as_deref())?;
    let offline = FieldClassifier::new(args.threshold.unwrap_or(config.classifier.score_threshold));
    let interactive =
        FieldClassifier::new(args.threshold.unwrap_or(config.classifier.interactive_score_threshold));

    match args.command {
        Command::Classify { results } => commands::classify(&results, offline, args.format),
        Command::Scan { image, ocr_json } => {
            commands::scan(&image, ocr_json, interactive, &config, args.format).await
        }
        Command::Watch { dir } => {
            let dir = dir
                .or_else(|| config.intake_dir())
                .context("No intake folder given and no default location available")?;
            commands::watch(&dir, interactive, &config, args.format).await
        }
        Command::Config => commands::show_config(&config),
    }
}
