use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use labelscan_core::FieldRecord;
use labelscan_ocr::{
    CommandProvider, FieldClassifier, JsonFileProvider, OcrOutput, OcrProvider, ScanPipeline, ScanResult,
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::AppConfig;

/// Frame types accepted from the intake folder.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Serialize)]
struct ClassifiedFile<'a> {
    source: &'a Path,
    fields: FieldRecord,
}

// ── classify ─────────────────────────────────────────────────────────────────

/// Classify saved OCR engine results.
pub fn classify(paths: &[PathBuf], classifier: FieldClassifier, format: OutputFormat) -> Result<()> {
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let output = OcrOutput::from_json(&json)
            .with_context(|| format!("Malformed OCR result in {}", path.display()))?;
        let fields = classifier
            .classify_output(&output)
            .with_context(|| format!("Invalid OCR result in {}", path.display()))?;
        tracing::debug!("Classified {}", path.display());
        results.push(ClassifiedFile { source: path, fields });
    }

    match (format, results.as_slice()) {
        (OutputFormat::Json, [single]) => println!("{}", serde_json::to_string_pretty(&single.fields)?),
        (OutputFormat::Json, all) => println!("{}", serde_json::to_string_pretty(all)?),
        (OutputFormat::Text, [single]) => print!("{}", single.fields),
        (OutputFormat::Text, all) => {
            for r in all {
                println!("{}", r.source.display());
                print!("{}", r.fields);
            }
        }
    }
    Ok(())
}

// ── scan ─────────────────────────────────────────────────────────────────────

/// Scan a single captured frame.
pub async fn scan(
    image: &Path,
    replay: Option<PathBuf>,
    classifier: FieldClassifier,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    let pipeline = build_pipeline(replay, classifier, config)?;
    let result = pipeline
        .process_file(image)
        .await
        .with_context(|| format!("Failed to scan {}", image.display()))?;
    print_scan(&result, format)
}

// ── watch ────────────────────────────────────────────────────────────────────

/// Scan every frame dropped into `dir` until interrupted.
pub async fn watch(dir: &Path, classifier: FieldClassifier, config: &AppConfig, format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let pipeline = build_pipeline(None, classifier, config)?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = labelscan_ocr::pipeline::spawn_intake_watcher(dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!("Watching intake folder: {}", dir.display());

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(path) = received else { break };
                if !is_frame(&path) {
                    tracing::debug!("Ignoring {}", path.display());
                    continue;
                }
                tracing::info!("Processing frame: {}", path.display());
                match pipeline.process_file(&path).await {
                    Ok(result) => print_scan(&result, format)?,
                    Err(e) => tracing::warn!("Scan of {} failed: {e}", path.display()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watcher");
                break;
            }
        }
    }
    Ok(())
}

// ── config ───────────────────────────────────────────────────────────────────

pub fn show_config(config: &AppConfig) -> Result<()> {
    match crate::config::default_config_path() {
        Some(p) => println!("# default location: {}", p.display()),
        None => println!("# no default location on this platform"),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn build_pipeline(
    replay: Option<PathBuf>,
    classifier: FieldClassifier,
    config: &AppConfig,
) -> Result<ScanPipeline<Box<dyn OcrProvider>>> {
    let provider: Box<dyn OcrProvider> = match (replay, &config.ocr.program) {
        (Some(json), _) => Box::new(JsonFileProvider::new(json)),
        (None, Some(program)) => Box::new(CommandProvider::new(program.clone(), config.ocr.args.clone())),
        (None, None) => bail!("No OCR command configured: set [ocr] program in the config file or pass --ocr-json"),
    };
    let pipeline = ScanPipeline::new(provider, classifier);
    Ok(match &config.paths.snapshots_dir {
        Some(dir) => pipeline.with_snapshots(dir.clone()),
        None => pipeline,
    })
}

fn print_scan(result: &ScanResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
        OutputFormat::Text => {
            println!("snapshot: {}", result.snapshot_id);
            print!("{}", result.fields);
        }
    }
    Ok(())
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
