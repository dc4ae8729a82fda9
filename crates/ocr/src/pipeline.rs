use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use labelscan_core::{Field, FieldRecord};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::extract::FieldClassifier;
use crate::hash;
use crate::preprocess;
use crate::recognizer::{OcrError, OcrProvider};
use crate::types::{ClassifyError, OcrOutput};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("OCR task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The result of scanning one captured frame.
#[derive(Debug, Serialize)]
pub struct ScanResult {
    /// SHA-256 hex digest of the captured frame.
    pub snapshot_id: String,
    /// Where the frame was kept, if snapshots are enabled.
    pub snapshot_path: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
    /// Raw engine output the fields were derived from.
    pub ocr: OcrOutput,
    pub fields: FieldRecord,
}

/// Orchestrates: hash → store snapshot → preprocess → OCR → classify.
pub struct ScanPipeline<P: OcrProvider> {
    provider: Arc<P>,
    classifier: FieldClassifier,
    snapshots_dir: Option<PathBuf>,
}

impl<P: OcrProvider + 'static> ScanPipeline<P> {
    pub fn new(provider: P, classifier: FieldClassifier) -> Self {
        Self { provider: Arc::new(provider), classifier, snapshots_dir: None }
    }

    /// Keep every processed frame under `dir`, content-addressed.
    pub fn with_snapshots(mut self, dir: PathBuf) -> Self {
        self.snapshots_dir = Some(dir);
        self
    }

    /// Process a frame stored on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ScanResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();
        self.process_bytes(&bytes, &ext).await
    }

    /// Process raw frame bytes (from a camera capture or a file read).
    pub async fn process_bytes(&self, data: &[u8], ext: &str) -> Result<ScanResult, PipelineError> {
        let captured_at = Utc::now();
        let snapshot_id = hash::to_hex(&hash::sha256_bytes(data));

        let snapshot_path = match &self.snapshots_dir {
            Some(dir) => {
                let dest = hash::snapshot_path(dir, &snapshot_id, ext);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&dest, data).await?;
                Some(dest)
            }
            None => None,
        };

        let png = preprocess::prepare_frame_from_bytes(data)?;
        // Engines block for a long time; keep them off the async workers.
        let provider = Arc::clone(&self.provider);
        let ocr = tokio::task::spawn_blocking(move || provider.recognize(&png)).await??;
        tracing::debug!(snapshot = %snapshot_id, detections = ocr.len(), "OCR finished");

        let fields = self.classifier.classify_output(&ocr)?;
        tracing::info!(
            snapshot = %snapshot_id,
            batch_no = fields.batch_no(),
            mfg_date = fields.mfg_date(),
            exp_date = fields.exp_date(),
            "Label classified"
        );
        let missing: Vec<&str> = Field::ALL
            .into_iter()
            .filter(|f| !fields.is_available(*f))
            .map(Field::key)
            .collect();
        if !missing.is_empty() {
            tracing::debug!(snapshot = %snapshot_id, ?missing, "Fields not found on label");
        }

        Ok(ScanResult { snapshot_id, snapshot_path, captured_at, ocr, fields })
    }
}

// ── Watch-folder intake ───────────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends newly created file paths to `tx`.
/// The returned watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths {
                    if let Err(e) = tx.try_send(path) {
                        tracing::warn!("Dropping intake event: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Intake watcher error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockProvider;
    use crate::types::RawItem;
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use labelscan_core::{BoundingBox, NOT_AVAILABLE};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(4, 4, |_, _| Rgb([200u8, 200, 200]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn label_output() -> OcrOutput {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        OcrOutput::from_items(&[
            RawItem::new("B.No: LX-204", 0.95, b),
            RawItem::new("MFG: 02/2025", 0.92, b),
            RawItem::new("EXP: 01/2027", 0.40, b),
        ])
    }

    #[tokio::test]
    async fn process_bytes_classifies_fields() {
        let pipeline = ScanPipeline::new(MockProvider::new(label_output()), FieldClassifier::interactive());

        let result = pipeline.process_bytes(&tiny_png(), "png").await.unwrap();

        assert_eq!(result.snapshot_id.len(), 64);
        assert!(result.snapshot_path.is_none());
        assert_eq!(result.fields.batch_no(), "LX-204");
        assert_eq!(result.fields.mfg_date(), "02/2025");
        // Below the interactive threshold.
        assert_eq!(result.fields.exp_date(), NOT_AVAILABLE);
        assert_eq!(result.ocr.len(), 3);
    }

    #[tokio::test]
    async fn snapshots_are_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ScanPipeline::new(MockProvider::new(label_output()), FieldClassifier::default())
            .with_snapshots(dir.path().to_path_buf());
        let data = tiny_png();

        let r1 = pipeline.process_bytes(&data, "png").await.unwrap();
        let r2 = pipeline.process_bytes(&data, "png").await.unwrap();

        assert_eq!(r1.snapshot_id, r2.snapshot_id);
        let path = r1.snapshot_path.unwrap();
        assert!(path.exists());
        assert_eq!(Some(path), r2.snapshot_path);
    }

    #[tokio::test]
    async fn process_file_reads_frame_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("captured.PNG");
        std::fs::write(&frame, tiny_png()).unwrap();
        let pipeline = ScanPipeline::new(MockProvider::new(label_output()), FieldClassifier::default())
            .with_snapshots(dir.path().join("snapshots"));

        let result = pipeline.process_file(&frame).await.unwrap();

        assert_eq!(result.fields.exp_date(), "01/2027");
        let stored = result.snapshot_path.unwrap();
        assert_eq!(stored.extension().unwrap(), "png");
    }

    #[tokio::test]
    async fn mismatched_engine_output_is_an_error() {
        let mut broken = label_output();
        broken.rec_scores.pop();
        let pipeline = ScanPipeline::new(MockProvider::new(broken), FieldClassifier::default());

        let err = pipeline.process_bytes(&tiny_png(), "png").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Classify(ClassifyError::InputMismatch { texts: 3, scores: 2, boxes: 3 })
        ));
    }

    struct FailingProvider;

    impl OcrProvider for FailingProvider {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<OcrOutput, OcrError> {
            Err(OcrError::Engine("model not loaded".to_string()))
        }
    }

    #[tokio::test]
    async fn engine_failure_is_reported() {
        let pipeline = ScanPipeline::new(FailingProvider, FieldClassifier::default());
        let err = pipeline.process_bytes(&tiny_png(), "png").await.unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::Engine(ref m)) if m == "model not loaded"));
    }

    #[tokio::test]
    async fn undecodable_frame_is_an_error() {
        let pipeline = ScanPipeline::new(MockProvider::new(label_output()), FieldClassifier::default());
        let err = pipeline.process_bytes(b"not an image", "png").await.unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(_)));
    }
}
