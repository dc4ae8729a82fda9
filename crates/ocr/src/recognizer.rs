use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::types::OcrOutput;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed OCR result: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Abstraction over an OCR engine.
/// Implementations accept PNG image bytes and return the engine's detections.
pub trait OcrProvider: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<OcrOutput, OcrError>;
}

impl<T: OcrProvider + ?Sized> OcrProvider for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<OcrOutput, OcrError> {
        (**self).recognize(image_bytes)
    }
}

// ── Mock provider (always available, used for tests) ─────────────────────────

/// Returns a pre-set result, regardless of the image.
pub struct MockProvider {
    pub output: OcrOutput,
}

impl MockProvider {
    pub fn new(output: OcrOutput) -> Self {
        Self { output }
    }
}

impl OcrProvider for MockProvider {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<OcrOutput, OcrError> {
        Ok(self.output.clone())
    }
}

// ── Saved result replay ───────────────────────────────────────────────────────

/// Replays an engine result previously saved as JSON.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OcrProvider for JsonFileProvider {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<OcrOutput, OcrError> {
        let json = std::fs::read_to_string(&self.path)?;
        let output = OcrOutput::from_json(&json)?;
        warn_on_malformed_boxes(&output, &self.path.display().to_string());
        Ok(output)
    }
}

// ── External command ──────────────────────────────────────────────────────────

/// Runs an external OCR command. The PNG frame is written to its stdin and the
/// engine's JSON result is read from its stdout.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

impl OcrProvider for CommandProvider {
    fn recognize(&self, image_bytes: &[u8]) -> Result<OcrOutput, OcrError> {
        tracing::debug!(program = %self.program, bytes = image_bytes.len(), "Running OCR command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OcrError::Engine(format!("failed to start '{}': {e}", self.program)))?;

        // Feed stdin from its own thread so a large frame cannot deadlock against
        // a full stdout pipe, and an engine that exits early still reports stderr.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("stdin unavailable".to_string()))?;
        let frame = image_bytes.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&frame));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| OcrError::Engine("stdin writer panicked".to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(OcrError::Engine(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if let Err(e) = written {
            return Err(OcrError::Engine(format!(
                "'{}' did not read the whole frame ({e}): {}",
                self.program,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = OcrOutput::from_json(&stdout)?;
        warn_on_malformed_boxes(&result, &self.program);
        Ok(result)
    }
}

fn warn_on_malformed_boxes(output: &OcrOutput, source: &str) {
    let bad = output.malformed_boxes();
    if bad > 0 {
        tracing::warn!(source, malformed = bad, total = output.len(), "OCR result contains degenerate boxes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawItem;
    use labelscan_core::BoundingBox;

    fn sample() -> OcrOutput {
        OcrOutput::from_items(&[RawItem::new("EXP 05/2026", 0.9, BoundingBox::new(0.0, 0.0, 5.0, 5.0))])
    }

    #[test]
    fn mock_returns_preset_output() {
        let p = MockProvider::new(sample());
        assert_eq!(p.recognize(b"fake image data").unwrap(), sample());
        assert_eq!(p.recognize(b"").unwrap(), sample());
    }

    #[test]
    fn boxed_provider_delegates() {
        let p: Box<dyn OcrProvider> = Box::new(MockProvider::new(sample()));
        assert_eq!(p.recognize(b"").unwrap(), sample());
    }

    #[test]
    fn json_file_provider_reads_engine_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        std::fs::write(
            &path,
            r#"{"overall_ocr_res": {"rec_texts": ["B.No: 9"], "rec_scores": [0.7], "rec_boxes": [[0, 0, 2, 2]]}}"#,
        )
        .unwrap();
        let out = JsonFileProvider::new(&path).recognize(&[]).unwrap();
        assert_eq!(out.rec_texts, vec!["B.No: 9".to_string()]);
    }

    #[test]
    fn json_file_provider_reports_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileProvider::new(&path).recognize(&[]),
            Err(OcrError::Malformed(_))
        ));
    }

    #[test]
    fn json_file_provider_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JsonFileProvider::new(dir.path().join("absent.json")).recognize(&[]),
            Err(OcrError::Io(_))
        ));
    }

    #[test]
    fn command_provider_reports_missing_program() {
        let p = CommandProvider::new("labelscan-no-such-ocr-binary", vec![]);
        assert!(matches!(p.recognize(b"png"), Err(OcrError::Engine(_))));
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_parses_stdout() {
        let script = r#"cat > /dev/null; echo '{"rec_texts":["EXP 1/2027"],"rec_scores":[0.8],"rec_boxes":[[0,0,4,4]]}'"#;
        let p = CommandProvider::new("sh", vec!["-c".into(), script.into()]);
        let out = p.recognize(b"png bytes").unwrap();
        assert_eq!(out.rec_texts, vec!["EXP 1/2027".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_keeps_stderr_when_engine_exits_early() {
        // Larger than any pipe buffer, so the write cannot complete.
        let frame = vec![0u8; 4 * 1024 * 1024];
        let p = CommandProvider::new("sh", vec!["-c".into(), "echo engine crashed >&2; exit 2".into()]);
        match p.recognize(&frame) {
            Err(OcrError::Engine(msg)) => assert!(msg.contains("engine crashed"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_rejects_engine_that_ignores_input() {
        let frame = vec![0u8; 4 * 1024 * 1024];
        let script = r#"echo '{"rec_texts":[],"rec_scores":[],"rec_boxes":[]}'; echo skipped input >&2"#;
        let p = CommandProvider::new("sh", vec!["-c".into(), script.into()]);
        match p.recognize(&frame) {
            Err(OcrError::Engine(msg)) => assert!(msg.contains("skipped input"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_surfaces_failure_status() {
        let p = CommandProvider::new("sh", vec!["-c".into(), "cat > /dev/null; echo boom >&2; exit 3".into()]);
        match p.recognize(b"png") {
            Err(OcrError::Engine(msg)) => assert!(msg.contains("boom"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
