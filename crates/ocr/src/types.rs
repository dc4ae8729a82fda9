use labelscan_core::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// The engine's parallel arrays disagree in length.
    #[error("OCR result arrays differ in length: {texts} texts, {scores} scores, {boxes} boxes")]
    InputMismatch {
        texts: usize,
        scores: usize,
        boxes: usize,
    },
}

/// One text detection produced by the OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub text: String,
    /// Recognition confidence (0.0–1.0).
    pub score: f32,
    pub bbox: BoundingBox,
}

impl RawItem {
    pub fn new(text: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self { text: text.into(), score, bbox }
    }
}

/// Recognition output in the engine's parallel-array layout.
///
/// Index `i` of each array describes the same detection, in the engine's read order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    #[serde(default)]
    pub rec_texts: Vec<String>,
    #[serde(default)]
    pub rec_scores: Vec<f32>,
    #[serde(default)]
    pub rec_boxes: Vec<BoundingBox>,
}

/// A full engine dump nests the recognition arrays one level down.
#[derive(Deserialize)]
#[serde(untagged)]
enum OcrDocument {
    Full { overall_ocr_res: OcrOutput },
    Bare(OcrOutput),
}

impl OcrOutput {
    /// Parse either a full engine dump (`{"overall_ocr_res": {...}}`) or the bare
    /// recognition object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str::<OcrDocument>(json)? {
            OcrDocument::Full { overall_ocr_res } => overall_ocr_res,
            OcrDocument::Bare(out) => out,
        })
    }

    pub fn from_items(items: &[RawItem]) -> Self {
        Self {
            rec_texts: items.iter().map(|i| i.text.clone()).collect(),
            rec_scores: items.iter().map(|i| i.score).collect(),
            rec_boxes: items.iter().map(|i| i.bbox).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rec_texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rec_texts.is_empty()
    }

    /// Number of boxes that do not satisfy `x0 < x1 && y0 < y1`.
    pub fn malformed_boxes(&self) -> usize {
        self.rec_boxes.iter().filter(|b| !b.is_well_formed()).count()
    }

    /// Zip the parallel arrays into items. Fails instead of truncating when the
    /// lengths disagree.
    pub fn items(&self) -> Result<Vec<RawItem>, ClassifyError> {
        let (texts, scores, boxes) =
            (self.rec_texts.len(), self.rec_scores.len(), self.rec_boxes.len());
        if texts != scores || texts != boxes {
            return Err(ClassifyError::InputMismatch { texts, scores, boxes });
        }
        Ok(self
            .rec_texts
            .iter()
            .zip(&self.rec_scores)
            .zip(&self.rec_boxes)
            .map(|((text, &score), &bbox)| RawItem { text: text.clone(), score, bbox })
            .collect())
    }
}
