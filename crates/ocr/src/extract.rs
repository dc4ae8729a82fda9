use std::sync::OnceLock;

use labelscan_core::{Field, FieldRecord, Point};
use regex::Regex;
use tracing::{debug, trace};

use crate::types::{ClassifyError, OcrOutput, RawItem};

/// Threshold used when scanning interactively from a live capture.
pub const INTERACTIVE_SCORE_THRESHOLD: f32 = 0.5;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Label prefixes only; the value is whatever follows the match.
re!(re_exp_label, r"(?i)exp\.?\s*[:\-]?\s*");
re!(re_mfg_label, r"(?i)(?:mfg|mfd|manufacture)\.?\s*[:\-]?\s*");

re!(re_batch_label, r"(?i)\b(?:batch|b\.?no)\b");
re!(re_batch_prefix, r"(?i)^(?:batch(?:\s*no\b\.?)?|b\.?no\b\.?)\s*[:\-]?\s*");

re!(re_date_like,
    r"(?i)(?:\d{1,2}[./\-])?\d{1,2}[./\-]\d{2,4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\.?\s*\d{4}");

// ── Candidates ────────────────────────────────────────────────────────────────

/// An item that passed the score threshold, with its matching forms precomputed.
#[derive(Debug)]
struct Candidate<'a> {
    /// Trimmed original text.
    text: &'a str,
    /// Lowercased `text`, used for every keyword test.
    folded: String,
    center: Point,
}

impl<'a> Candidate<'a> {
    fn new(item: &'a RawItem) -> Self {
        let text = item.text.trim();
        Self { text, folded: text.to_lowercase(), center: item.bbox.center() }
    }

    fn mentions_exp(&self) -> bool {
        self.folded.contains("exp")
    }

    fn mentions_mfg(&self) -> bool {
        self.folded.contains("mfg") || self.folded.contains("mfd") || self.folded.contains("manufacture")
    }

    /// Could this be a batch value sitting next to a batch label?
    fn is_batch_value_candidate(&self) -> bool {
        !self.folded.contains("exp")
            && !self.folded.contains("mfg")
            && !self.folded.contains("mfd")
            && !re_date_like().is_match(self.text)
    }
}

/// Working state: a slot is `None` until some pass resolves it.
#[derive(Debug, Default)]
struct Slots {
    batch_no: Option<String>,
    mfg_date: Option<String>,
    exp_date: Option<String>,
}

impl Slots {
    fn all_unresolved(&self) -> bool {
        [&self.batch_no, &self.mfg_date, &self.exp_date]
            .iter()
            .all(|s| s.as_deref().map_or(true, str::is_empty))
    }
}

// ── Public classification API ─────────────────────────────────────────────────

/// Turns OCR detections into batch number, manufacturing date and expiry date.
///
/// Holds no state besides its threshold; the same input always yields the same
/// record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldClassifier {
    /// Items scoring below this are ignored. Equal scores are kept.
    pub score_threshold: f32,
}

impl Default for FieldClassifier {
    fn default() -> Self {
        Self { score_threshold: 0.0 }
    }
}

impl FieldClassifier {
    pub fn new(score_threshold: f32) -> Self {
        Self { score_threshold }
    }

    pub fn interactive() -> Self {
        Self::new(INTERACTIVE_SCORE_THRESHOLD)
    }

    /// Validate the engine's parallel arrays, then classify.
    pub fn classify_output(&self, output: &OcrOutput) -> Result<FieldRecord, ClassifyError> {
        Ok(self.classify(&output.items()?))
    }

    pub fn classify(&self, items: &[RawItem]) -> FieldRecord {
        let candidates: Vec<Candidate<'_>> = items
            .iter()
            .filter(|item| item.score >= self.score_threshold)
            .map(Candidate::new)
            .collect();
        debug!(
            total = items.len(),
            kept = candidates.len(),
            threshold = self.score_threshold,
            "Filtered OCR items"
        );

        let mut slots = Slots::default();
        Self::extract_inline_dates(&candidates, &mut slots);
        slots.batch_no = Self::resolve_batch_no(&candidates);
        Self::apply_positional_fallback(&candidates, &mut slots);

        FieldRecord::from_slots(slots.batch_no, slots.mfg_date, slots.exp_date)
    }

    // ── Inline EXP / MFG ──────────────────────────────────────────────────────

    fn extract_inline_dates(candidates: &[Candidate<'_>], slots: &mut Slots) {
        for c in candidates {
            // An item mentioning both keywords belongs to the expiry date.
            if c.mentions_exp() {
                if slots.exp_date.is_none() {
                    let value = inline_value(re_exp_label(), c.text);
                    trace!(text = c.text, value, "Inline expiry date");
                    slots.exp_date = Some(value.to_string());
                }
                continue;
            }
            if c.mentions_mfg() && slots.mfg_date.is_none() {
                let value = inline_value(re_mfg_label(), c.text);
                trace!(text = c.text, value, "Inline manufacturing date");
                slots.mfg_date = Some(value.to_string());
            }
        }
    }

    // ── Batch number ──────────────────────────────────────────────────────────

    fn resolve_batch_no(candidates: &[Candidate<'_>]) -> Option<String> {
        let (label_idx, label) = candidates
            .iter()
            .enumerate()
            .find(|(_, c)| re_batch_label().is_match(&c.folded))?;

        if let Some(value) = after_label(re_batch_prefix(), label.text) {
            trace!(text = label.text, value, "Batch number inline with label");
            return Some(value.to_string());
        }

        // Label without a value: take the nearest plausible neighbour.
        let nearest = candidates
            .iter()
            .enumerate()
            .filter(|&(i, c)| i != label_idx && c.is_batch_value_candidate())
            .map(|(_, c)| (c, c.center.distance(&label.center)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(c, _)| c);

        match nearest {
            Some(c) => {
                trace!(label = label.text, value = c.text, "Batch number from nearest neighbour");
                Some(c.text.to_string())
            }
            None => {
                debug!(label = label.text, "Batch label found but no neighbour qualifies");
                None
            }
        }
    }

    // ── Positional fallback ───────────────────────────────────────────────────

    /// Only when nothing was recognised at all: read the last three items as
    /// batch, mfg, exp.
    fn apply_positional_fallback(candidates: &[Candidate<'_>], slots: &mut Slots) {
        if !slots.all_unresolved() || candidates.len() < Field::ALL.len() {
            return;
        }
        let tail = &candidates[candidates.len() - 3..];
        debug!("No labelled fields found; assigning last three items positionally");
        slots.batch_no = Some(tail[0].text.to_string());
        slots.mfg_date = Some(tail[1].text.to_string());
        slots.exp_date = Some(tail[2].text.to_string());
    }
}

/// Classify `items` with the given threshold.
pub fn classify(items: &[RawItem], score_threshold: f32) -> FieldRecord {
    FieldClassifier::new(score_threshold).classify(items)
}

/// Text after the keyword label, or the whole text when no value follows it.
fn inline_value<'t>(label: &Regex, text: &'t str) -> &'t str {
    after_label(label, text).unwrap_or(text)
}

/// The trimmed text following the first `label` match. `None` when the label is
/// absent or followed only by separators, as in `"B.No:"` or `"EXP -"`.
fn after_label<'t>(label: &Regex, text: &'t str) -> Option<&'t str> {
    let m = label.find(text)?;
    let rest = text[m.end()..].trim();
    if rest.chars().all(|c| c.is_whitespace() || matches!(c, ':' | '-' | '.')) {
        return None;
    }
    Some(rest)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
