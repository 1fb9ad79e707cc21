//! Record-level evaluation with per-field feedback.
//!
//! Comparing an expected record with a predicted one goes through two
//! decision points:
//!
//! 1. **Variant mismatch** - wrong classification scores 0.0, nothing else is compared.
//! 2. **Other** - both Other scores 1.0; Other has no fields.
//!
//! Otherwise every comparable field of the expected record is scored and gets
//! one feedback line, in declared field order, so transcripts are byte-stable.

use std::fmt;

use serde::Serialize;

use super::scorer;
use crate::domain::{ClassifiedRecord, Field, RecordKind};

/// Feedback for a single compared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFeedback {
    pub field: &'static str,
    pub matched: bool,
    /// Rendered expected value.
    pub expected: String,
    /// Rendered predicted value.
    pub predicted: String,
}

impl FieldFeedback {
    fn compare(expected: &Field<'_>, predicted: &Field<'_>) -> Self {
        Self {
            field: expected.name,
            matched: scorer::score(expected.value, predicted.value) == 1,
            expected: expected.value.to_string(),
            predicted: predicted.value.to_string(),
        }
    }
}

impl fmt::Display for FieldFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matched {
            write!(f, "  ✅ {}: correctly extracted {}", self.field, self.expected)
        } else {
            write!(f, "  ❌ {}: expected {}, got {}", self.field, self.expected, self.predicted)
        }
    }
}

/// Header plus ordered per-field lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackTranscript {
    pub header: String,
    pub lines: Vec<FieldFeedback>,
}

impl FeedbackTranscript {
    fn single(header: String) -> Self {
        Self {
            header,
            lines: Vec::new(),
        }
    }

    /// Render the transcript as feedback text.
    ///
    /// Single-line transcripts have no trailing newline; field transcripts end
    /// every line, header included, with one.
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return self.header.clone();
        }

        let mut output = format!("{}\n", self.header);
        for line in &self.lines {
            output.push_str(&format!("{}\n", line));
        }
        output
    }
}

impl fmt::Display for FeedbackTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Which branch of the comparison produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOutcome {
    VariantMismatch {
        #[serde(serialize_with = "serialize_kind")]
        expected: RecordKind,
        #[serde(serialize_with = "serialize_kind")]
        predicted: RecordKind,
    },
    OtherMatched,
    FieldsCompared {
        matches: usize,
        total: usize,
    },
}

fn serialize_kind<S: serde::Serializer>(kind: &RecordKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.as_str())
}

impl ComparisonOutcome {
    /// True when the predicted variant matched the expected one.
    pub fn classified_correctly(&self) -> bool {
        !matches!(self, ComparisonOutcome::VariantMismatch { .. })
    }
}

/// Result of comparing one expected/predicted pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredComparison {
    /// Score in [0, 1].
    pub score: f64,
    pub outcome: ComparisonOutcome,
    pub transcript: FeedbackTranscript,
}

impl ScoredComparison {
    /// Rendered feedback text.
    pub fn feedback(&self) -> String {
        self.transcript.render()
    }
}

/// Compare a predicted record against the expected one.
pub fn evaluate(expected: &ClassifiedRecord, predicted: &ClassifiedRecord, article_id: u32) -> ScoredComparison {
    let (expected_kind, predicted_kind) = (expected.kind(), predicted.kind());

    if expected_kind != predicted_kind {
        return ScoredComparison {
            score: 0.0,
            outcome: ComparisonOutcome::VariantMismatch {
                expected: expected_kind,
                predicted: predicted_kind,
            },
            transcript: FeedbackTranscript::single(format!(
                "Article {}: expected {}, got {}",
                article_id, expected_kind, predicted_kind
            )),
        };
    }

    if expected_kind == RecordKind::Other {
        return ScoredComparison {
            score: 1.0,
            outcome: ComparisonOutcome::OtherMatched,
            transcript: FeedbackTranscript::single(format!("✅ Article {}: correctly classified as Other", article_id)),
        };
    }

    let lines: Vec<FieldFeedback> = expected
        .fields()
        .iter()
        .zip(predicted.fields().iter())
        .map(|(e, p)| FieldFeedback::compare(e, p))
        .collect();

    let total = lines.len();
    let matches = lines.iter().filter(|line| line.matched).count();

    ScoredComparison {
        score: ratio(matches, total),
        outcome: ComparisonOutcome::FieldsCompared { matches, total },
        transcript: FeedbackTranscript {
            header: format!("Feedback for Article {}:", article_id),
            lines,
        },
    }
}

/// Score a pair without building any feedback.
///
/// Always equal to `evaluate(..).score`.
pub fn score_record(expected: &ClassifiedRecord, predicted: &ClassifiedRecord) -> f64 {
    match (expected.kind(), predicted.kind()) {
        (e, p) if e != p => 0.0,
        (RecordKind::Other, _) => 1.0,
        _ => {
            let expected_fields = expected.fields();
            let matches: u32 = expected_fields
                .iter()
                .zip(predicted.fields().iter())
                .map(|(e, p)| scorer::score(e.value, p.value))
                .sum();
            ratio(matches as usize, expected_fields.len())
        }
    }
}

fn ratio(matches: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { matches as f64 / total as f64 }
}
