//! Evaluation of classified records against gold labels.
//!
//! - scorer: exact-match field scoring with null/empty equivalence
//! - evaluator: record comparison producing a score and feedback transcript
//! - feedback: reflective dataset of feedback grouped by pipeline component
//! - harness: batch evaluation of a pipeline over labeled examples

pub mod evaluator;
pub mod feedback;
pub mod harness;
pub mod scorer;

pub use evaluator::{ComparisonOutcome, FeedbackTranscript, FieldFeedback, ScoredComparison, evaluate, score_record};
pub use feedback::{FeedbackAggregator, NO_FEEDBACK, ReflectiveDataset, ReflectiveExample, feedback_summary};
pub use harness::{DEFAULT_WORKERS, EvaluationHarness, EvaluationReport, ExampleResult, ExtractionPipeline, LabeledExample};
