//! Batch evaluation over labeled examples.
//!
//! The harness runs an extraction pipeline over every example with bounded
//! parallelism, evaluates each prediction against its label and collects the
//! results in original example order, whatever order they finished in.
//! A pipeline failure never fails the batch: the example is scored against
//! an `Other` fallback and counted in the report.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::evaluator::{self, ScoredComparison};
use super::feedback::{FeedbackAggregator, ReflectiveDataset, ReflectiveExample};
use crate::domain::ClassifiedRecord;
use crate::error::Result;

/// Default number of examples evaluated concurrently.
pub const DEFAULT_WORKERS: usize = 32;

/// The extraction pipeline whose instructions are being optimized.
#[async_trait]
pub trait ExtractionPipeline: Send + Sync {
    /// Produce a classified record for one article.
    async fn run(&self, article_text: &str) -> Result<ClassifiedRecord>;

    /// Components whose instructions shaped this prediction.
    ///
    /// The example's feedback is attributed to each of them.
    fn components_for(&self, predicted: &ClassifiedRecord) -> Vec<String>;
}

/// One labeled example.
///
/// Its index is its position in the batch passed to `EvaluationHarness::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub article_id: u32,
    pub article_text: String,
    pub expected: ClassifiedRecord,
}

/// Evaluation of one example.
#[derive(Debug, Clone, Serialize)]
pub struct ExampleResult {
    /// Position of the example in the input batch.
    pub index: usize,
    pub article_id: u32,
    pub predicted: ClassifiedRecord,
    pub comparison: ScoredComparison,
    /// Components the feedback is attributed to.
    pub components: Vec<String>,
    /// Set when the pipeline failed and the Other fallback was scored.
    pub pipeline_error: Option<String>,
}

impl ExampleResult {
    /// Evaluate an already-predicted record.
    pub fn evaluated(
        index: usize,
        article_id: u32,
        expected: &ClassifiedRecord,
        predicted: ClassifiedRecord,
        components: Vec<String>,
    ) -> Self {
        let comparison = evaluator::evaluate(expected, &predicted, article_id);
        Self {
            index,
            article_id,
            predicted,
            comparison,
            components,
            pipeline_error: None,
        }
    }

    pub fn score(&self) -> f64 {
        self.comparison.score
    }
}

/// Results of evaluating a batch.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Per-example results ordered by example index.
    pub results: Vec<ExampleResult>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// Build a report, ordering results by example index.
    pub fn new(mut results: Vec<ExampleResult>) -> Self {
        results.sort_by_key(|r| r.index);
        Self {
            results,
            evaluated_at: Utc::now(),
        }
    }

    /// Mean score over all examples (0.0 for an empty batch).
    pub fn mean_score(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(ExampleResult::score).sum::<f64>() / self.results.len() as f64
    }

    /// Examples whose predicted variant matched the label.
    pub fn correctly_classified(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.comparison.outcome.classified_correctly())
            .count()
    }

    /// Examples where the pipeline failed.
    pub fn pipeline_failures(&self) -> usize {
        self.results.iter().filter(|r| r.pipeline_error.is_some()).count()
    }

    /// Group feedback by component in example order.
    pub fn reflective_dataset(&self) -> ReflectiveDataset {
        let mut aggregator = FeedbackAggregator::new();
        for result in &self.results {
            for component in &result.components {
                aggregator.push(
                    component.clone(),
                    ReflectiveExample::new(result.comparison.feedback()).with_source(result.article_id, result.score()),
                );
            }
        }
        aggregator.finish()
    }
}

/// Runs a pipeline over labeled examples.
pub struct EvaluationHarness {
    pipeline: Arc<dyn ExtractionPipeline>,
    workers: usize,
}

impl EvaluationHarness {
    /// Create a harness with the default worker count.
    pub fn new(pipeline: Arc<dyn ExtractionPipeline>) -> Self {
        Self {
            pipeline,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Set the number of concurrent pipeline calls (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Evaluate every example.
    pub async fn run(&self, examples: &[LabeledExample]) -> EvaluationReport {
        log::info!("Evaluating {} examples with {} workers", examples.len(), self.workers);

        let results: Vec<ExampleResult> = stream::iter(examples.iter().enumerate())
            .map(|(index, example)| self.run_one(index, example))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let report = EvaluationReport::new(results);
        log::info!(
            "Mean score {:.3} over {} examples ({} pipeline failures)",
            report.mean_score(),
            report.results.len(),
            report.pipeline_failures()
        );
        report
    }

    async fn run_one(&self, index: usize, example: &LabeledExample) -> ExampleResult {
        match self.pipeline.run(&example.article_text).await {
            Ok(predicted) => {
                let components = self.pipeline.components_for(&predicted);
                ExampleResult::evaluated(index, example.article_id, &example.expected, predicted, components)
            }
            Err(e) => {
                log::warn!("Pipeline failed for article {}: {}", example.article_id, e);
                let predicted = ClassifiedRecord::other(Some(example.article_id));
                let components = self.pipeline.components_for(&predicted);
                let mut result =
                    ExampleResult::evaluated(index, example.article_id, &example.expected, predicted, components);
                result.pipeline_error = Some(e.to_string());
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Merger, RecordKind};
    use crate::error::DealscoreError;
    use std::time::Duration;

    // Text format: "<kind>:<delay_ms>", or "fail"
    struct ScriptedPipeline;

    #[async_trait]
    impl ExtractionPipeline for ScriptedPipeline {
        async fn run(&self, article_text: &str) -> Result<ClassifiedRecord> {
            let (kind, delay) = article_text
                .split_once(':')
                .ok_or_else(|| DealscoreError::Pipeline(format!("unparseable article: {}", article_text)))?;
            let delay: u64 = delay.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            match kind {
                "merger" => Ok(ClassifiedRecord::from(sample_merger())),
                "other" => Ok(ClassifiedRecord::other(None)),
                _ => Err(DealscoreError::Pipeline(format!("unknown kind {}", kind))),
            }
        }

        fn components_for(&self, predicted: &ClassifiedRecord) -> Vec<String> {
            match predicted.kind() {
                RecordKind::Merger => vec!["classifier".to_string(), "extract_merger".to_string()],
                _ => vec!["classifier".to_string()],
            }
        }
    }

    fn sample_merger() -> Merger {
        Merger {
            article_id: None,
            company_1: Some("Alpha".to_string()),
            company_1_ticker: Some(vec!["ALP".to_string()]),
            company_2: Some("Beta".to_string()),
            company_2_ticker: None,
            merged_entity: None,
            deal_amount: Some("5 million".to_string()),
            deal_currency: Currency::Usd,
        }
    }

    fn example(article_id: u32, text: &str, expected: ClassifiedRecord) -> LabeledExample {
        LabeledExample {
            article_id,
            article_text: text.to_string(),
            expected,
        }
    }

    #[tokio::test]
    async fn test_results_keep_example_order() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline)).with_workers(4);
        let examples = vec![
            example(10, "merger:40", ClassifiedRecord::from(sample_merger())),
            example(11, "other:20", ClassifiedRecord::other(Some(11))),
            example(12, "other:0", ClassifiedRecord::from(sample_merger())),
        ];

        let report = harness.run(&examples).await;

        let ids: Vec<_> = report.results.iter().map(|r| r.article_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        let indices: Vec<_> = report.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_scores_and_counts() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline));
        let examples = vec![
            example(1, "merger:0", ClassifiedRecord::from(sample_merger())),
            example(2, "other:0", ClassifiedRecord::other(Some(2))),
            example(3, "other:0", ClassifiedRecord::from(sample_merger())),
        ];

        let report = harness.run(&examples).await;

        assert_eq!(report.results[0].score(), 1.0);
        assert_eq!(report.results[1].score(), 1.0);
        assert_eq!(report.results[2].score(), 0.0);
        assert!((report.mean_score() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.correctly_classified(), 2);
        assert_eq!(report.pipeline_failures(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_failure_falls_back_to_other() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline));
        let examples = vec![
            example(7, "fail", ClassifiedRecord::other(Some(7))),
            example(8, "fail", ClassifiedRecord::from(sample_merger())),
        ];

        let report = harness.run(&examples).await;

        assert_eq!(report.pipeline_failures(), 2);
        assert_eq!(report.results[0].predicted, ClassifiedRecord::other(Some(7)));
        assert_eq!(report.results[0].score(), 1.0);
        assert_eq!(report.results[1].score(), 0.0);
        assert_eq!(report.results[1].comparison.feedback(), "Article 8: expected Merger, got Other");
        assert!(report.results[1].pipeline_error.as_deref().unwrap().contains("unparseable"));
    }

    #[tokio::test]
    async fn test_reflective_dataset_attribution() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline)).with_workers(2);
        let examples = vec![
            example(1, "merger:30", ClassifiedRecord::from(sample_merger())),
            example(2, "other:0", ClassifiedRecord::other(Some(2))),
            example(3, "merger:0", ClassifiedRecord::other(Some(3))),
        ];

        let dataset = harness.run(&examples).await.reflective_dataset();

        let classifier = dataset.get("classifier").unwrap();
        let ids: Vec<_> = classifier.iter().map(|e| e.article_id.unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(classifier[2].feedback_text(), "Article 3: expected Other, got Merger");

        let merger = dataset.get("extract_merger").unwrap();
        let ids: Vec<_> = merger.iter().map(|e| e.article_id.unwrap()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(!dataset.contains("extract_acquisition"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline));
        let report = harness.run(&[]).await;
        assert!(report.results.is_empty());
        assert_eq!(report.mean_score(), 0.0);
        assert!(report.reflective_dataset().is_empty());
    }

    #[test]
    fn test_with_workers_minimum() {
        let harness = EvaluationHarness::new(Arc::new(ScriptedPipeline)).with_workers(0);
        assert_eq!(harness.workers(), 1);
        assert_eq!(EvaluationHarness::new(Arc::new(ScriptedPipeline)).workers(), DEFAULT_WORKERS);
    }
}
