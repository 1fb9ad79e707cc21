//! Reflective dataset: evaluation feedback grouped by pipeline component.
//!
//! Every evaluated example yields feedback text that is attributed to one or
//! more components of the extraction pipeline. Grouping that text per
//! component gives the proposer something concrete to improve each
//! component's instruction from.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Text used for an example that carries no feedback.
pub const NO_FEEDBACK: &str = "No feedback";

/// One component's feedback for one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectiveExample {
    /// Article the feedback was produced for, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<u32>,

    /// Score of the evaluation that produced the feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Feedback text.
    #[serde(default, alias = "Feedback")]
    pub feedback: Option<String>,
}

impl ReflectiveExample {
    /// Create an example from feedback text alone.
    pub fn new(feedback: impl Into<String>) -> Self {
        Self {
            article_id: None,
            score: None,
            feedback: Some(feedback.into()),
        }
    }

    /// Attach the article and score the feedback came from.
    pub fn with_source(mut self, article_id: u32, score: f64) -> Self {
        self.article_id = Some(article_id);
        self.score = Some(score);
        self
    }

    /// Feedback text, or the placeholder when there is none.
    pub fn feedback_text(&self) -> &str {
        self.feedback.as_deref().unwrap_or(NO_FEEDBACK)
    }
}

/// Component name -> feedback examples in evaluation order.
///
/// Components with no examples are absent, never present as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReflectiveDataset {
    components: BTreeMap<String, Vec<ReflectiveExample>>,
}

impl ReflectiveDataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group (component, feedback) pairs, keeping order and duplicates.
    pub fn from_pairs<I, C, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, F)>,
        C: Into<String>,
        F: Into<String>,
    {
        let mut aggregator = FeedbackAggregator::new();
        for (component, feedback) in pairs {
            aggregator.push_feedback(component, feedback);
        }
        aggregator.finish()
    }

    /// Examples attributed to a component.
    pub fn get(&self, component: &str) -> Option<&[ReflectiveExample]> {
        self.components.get(component).map(Vec::as_slice)
    }

    /// Whether the component has any examples.
    pub fn contains(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    /// Component names, sorted.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Number of components with feedback.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Total number of examples across all components.
    pub fn example_count(&self) -> usize {
        self.components.values().map(Vec::len).sum()
    }

    /// Load a dataset from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dataset: Self = serde_json::from_str(&content)?;
        Ok(dataset.without_empty())
    }

    /// Write the dataset as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    // A hand-written file may list a component with no examples.
    fn without_empty(mut self) -> Self {
        self.components.retain(|_, examples| !examples.is_empty());
        self
    }
}

/// Builds a ReflectiveDataset one example at a time.
#[derive(Debug, Default)]
pub struct FeedbackAggregator {
    components: BTreeMap<String, Vec<ReflectiveExample>>,
}

impl FeedbackAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute an example to a component.
    pub fn push(&mut self, component: impl Into<String>, example: ReflectiveExample) {
        self.components.entry(component.into()).or_default().push(example);
    }

    /// Attribute bare feedback text to a component.
    pub fn push_feedback(&mut self, component: impl Into<String>, feedback: impl Into<String>) {
        self.push(component, ReflectiveExample::new(feedback));
    }

    /// Finish aggregation.
    pub fn finish(self) -> ReflectiveDataset {
        ReflectiveDataset {
            components: self.components,
        }
    }
}

/// Render examples as the numbered summary handed to the instruction generator.
///
/// Each example becomes `Example N: <feedback>` (N from 1), joined by newlines.
pub fn feedback_summary(examples: &[ReflectiveExample]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, example)| format!("Example {}: {}", i + 1, example.feedback_text()))
        .collect::<Vec<_>>()
        .join("\n")
}
