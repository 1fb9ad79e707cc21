//! Word-limited instruction proposer.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::candidate::{InstructionCandidate, Proposals};
use super::generator::{InstructionGenerator, word_count};
use crate::evaluation::{ReflectiveDataset, feedback_summary};

/// Default word budget for a proposed instruction.
pub const DEFAULT_MAX_WORDS: usize = 1000;

/// Proposes new instructions from reflective feedback, one component at a time.
pub struct WordLimitProposer {
    generator: Arc<dyn InstructionGenerator>,
    max_words: NonZeroUsize,
}

impl WordLimitProposer {
    pub fn new(generator: Arc<dyn InstructionGenerator>) -> Self {
        Self {
            generator,
            max_words: NonZeroUsize::new(DEFAULT_MAX_WORDS).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Set the default word budget.
    pub fn with_max_words(mut self, max_words: NonZeroUsize) -> Self {
        self.max_words = max_words;
        self
    }

    pub fn max_words(&self) -> NonZeroUsize {
        self.max_words
    }

    /// Propose instructions using the default budget.
    pub async fn propose<S: AsRef<str>>(
        &self,
        candidate: &InstructionCandidate,
        dataset: &ReflectiveDataset,
        components_to_update: &[S],
    ) -> Proposals {
        self.propose_with_budget(candidate, dataset, components_to_update, self.max_words)
            .await
    }

    /// Propose instructions for each requested component.
    ///
    /// Components without a current instruction or without feedback are
    /// skipped, as are repeats. A failed generation drops only that
    /// component. Output over budget is kept and logged.
    pub async fn propose_with_budget<S: AsRef<str>>(
        &self,
        candidate: &InstructionCandidate,
        dataset: &ReflectiveDataset,
        components_to_update: &[S],
        max_words: NonZeroUsize,
    ) -> Proposals {
        let mut proposals = Proposals::new();
        let mut seen = HashSet::new();

        for component in components_to_update.iter().map(AsRef::as_ref) {
            if !seen.insert(component) {
                continue;
            }

            let Some(current) = candidate.instruction(component) else {
                log::debug!("Skipping {}: not in candidate", component);
                continue;
            };
            let Some(examples) = dataset.get(component) else {
                log::debug!("Skipping {}: no feedback", component);
                continue;
            };

            let summary = feedback_summary(examples);
            log::info!(
                "Proposing instruction for {} from {} example(s), budget {} words",
                component,
                examples.len(),
                max_words
            );

            match self.generator.generate(current, &summary, max_words).await {
                Ok(instruction) => {
                    let words = word_count(&instruction);
                    if words > max_words.get() {
                        log::warn!(
                            "Instruction for {} is {} words, over the {} word budget",
                            component,
                            words,
                            max_words
                        );
                    }
                    proposals.insert(component.to_string(), instruction);
                }
                Err(e) => {
                    log::warn!("Instruction generation failed for {}: {}", component, e);
                }
            }
        }

        proposals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposer::GenerationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        current: String,
        summary: String,
        max_words: usize,
    }

    // Returns "<current> (revised)" and records every call.
    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<Call>>,
        fail_on: Option<String>,
        reply: Option<String>,
    }

    #[async_trait]
    impl InstructionGenerator for RecordingGenerator {
        async fn generate(
            &self,
            current_instruction: &str,
            feedback_summary: &str,
            max_words: NonZeroUsize,
        ) -> Result<String, GenerationError> {
            self.calls.lock().unwrap().push(Call {
                current: current_instruction.to_string(),
                summary: feedback_summary.to_string(),
                max_words: max_words.get(),
            });
            if self.fail_on.as_deref() == Some(current_instruction) {
                return Err(GenerationError::Malformed("no instruction".to_string()));
            }
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| format!("{} (revised)", current_instruction)))
        }
    }

    fn candidate() -> InstructionCandidate {
        InstructionCandidate::new()
            .with_instruction("classifier", "Classify.")
            .with_instruction("extract_merger", "Extract merger.")
            .with_instruction("extract_acquisition", "Extract acquisition.")
    }

    fn dataset() -> ReflectiveDataset {
        ReflectiveDataset::from_pairs(vec![
            ("classifier", "Article 1: expected Other, got Merger"),
            ("extract_merger", "merger feedback one"),
            ("extract_merger", "merger feedback two"),
            ("extract_acquisition", "acquisition feedback"),
        ])
    }

    fn words(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_default_budget() {
        let proposer = WordLimitProposer::new(Arc::new(RecordingGenerator::default()));
        assert_eq!(proposer.max_words().get(), DEFAULT_MAX_WORDS);

        let proposer = proposer.with_max_words(words(50));
        assert_eq!(proposer.max_words().get(), 50);
    }

    #[tokio::test]
    async fn test_propose_passes_summary_and_budget() {
        let generator = Arc::new(RecordingGenerator::default());
        let proposer = WordLimitProposer::new(generator.clone()).with_max_words(words(200));

        let proposals = proposer
            .propose(&candidate(), &dataset(), &["extract_merger"])
            .await;

        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals["extract_merger"], "Extract merger. (revised)");

        let calls = generator.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            Call {
                current: "Extract merger.".to_string(),
                summary: "Example 1: merger feedback one\nExample 2: merger feedback two".to_string(),
                max_words: 200,
            }
        );
    }

    #[tokio::test]
    async fn test_component_missing_from_dataset_is_omitted() {
        let generator = Arc::new(RecordingGenerator::default());
        let proposer = WordLimitProposer::new(generator.clone());
        let dataset = ReflectiveDataset::from_pairs(vec![("extract_merger", "merger feedback")]);

        let proposals = proposer
            .propose(&candidate(), &dataset, &["classifier", "extract_merger"])
            .await;

        assert!(!proposals.contains_key("classifier"));
        assert!(proposals.contains_key("extract_merger"));
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_component_missing_from_candidate_is_omitted() {
        let proposer = WordLimitProposer::new(Arc::new(RecordingGenerator::default()));
        let dataset = ReflectiveDataset::from_pairs(vec![("unknown", "feedback")]);

        let proposals = proposer.propose(&candidate(), &dataset, &["unknown"]).await;
        assert!(proposals.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_generate_once() {
        let generator = Arc::new(RecordingGenerator::default());
        let proposer = WordLimitProposer::new(generator.clone());

        let requested = vec!["classifier".to_string(), "classifier".to_string()];
        let proposals = proposer.propose(&candidate(), &dataset(), &requested).await;

        assert_eq!(proposals.len(), 1);
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_others() {
        let generator = Arc::new(RecordingGenerator {
            fail_on: Some("Extract merger.".to_string()),
            ..Default::default()
        });
        let proposer = WordLimitProposer::new(generator.clone());

        let proposals = proposer
            .propose(
                &candidate(),
                &dataset(),
                &["classifier", "extract_merger", "extract_acquisition"],
            )
            .await;

        assert_eq!(proposals.len(), 2);
        assert!(proposals.contains_key("classifier"));
        assert!(!proposals.contains_key("extract_merger"));
        assert!(proposals.contains_key("extract_acquisition"));
        assert_eq!(generator.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_over_budget_output_is_kept() {
        let generator = Arc::new(RecordingGenerator {
            reply: Some("one two three four five".to_string()),
            ..Default::default()
        });
        let proposer = WordLimitProposer::new(generator);

        let proposals = proposer
            .propose_with_budget(&candidate(), &dataset(), &["classifier"], words(3))
            .await;

        assert_eq!(proposals["classifier"], "one two three four five");
    }

    #[tokio::test]
    async fn test_empty_request() {
        let generator = Arc::new(RecordingGenerator::default());
        let proposer = WordLimitProposer::new(generator.clone());

        let none: [&str; 0] = [];
        let proposals = proposer.propose(&candidate(), &dataset(), &none).await;

        assert!(proposals.is_empty());
        assert!(generator.calls.lock().unwrap().is_empty());
    }
}
