//! Instruction generation through an LLM.
//!
//! The proposer only needs something that turns (current instruction,
//! feedback summary, word budget) into new instruction text. That seam is the
//! `InstructionGenerator` trait; `LlmInstructionGenerator` implements it on
//! top of any `LlmClient`.
//!
//! The generator is asked to reason first and then answer with a JSON object
//! carrying `improved_instruction`. Models do not always comply, so parsing
//! also accepts fenced JSON, JSON embedded in prose and a labeled section
//! opened at the start of a line. Output cut off at the token limit counts
//! only when it still holds a complete JSON object. Retryable LLM errors are
//! retried with backoff.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

/// Errors from instruction generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed generator output: {0}")]
    Malformed(String),
}

/// Produces an improved instruction from feedback.
#[async_trait]
pub trait InstructionGenerator: Send + Sync {
    /// Generate a new instruction, asked to stay within `max_words`.
    async fn generate(
        &self,
        current_instruction: &str,
        feedback_summary: &str,
        max_words: NonZeroUsize,
    ) -> Result<String, GenerationError>;
}

/// Number of whitespace-separated words in a text.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Build the user prompt for one generation.
pub fn build_prompt(current_instruction: &str, feedback_summary: &str, max_words: NonZeroUsize) -> String {
    let mut prompt = String::new();

    prompt.push_str("Given a current instruction and feedback examples, ");
    prompt.push_str("generate an improved instruction with word limit constraints.\n\n");

    prompt.push_str("## Current Instruction\n\n");
    prompt.push_str("The current instruction that needs improvement:\n\n");
    prompt.push_str(current_instruction.trim());
    prompt.push_str("\n\n");

    prompt.push_str("## Feedback\n\n");
    prompt.push_str("Feedback from examples that might include both positive and negative cases:\n\n");
    prompt.push_str(feedback_summary.trim());
    prompt.push_str("\n\n");

    prompt.push_str("## Word Limit\n\n");
    prompt.push_str(&format!(
        "Maximum number of words allowed in the new instruction: {}\n\n",
        max_words
    ));

    prompt.push_str("## Your Response\n\n");
    prompt.push_str("Think step by step about what the feedback shows, then respond with EXACTLY one JSON object:\n");
    prompt.push_str("{\"reasoning\": \"<your reasoning>\", \"improved_instruction\": \"<the new instruction>\"}\n\n");
    prompt.push_str(&format!(
        "The improved instruction must fix the issues in the feedback while staying under {} words.",
        max_words
    ));

    prompt
}

#[derive(Debug, Deserialize)]
struct GeneratedInstruction {
    improved_instruction: String,
}

/// Extract the improved instruction from a raw model response.
pub fn parse_generation(response: &str) -> Result<String, GenerationError> {
    let body = strip_code_fence(response.trim());

    let instruction = json_reply(body).or_else(|| labeled_section(body)).ok_or_else(|| {
        GenerationError::Malformed(format!(
            "no improved_instruction in response: {}",
            truncate_for_error(response.trim(), 100)
        ))
    })?;

    non_empty(instruction)
}

/// Extract the instruction from output cut off at the token limit.
///
/// Only a complete JSON object is accepted; anything else is a fragment.
pub fn parse_truncated_generation(response: &str) -> Result<String, GenerationError> {
    let body = strip_code_fence(response.trim());

    let instruction = json_reply(body).ok_or_else(|| {
        GenerationError::Malformed(format!(
            "output truncated at the token limit: {}",
            truncate_for_error(response.trim(), 100)
        ))
    })?;

    non_empty(instruction)
}

fn non_empty(instruction: String) -> Result<String, GenerationError> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return Err(GenerationError::Malformed("improved_instruction is empty".to_string()));
    }
    Ok(instruction.to_string())
}

fn json_reply(body: &str) -> Option<String> {
    parse_json(body).or_else(|| embedded_json(body).and_then(parse_json))
}

fn parse_json(text: &str) -> Option<String> {
    serde_json::from_str::<GeneratedInstruction>(text)
        .ok()
        .map(|g| g.improved_instruction)
}

fn embedded_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

const LABEL: &str = "improved_instruction";

// The section opens on a "[[ ## improved_instruction ## ]]" marker line or a
// line starting with "improved_instruction:", and runs to the next "[[" marker.
fn labeled_section(text: &str) -> Option<String> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(first) = section_start(line) else {
            continue;
        };

        let mut section = vec![first];
        for next in lines.by_ref() {
            if next.trim_start().starts_with("[[") {
                break;
            }
            section.push(next);
        }
        let section = section.join("\n");
        let section = section.trim();
        return (!section.is_empty()).then(|| section.to_string());
    }
    None
}

// Text on the opening line after the label, if the line opens a section.
fn section_start(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if is_marker(trimmed) {
        return Some("");
    }

    // Tolerate markdown emphasis or heading around the label.
    let head = trimmed.trim_start_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());
    if !head.get(..LABEL.len())?.eq_ignore_ascii_case(LABEL) {
        return None;
    }
    let rest = head[LABEL.len()..].trim_start_matches('*');
    rest.strip_prefix(':').map(|text| text.trim_start_matches('*').trim())
}

fn is_marker(line: &str) -> bool {
    line.strip_prefix("[[")
        .and_then(|inner| inner.strip_suffix("]]"))
        .map(|inner| inner.trim_matches(|c: char| c == '#' || c.is_whitespace()))
        .is_some_and(|inner| inner.eq_ignore_ascii_case(LABEL))
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// LLM-backed instruction generator.
pub struct LlmInstructionGenerator {
    /// LLM client to generate with.
    client: Arc<dyn LlmClient>,

    /// System prompt for the generator.
    system_prompt: String,

    /// Timeout for a single generation attempt.
    timeout: Duration,

    /// Max tokens for the response (client default when unset).
    max_tokens: Option<u32>,

    /// Extra attempts after a retryable LLM error.
    max_retries: u32,

    /// Base delay between attempts, doubled each retry.
    retry_delay: Duration,
}

impl LlmInstructionGenerator {
    /// Create a generator with the given LLM client.
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            system_prompt: "You improve the instructions of an LLM pipeline that classifies financial news \
                            articles as mergers, acquisitions or other, and extracts deal details. \
                            Write instructions that fix the failures shown in the feedback."
                .to_string(),
            timeout: Duration::from_secs(300),
            max_tokens: None,
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set how many times a retryable error is retried.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn complete_with_retry(&self, request: CompletionRequest) -> Result<CompletionResponse, GenerationError> {
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(self.timeout, self.client.complete(request.clone()))
                .await
                .map_err(|_| GenerationError::Timeout(self.timeout))?;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = match &e {
                        LlmError::RateLimited { retry_after } => *retry_after,
                        _ => self.retry_delay * 2u32.pow(attempt),
                    };
                    attempt += 1;
                    log::warn!(
                        "Generation attempt {} failed: {}; retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl InstructionGenerator for LlmInstructionGenerator {
    async fn generate(
        &self,
        current_instruction: &str,
        feedback_summary: &str,
        max_words: NonZeroUsize,
    ) -> Result<String, GenerationError> {
        let mut request = CompletionRequest::new(self.system_prompt.clone()).with_user_message(build_prompt(
            current_instruction,
            feedback_summary,
            max_words,
        ));
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.complete_with_retry(request).await?;

        if response.finish_reason.is_truncated() {
            log::warn!("Generator output hit the token limit");
            return parse_truncated_generation(&response.content);
        }

        parse_generation(&response.content)
    }
}
