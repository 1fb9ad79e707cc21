//! Error types for dealscore
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in dealscore
#[derive(Debug, Error)]
pub enum DealscoreError {
    /// Input records could not be used as given
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Extraction pipeline failed to produce a prediction
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    /// Instruction candidate could not be loaded or saved
    #[error("Candidate error: {0}")]
    Candidate(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for dealscore operations
pub type Result<T> = std::result::Result<T, DealscoreError>;
