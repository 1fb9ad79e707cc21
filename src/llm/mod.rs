//! LLM Client Layer - chat-completion API access
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenRouterClient implementation (OpenAI-compatible)

pub mod client;
pub mod openrouter;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use openrouter::{OpenRouterClient, OpenRouterConfig};
pub use types::{CompletionRequest, CompletionResponse, FinishReason, Message, Role, Usage};
