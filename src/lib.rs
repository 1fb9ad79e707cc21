//! Dealscore - evaluation and instruction optimization for deal extraction
//!
//! Dealscore scores classified merger/acquisition records against gold
//! labels, turns the per-field feedback into a reflective dataset grouped by
//! pipeline component, and proposes word-limited instructions from it.

pub mod domain;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod proposer;

pub use error::{DealscoreError, Result};
