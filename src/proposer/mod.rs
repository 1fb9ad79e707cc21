//! Instruction proposal from reflective feedback.
//!
//! - candidate: the per-component instructions being optimized
//! - generator: the text-generation seam and its LLM implementation
//! - word_limit: the proposer that drives generation per component

pub mod candidate;
pub mod generator;
pub mod word_limit;

pub use candidate::{ComponentInstruction, InstructionCandidate, Proposals};
pub use generator::{
    GenerationError, InstructionGenerator, LlmInstructionGenerator, build_prompt, parse_generation, word_count,
};
pub use word_limit::{DEFAULT_MAX_WORDS, WordLimitProposer};
