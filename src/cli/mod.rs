//! CLI module for dealscore - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for evaluating
//! predictions and proposing instructions.

pub mod commands;

pub use commands::Cli;
