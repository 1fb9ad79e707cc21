//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - evaluate: score predicted records against gold records
//! - propose: run one instruction proposal round

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dealscore - evaluate deal extractions and propose better instructions
#[derive(Parser, Debug)]
#[command(name = "dealscore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score predicted records against gold records
    Evaluate {
        /// JSON array of gold records
        #[arg(short, long)]
        gold: PathBuf,

        /// JSON array of predicted records
        #[arg(short, long)]
        predicted: PathBuf,

        /// Component to attribute feedback to (repeatable)
        #[arg(long = "component")]
        components: Vec<String>,

        /// Write the reflective dataset to this file
        #[arg(short, long)]
        reflective_out: Option<PathBuf>,
    },

    /// Propose new instructions from a reflective dataset
    Propose {
        /// Instruction candidate JSON
        #[arg(long)]
        candidate: PathBuf,

        /// Reflective dataset JSON
        #[arg(short, long)]
        reflective: PathBuf,

        /// Component to update (repeatable)
        #[arg(long = "component", required = true)]
        components: Vec<String>,

        /// Word budget, overriding the configured one
        #[arg(short, long)]
        max_words: Option<usize>,

        /// Where to write the updated candidate (defaults to --candidate)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}
