use async_trait::async_trait;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;
use dealscore::DealscoreError;
use dealscore::domain::{ClassifiedRecord, load_records};
use dealscore::evaluation::{EvaluationHarness, ExtractionPipeline, LabeledExample, ReflectiveDataset};
use dealscore::llm::{LlmClient, OpenRouterClient};
use dealscore::proposer::{InstructionCandidate, LlmInstructionGenerator, WordLimitProposer, word_count};

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dealscore")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("dealscore.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let level = if verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };

    // RUST_LOG still wins over the configured level
    env_logger::Builder::new()
        .parse_filters(level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Evaluate {
            gold,
            predicted,
            components,
            reflective_out,
        } => handle_evaluate_command(gold, predicted, components, reflective_out.as_deref(), config).await,
        Commands::Propose {
            candidate,
            reflective,
            components,
            max_words,
            out,
        } => {
            handle_propose_command(
                candidate,
                reflective,
                components,
                *max_words,
                out.as_deref(),
                cli.is_verbose(),
                config,
            )
            .await
        }
    }
}

/// Serves precomputed predictions, keyed by article id as article text.
struct ReplayPipeline {
    predictions: HashMap<u32, ClassifiedRecord>,
    components: Vec<String>,
}

#[async_trait]
impl ExtractionPipeline for ReplayPipeline {
    async fn run(&self, article_text: &str) -> dealscore::Result<ClassifiedRecord> {
        article_text
            .parse::<u32>()
            .ok()
            .and_then(|id| self.predictions.get(&id).cloned())
            .ok_or_else(|| DealscoreError::Pipeline(format!("no prediction for article {}", article_text)))
    }

    fn components_for(&self, _predicted: &ClassifiedRecord) -> Vec<String> {
        self.components.clone()
    }
}

/// Turn gold records into labeled examples and predictions into a replay pipeline.
///
/// A gold record without a prediction is scored against `Other` by the harness.
fn replay_inputs(
    gold: Vec<ClassifiedRecord>,
    predicted: Vec<ClassifiedRecord>,
    components: &[String],
) -> Result<(Vec<LabeledExample>, ReplayPipeline)> {
    let mut predictions: HashMap<u32, ClassifiedRecord> = HashMap::new();
    for record in predicted {
        match record.article_id() {
            Some(id) => {
                if predictions.insert(id, record).is_some() {
                    log::warn!("Duplicate prediction for article {}, keeping the last", id);
                }
            }
            None => log::warn!("Ignoring prediction without article_id"),
        }
    }

    let examples = gold
        .into_iter()
        .enumerate()
        .map(|(index, expected)| {
            let Some(article_id) = expected.article_id() else {
                eyre::bail!("Gold record {} has no article_id", index);
            };
            Ok(LabeledExample {
                article_id,
                article_text: article_id.to_string(),
                expected,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let pipeline = ReplayPipeline {
        predictions,
        components: components.to_vec(),
    };
    Ok((examples, pipeline))
}

async fn handle_evaluate_command(
    gold: &Path,
    predicted: &Path,
    components: &[String],
    reflective_out: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let gold = load_records(gold).context(format!("Failed to load gold records from {}", gold.display()))?;
    let predicted = load_records(predicted)
        .context(format!("Failed to load predicted records from {}", predicted.display()))?;
    let (examples, pipeline) = replay_inputs(gold, predicted, components)?;

    let harness = EvaluationHarness::new(Arc::new(pipeline)).with_workers(config.evaluation.workers);
    let report = harness.run(&examples).await;

    for result in &report.results {
        let label = format!("[{:.3}]", result.score());
        let feedback = result.comparison.feedback();
        if result.score() >= 1.0 {
            println!("{} {}", label.green(), feedback.trim_end());
        } else {
            println!("{} {}", label.red(), feedback.trim_end());
        }
    }

    println!(
        "{} {:.3} over {} article(s), {} classified correctly",
        "Mean score:".green(),
        report.mean_score(),
        report.results.len(),
        report.correctly_classified()
    );
    if report.pipeline_failures() > 0 {
        println!(
            "{} {} article(s) had no prediction and were scored as Other",
            "Missing:".yellow(),
            report.pipeline_failures()
        );
    }

    if let Some(path) = reflective_out {
        let dataset = report.reflective_dataset();
        dataset
            .save(path)
            .context(format!("Failed to write reflective dataset to {}", path.display()))?;
        println!(
            "{} {} example(s) for {} component(s) to {}",
            "Wrote".cyan(),
            dataset.example_count(),
            dataset.len(),
            path.display()
        );
    }

    Ok(())
}

async fn handle_propose_command(
    candidate_path: &Path,
    reflective_path: &Path,
    components: &[String],
    max_words: Option<usize>,
    out: Option<&Path>,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    let mut candidate = InstructionCandidate::load(candidate_path)
        .context(format!("Failed to load candidate from {}", candidate_path.display()))?;
    let dataset = ReflectiveDataset::load(reflective_path)
        .context(format!("Failed to load reflective dataset from {}", reflective_path.display()))?;

    let max_words = match max_words {
        Some(n) => NonZeroUsize::new(n).ok_or_else(|| eyre::eyre!("--max-words must be > 0"))?,
        None => config
            .proposer
            .max_words()
            .ok_or_else(|| eyre::eyre!("proposer.max_words must be > 0"))?,
    };

    let api_key = config.llm.api_key()?;
    let client = Arc::new(
        OpenRouterClient::new(config.llm.to_openrouter_config(api_key)).context("Failed to create LLM client")?,
    );
    info!("Proposing with model {}", client.model());

    let generator = LlmInstructionGenerator::new(client.clone())
        .with_timeout(config.llm.timeout())
        .with_max_tokens(config.llm.max_tokens)
        .with_max_retries(config.llm.max_retries);
    let proposer = WordLimitProposer::new(Arc::new(generator)).with_max_words(max_words);

    let proposals = proposer.propose(&candidate, &dataset, components).await;

    for component in components {
        match proposals.get(component) {
            Some(instruction) => {
                println!("{} {} ({} words)", "Updated:".green(), component, word_count(instruction));
                if verbose {
                    println!("{}", instruction);
                }
            }
            None => println!("{} {}", "Unchanged:".yellow(), component),
        }
    }

    let updated = candidate.merge(&proposals);
    let out = out.unwrap_or(candidate_path);
    candidate
        .save(out)
        .context(format!("Failed to write candidate to {}", out.display()))?;
    println!("{} {} instruction(s) to {}", "Wrote".cyan(), updated, out.display());

    let usage = client.total_usage();
    println!(
        "{} {} tokens ({} in, {} out)",
        "Usage:".cyan(),
        usage.total(),
        usage.input_tokens,
        usage.output_tokens
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the level is known
    setup_logging(&config, cli.is_verbose()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
