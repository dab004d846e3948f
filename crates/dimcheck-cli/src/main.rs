//! Command-line entry point: run the full comparison pipeline over one
//! master/check drawing pair, or print a cost estimate before running it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dimcheck_ingest::providers::{bedrock::BedrockProvider, openai::OpenAiProvider};
use dimcheck_pipeline::{ComparisonOptions, ComparisonRequest, Pipeline, Providers, ReviewMode};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "dimcheck")]
#[command(about = "Compare a check drawing against its master for dimensional and GD&T drift")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReviewModeArg {
    Structured,
    Adversarial,
    Both,
}

impl From<ReviewModeArg> for ReviewMode {
    fn from(value: ReviewModeArg) -> Self {
        match value {
            ReviewModeArg::Structured => ReviewMode::Structured,
            ReviewModeArg::Adversarial => ReviewMode::Adversarial,
            ReviewModeArg::Both => ReviewMode::Both,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline on a master/check drawing pair
    Compare {
        /// Path to the master (reference) drawing
        #[arg(long)]
        master: PathBuf,

        /// Path to the check drawing being verified
        #[arg(long)]
        check: PathBuf,

        /// Which review path(s) to run in addition to the deterministic comparator
        #[arg(long, value_enum, default_value = "structured")]
        review_mode: ReviewModeArg,

        /// Write the JSON result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print an estimated model-call cost table for a master/check pair
    Estimate {
        /// Path to the master (reference) drawing
        #[arg(long)]
        master: PathBuf,

        /// Path to the check drawing being verified
        #[arg(long)]
        check: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dimcheck=info".parse().expect("directive is compile-time constant")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Compare {
            master,
            check,
            review_mode,
            output,
        } => compare(&master, &check, review_mode.into(), output.as_deref()).await,
        Command::Estimate { master, check } => estimate(&master, &check),
    }
}

async fn compare(master: &PathBuf, check: &PathBuf, review_mode: ReviewMode, output: Option<&std::path::Path>) -> Result<()> {
    let config = dimcheck_pipeline::config::PipelineConfig::from_env();

    let vision = build_provider(&config.vision_model).await?;
    let reasoning = build_provider(&config.reasoning_model).await?;
    let adversarial_a = build_provider(&config.adversarial_model_a).await?;
    let adversarial_b = build_provider(&config.adversarial_model_b).await?;

    let providers = Providers {
        vision: vision.as_ref(),
        reasoning: reasoning.as_ref(),
        adversarial_a: adversarial_a.as_ref(),
        adversarial_b: adversarial_b.as_ref(),
    };

    let request = ComparisonRequest {
        master_path: master.clone(),
        check_path: check.clone(),
        options: ComparisonOptions {
            use_cnn_ocr: config.use_cnn_ocr,
            ocr_consensus_threshold: config.ocr_consensus_threshold,
            cnn_min_confidence: config.cnn_min_confidence,
            review_mode,
        },
    };

    let pipeline = Pipeline::new(config);
    let result = pipeline.run(&providers, &request).await.context("pipeline run failed")?;

    info!(score = result.summary.score, total = result.summary.total, "comparison complete");

    let json = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}

/// Build a [`dimcheck_core::provider::JsonProvider`] from a model identifier.
/// Anthropic/Claude model IDs route to Bedrock; everything else is treated
/// as an OpenAI-compatible chat-completions endpoint (§9 "Provider SDK
/// coupling").
async fn build_provider(model: &str) -> Result<Box<dyn dimcheck_core::provider::JsonProvider>> {
    if model.contains("claude") || model.contains("anthropic") {
        let provider = BedrockProvider::new(model).await.context("failed to build Bedrock provider")?;
        Ok(Box::new(provider))
    } else {
        let provider = OpenAiProvider::new(model).context("failed to build OpenAI provider")?;
        Ok(Box::new(provider))
    }
}

/// Per-1M-token USD pricing for a handful of well-known models; unrecognized
/// model names fall back to the GPT-4o-class estimate.
fn model_pricing(model: &str) -> (f64, f64) {
    if model.contains("claude") || model.contains("anthropic") {
        (3.00, 15.00)
    } else if model.contains("o1") {
        (15.00, 60.00)
    } else {
        (2.50, 10.00)
    }
}

/// Rough per-image token estimate: a full-page engineering drawing at
/// vision-API "high" detail.
const EST_INPUT_TOKENS_PER_IMAGE: f64 = 2000.0;
const EST_OUTPUT_TOKENS_PER_CALL: f64 = 1500.0;

fn estimate(master: &PathBuf, check: &PathBuf) -> Result<()> {
    let config = dimcheck_pipeline::config::PipelineConfig::from_env();
    let models = [
        ("vision (master + check)", &config.vision_model, 2u32),
        ("reasoning (comparator fallback)", &config.reasoning_model, 1),
        ("adversarial round A", &config.adversarial_model_a, 2),
        ("adversarial round B", &config.adversarial_model_b, 2),
    ];

    println!("Cost Estimate for {} vs {}\n", master.display(), check.display());
    println!("| Stage | Model | Images | Est. Cost |");
    println!("|-------|-------|--------|-----------|");

    let mut total = 0.0;
    for (stage, model, image_count) in models {
        let (input_cost_per_m, output_cost_per_m) = model_pricing(model);
        let images = f64::from(image_count);
        let cost = (images * EST_INPUT_TOKENS_PER_IMAGE * input_cost_per_m / 1_000_000.0)
            + (EST_OUTPUT_TOKENS_PER_CALL * output_cost_per_m / 1_000_000.0);
        total += cost;
        println!("| {stage} | {model} | {image_count} | ${cost:.4} |");
    }

    println!("\n**Total estimated cost:** ${total:.4}");
    Ok(())
}
