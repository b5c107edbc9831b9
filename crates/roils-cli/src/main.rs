//! roils: command-line driver for the incident summarization pipeline.
//!
//! Summarizes incident narratives stored in Redis with an Ollama model,
//! evaluates the summaries, and exports the results.

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use roils_core::{FieldKind, ModelId, PipelineConfig};
use roils_inference::ContainerAction;

#[derive(Parser, Debug)]
#[command(name = "roils")]
#[command(author, version, about = "Incident narrative summarization pipeline")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: ./roils.toml)
    #[arg(short, long, global = true, env = "ROILS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a summary for every record
    Summarize {
        /// Summary model (default: summary.model from config)
        #[arg(short, long)]
        model: Option<ModelId>,

        /// Regenerate summaries that already exist
        #[arg(long)]
        no_resume: bool,
    },

    /// Evaluate every stored summary, re-scanning until no gaps can be filled
    Evaluate {
        /// Evaluation model (default: evaluation.model from config)
        #[arg(short, long)]
        model: Option<ModelId>,

        /// Re-evaluate records that already have an evaluation
        #[arg(long)]
        no_resume: bool,
    },

    /// Summarize, then evaluate, with the configured models
    Run {
        #[arg(long)]
        no_resume: bool,

        /// Write the CSV export afterwards
        #[arg(long)]
        export: bool,
    },

    /// Force a new summary and evaluation for one record
    Regenerate {
        /// Record id (`17` or `event:17`)
        event_id: String,
    },

    /// Delete one model's generated fields from every record
    Clear {
        #[arg(short, long)]
        model: ModelId,

        /// Only this field kind (summary or evaluation)
        #[arg(short, long)]
        field: Option<FieldKind>,
    },

    /// Write narratives, summaries and evaluations to CSV
    Export {
        /// Output file (default: export.path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print records page by page
    Browse {
        #[arg(long, default_value_t = roils_core::defaults::BROWSE_PAGE_SIZE)]
        page_size: usize,
    },

    /// Start, stop or restart the backend container on the lifecycle host
    Container {
        /// start, stop or restart
        action: ContainerAction,
    },

    /// Verify the record store and generation backend are reachable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = logging::init();

    let config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;

    commands::dispatch(cli.command, &config).await
}
