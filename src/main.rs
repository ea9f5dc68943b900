use anyhow::{Context, Result};
use civicwatch::{
    chunker::Chunker,
    config::{self, Config},
    logging,
    oracle::OllamaOracle,
    pipeline::{Pipeline, PipelineOutcome, PipelineStores},
    source::{DocumentSource, JsonFileSource, Normalizer, StaticSource},
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "civicwatch",
    about = "Summarize civic documents with a cached map-reduce pipeline"
)]
struct Cli {
    /// Override the cache directory (`CIVICWATCH_STORAGE_DIR`).
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline for one document and print the final summary.
    Run {
        #[command(flatten)]
        input: InputArgs,
        /// Ignore cached summaries and regenerate them.
        #[arg(long)]
        force_rerun: bool,
    },
    /// Print the chunks a document would be split into, as JSON.
    Chunk {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Raw document JSON (`title`, `date`, `text`, `source_url`, `source_type`).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Use the built-in sample document.
    #[arg(long)]
    mock: bool,
}

impl InputArgs {
    fn source(&self) -> Box<dyn DocumentSource> {
        match &self.input {
            Some(path) => Box::new(JsonFileSource::new(path)),
            None => Box::new(StaticSource::sample()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    config::load_dotenv();
    logging::init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    let stores = PipelineStores::filesystem(&config.storage_dir);

    match cli.command {
        Command::Run { input, force_rerun } => {
            let oracle = OllamaOracle::new(&config.oracle)
                .context("failed to construct Ollama client")?;
            let pipeline = Pipeline::new(config.chunker, Arc::new(oracle), stores);
            let outcome = pipeline.run(input.source().as_ref(), force_rerun).await;
            tracing::info!(metrics = ?pipeline.metrics(), "Run finished");

            match outcome {
                PipelineOutcome::Done(summary) => {
                    let rule = "=".repeat(80);
                    println!("\n{rule}\nFINAL SUMMARY\n{rule}\n{}\n{rule}", summary.summary);
                    Ok(ExitCode::SUCCESS)
                }
                PipelineOutcome::Failed { stage, error } => {
                    eprintln!("Pipeline failed at {stage} stage: {error}. Check logs for details.");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Chunk { input } => {
            let raw = input
                .source()
                .fetch()
                .await
                .context("failed to read document")?;
            let document = Normalizer::new().normalize(&raw);
            let chunker = Chunker::new(config.chunker, stores.chunks);
            let chunks = chunker.chunk(&document.id, &document.text);
            println!("{}", serde_json::to_string_pretty(&chunks)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
