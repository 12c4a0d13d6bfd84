//! One-shot command line entrypoint.
//!
//! Reads a plain-text document (or inline text), runs the pipeline once against the configured
//! embedding endpoint, and writes the outcome as JSON to stdout or a file.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use embedscope::{
    config, logging,
    processing::{PipelineOutcome, PipelineRequest, PipelineService},
};

#[derive(Parser)]
#[command(
    name = "embedscope-cli",
    about = "Chunk a document, embed it with a query, and emit 3D points with top matches"
)]
#[command(group(ArgGroup::new("source").required(true).args(["document", "text"])))]
struct Cli {
    /// Plain-text document to chunk.
    #[arg(long)]
    document: Option<PathBuf>,
    /// Inline document text.
    #[arg(long)]
    text: Option<String>,
    /// Query compared against every chunk.
    #[arg(long)]
    query: String,
    /// Characters per chunk (defaults to CHUNK_SIZE).
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Characters carried into the next chunk (defaults to CHUNK_OVERLAP).
    #[arg(long)]
    chunk_overlap: Option<usize>,
    /// Number of top matches to highlight (defaults to RESULT_SIZE).
    #[arg(long)]
    result_size: Option<usize>,
    /// Keep the document text exactly as read.
    #[arg(long)]
    no_clean: bool,
    /// Write the JSON outcome here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing();

    let text = match (&cli.document, cli.text) {
        (Some(path), _) => fs::read_to_string(path)
            .with_context(|| format!("failed to read document at {}", path.display()))?,
        (None, Some(text)) => text,
        (None, None) => bail!("either --document or --text is required"),
    };

    let config = config::load_config().context("failed to load configuration")?;
    let service =
        PipelineService::from_config(&config).context("failed to build embedding client")?;

    let request = PipelineRequest {
        text,
        query: cli.query,
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        result_size: cli.result_size,
        clean_text: Some(!cli.no_clean),
    };
    let outcome = service.run(request).await.map_err(|error| {
        anyhow::anyhow!(
            "{} stage failed ({}): {error}",
            error.stage(),
            error.kind()
        )
    })?;

    write_outcome(&outcome, cli.output.as_deref())
}

fn write_outcome(outcome: &PipelineOutcome, output: Option<&Path>) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(outcome).context("failed to serialize pipeline outcome")?;
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write outcome to {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{rendered}").context("failed to write outcome to stdout")
        }
    }
}
