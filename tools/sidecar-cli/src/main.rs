//! Operator CLI for the retrieval sidecar: rebuild the indices, run queries
//! and inspect what is loaded.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use embedding_provider::config::{default_hash_config, default_onnx_config};
use embedding_provider::embedder::{Embedder, HashEmbedder, OnnxLocalEmbedder};
use retrieval_service::{RetrievalSidecar, SidecarConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sidecar-cli", about = "PDF retrieval sidecar operator tool")]
struct Cli {
    /// Directory scanned recursively for *.pdf sources.
    #[arg(long, default_value = "docs")]
    docs_dir: PathBuf,

    /// Directory holding the chunk/embedding cache.
    #[arg(long, default_value = ".cache")]
    cache_dir: PathBuf,

    /// Use the deterministic hash embedder instead of the ONNX model.
    #[arg(long)]
    offline: bool,

    /// Override the ONNX model path.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Override the tokenizer path.
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Override the ONNX Runtime shared library path.
    #[arg(long)]
    runtime: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the indices from the document directory.
    Rebuild,
    /// Run a retrieval query against a freshly built index.
    Query {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the health report.
    Health,
    /// List indexed documents.
    Docs,
    /// Debug-list indexed chunks (truncated contextual content).
    Chunks,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        tracing::error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            tracing::error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_embedder(cli: &Cli) -> Result<Arc<dyn Embedder>> {
    if cli.offline {
        let embedder = HashEmbedder::new(default_hash_config())
            .context("hash embedder configuration invalid")?;
        return Ok(Arc::new(embedder));
    }
    let mut config = default_onnx_config();
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    if let Some(tokenizer) = &cli.tokenizer {
        config.tokenizer_path = tokenizer.clone();
    }
    if let Some(runtime) = &cli.runtime {
        config.runtime_library_path = runtime.clone();
    }
    let embedder = OnnxLocalEmbedder::new(config).context("ONNX embedder failed to load")?;
    Ok(Arc::new(embedder))
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = SidecarConfig {
        docs_dir: cli.docs_dir.clone(),
        cache_dir: cli.cache_dir.clone(),
        ..SidecarConfig::default()
    };
    let final_top_k = config.final_top_k;
    let embedder = build_embedder(&cli)?;
    let sidecar = RetrievalSidecar::new(config, embedder);

    match cli.command {
        Commands::Rebuild => {
            let ack = sidecar.rebuild()?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
        }
        Commands::Query { query, top_k } => {
            sidecar.rebuild()?;
            let results = sidecar.retrieve(&query, top_k.unwrap_or(final_top_k))?;
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "[{:2}] score={:.3} | page {:3} | {} | {}",
                    rank + 1,
                    result.score,
                    result.page_number,
                    result.section_title,
                    result.document_name
                );
                let preview: String = result.chunk_content.chars().take(220).collect();
                println!("     {preview}");
            }
        }
        Commands::Health => {
            sidecar.rebuild()?;
            println!("{}", serde_json::to_string_pretty(&sidecar.health())?);
        }
        Commands::Docs => {
            sidecar.rebuild()?;
            println!("{}", serde_json::to_string_pretty(&sidecar.documents())?);
        }
        Commands::Chunks => {
            sidecar.rebuild()?;
            println!("{}", serde_json::to_string_pretty(&sidecar.chunks_debug())?);
        }
    }
    Ok(())
}
