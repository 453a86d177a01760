use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use sparrow_rag::credentials::EnvCredentialProvider;
use sparrow_rag::logging::{default_log_directory, init_logging};
use sparrow_rag::rag::documents::discover_pdfs;
use sparrow_rag::{RagConfig, RagRuntime};

#[derive(Parser, Debug)]
#[command(
    name = "sparrow-rag",
    about = "Index PDF documents and answer questions grounded on them"
)]
struct Cli {
    /// JSON config file (defaults to ~/.sparrow/rag_config.json)
    #[arg(long, env = "SPARROW_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for rolling log files (defaults to ~/.sparrow/logs)
    #[arg(long, env = "SPARROW_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Environment variable holding the API key
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and index documents; directories are searched for PDFs
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        query: String,

        /// Number of chunks used as context (defaults to the configured top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// Also print confidence and source documents
        #[arg(long, default_value_t = false)]
        sources: bool,
    },
    /// Show what the collection holds
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match &cli.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_directory()?,
    };
    let _guard = init_logging(&log_dir).map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => RagConfig::default_path()?,
    };
    let config = RagConfig::load_from_file(&config_path)
        .and_then(RagConfig::with_env_overrides)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let credentials = Arc::new(EnvCredentialProvider::new(cli.api_key_env.clone()));
    let runtime = RagRuntime::from_config(config, credentials)
        .await
        .context("failed to start the RAG runtime")?;

    match cli.command {
        Command::Ingest { paths } => ingest(&runtime, paths).await,
        Command::Ask { query, top_k, sources } => {
            let top_k = top_k.unwrap_or(runtime.config.top_k);
            if sources {
                let answer = runtime.query.answer_with_sources(&query, top_k).await?;
                println!("{}", answer.answer);
                println!("\nconfidence: {:.3}", answer.confidence_score);
                for source in answer.sources {
                    println!("source: {}", source);
                }
            } else {
                println!("{}", runtime.query.answer(&query, top_k).await?);
            }
            Ok(())
        }
        Command::Stats => stats(&runtime),
    }
}

async fn ingest(runtime: &RagRuntime, paths: Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = discover_pdfs(&path)?;
            if found.is_empty() {
                tracing::warn!(dir = %path.display(), "No PDF files found");
            }
            files.extend(found);
        } else {
            files.push(path);
        }
    }

    if files.is_empty() {
        bail!("nothing to ingest");
    }

    let mut failed = 0;
    for file in &files {
        match runtime.ingestion.ingest_path(file).await {
            Ok(report) => println!("{}: {} chunks", report.source, report.chunk_count),
            Err(e) => {
                failed += 1;
                tracing::error!(file = %file.display(), error = %e, "Failed to ingest document");
            }
        }
    }

    println!(
        "Ingested {} of {} documents into '{}' ({} records total)",
        files.len() - failed,
        files.len(),
        runtime.vector_store.collection(),
        runtime.vector_store.count()
    );

    if failed > 0 {
        bail!("{} documents failed to ingest", failed);
    }
    Ok(())
}

fn stats(runtime: &RagRuntime) -> Result<()> {
    let store = &runtime.vector_store;
    let records = store.records()?;

    let mut per_source: BTreeMap<String, usize> = BTreeMap::new();
    for record in &records {
        let source = record.metadata.get("source").cloned().unwrap_or_else(|| "<unknown>".to_string());
        *per_source.entry(source).or_default() += 1;
    }

    println!("storage:    {}", store.storage_dir().display());
    println!("collection: {}", store.collection());
    println!("records:    {}", records.len());
    match store.dimension()? {
        Some(dimension) => println!("dimension:  {}", dimension),
        None => println!("dimension:  -"),
    }
    for (source, count) in per_source {
        println!("  {:>6}  {}", count, source);
    }
    Ok(())
}
