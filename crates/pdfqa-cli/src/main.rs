//! PDF Q&A CLI - Command-line interface
//!
//! Usage:
//!   pdfqa upload <file.pdf>
//!   pdfqa ingest <file.pdf> [--collection <name>]
//!   pdfqa sync
//!   pdfqa collections
//!   pdfqa ask <question> -c <collection>...

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pdfqa_core::{AppConfig, LoggingConfig};
use pdfqa_rag::{create_llm_client, AskOutcome, IngestReport, Ingestor, PdfQa};
use pdfqa_vector::{EmbeddingClient, FastEmbedClient, QdrantStore, VectorStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdfqa")]
#[command(about = "Ask questions about your PDF documents")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a PDF into the upload directory and ingest it
    Upload {
        /// PDF file to upload
        path: PathBuf,
    },
    /// Ingest a PDF in place
    Ingest {
        /// PDF file to ingest
        path: PathBuf,

        /// Collection name (derived from the file name by default)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Ingest uploaded PDFs that have no collection yet
    Sync,
    /// List available collections
    Collections,
    /// Ask a question about one or more collections
    Ask {
        /// Question to ask
        question: String,

        /// Collection to search (repeatable)
        #[arg(short = 'c', long = "collection")]
        collections: Vec<String>,

        /// Number of excerpts used to answer
        #[arg(long, value_parser = parse_top_k)]
        top_k: Option<usize>,
    },
}

fn parse_top_k(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    config.ensure_upload_dir()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(QdrantStore::new(&config.vector_store)?))
}

fn embedder(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    let client = FastEmbedClient::new(&config.embedding, config.vector_store.vector_dimension)?;
    Ok(Arc::new(client))
}

fn print_report(report: &IngestReport) {
    println!(
        "Indexed {} ({} pages, {} chunks) into collection '{}'",
        report.source, report.page_count, report.chunk_count, report.collection
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging);
    tracing::debug!(
        qdrant = %config.vector_store.url,
        embedding_model = %config.embedding.model,
        llm_provider = ?config.llm.provider,
        "configuration loaded"
    );

    match cli.command {
        Commands::Upload { path } => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Upload path has no file name")?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let ingestor = Ingestor::new(vector_store(&config)?, embedder(&config)?, &config);
            let report = ingestor.save_upload(&file_name, &bytes).await?;
            print_report(&report);
        }
        Commands::Ingest { path, collection } => {
            let ingestor = Ingestor::new(vector_store(&config)?, embedder(&config)?, &config);
            let report = match collection {
                Some(name) => ingestor.ingest(&path, &name).await?,
                None => ingestor.ingest_file(&path).await?,
            };
            print_report(&report);
        }
        Commands::Sync => {
            let ingestor = Ingestor::new(vector_store(&config)?, embedder(&config)?, &config);
            let reports = ingestor.sync_uploads().await?;
            if reports.is_empty() {
                println!("All uploads are already indexed.");
            }
            for report in &reports {
                print_report(report);
            }
        }
        Commands::Collections => {
            let collections = vector_store(&config)?.list_collections().await?;
            if collections.is_empty() {
                println!("No collections yet. Upload a PDF first.");
            }
            for name in collections {
                println!("{name}");
            }
        }
        Commands::Ask {
            question,
            collections,
            top_k,
        } => {
            if let Err(warning) = pdfqa_rag::check_query(&question, &collections) {
                eprintln!("warning: {warning}");
                return Ok(());
            }

            let llm = create_llm_client(&config.llm)?;
            let mut qa = PdfQa::new(
                vector_store(&config)?,
                embedder(&config)?,
                Arc::from(llm),
                config.rag.clone(),
            );
            if let Some(top_k) = top_k {
                qa = qa.with_top_k(top_k);
            }

            match qa.ask(&question, &collections).await? {
                AskOutcome::Answered(answer) => {
                    println!("{}", answer.text);
                    println!();
                    println!("Used PDFs: {}", answer.sources().join(", "));
                }
                AskOutcome::Rejected(warning) => eprintln!("warning: {warning}"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_arguments() {
        let cli = Cli::try_parse_from([
            "pdfqa", "ask", "What is it?", "-c", "report", "-c", "notes", "--top-k", "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask {
                question,
                collections,
                top_k,
            } => {
                assert_eq!(question, "What is it?");
                assert_eq!(collections, vec!["report", "notes"]);
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(Cli::try_parse_from(["pdfqa", "ask", "q", "-c", "doc", "--top-k", "0"]).is_err());
        assert!(Cli::try_parse_from(["pdfqa", "ask", "q", "--top-k", "many"]).is_err());
    }
}
