use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fs2::FileExt;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info};

use vault_ai_embed::FastEmbedProvider;
use vault_ai_retriever::config::VaultConfig;
use vault_ai_retriever::gateway::{QueryGateway, QueryRequest, QueryResponse, REQUEST_FILE, RESPONSE_FILE};
use vault_ai_retriever::generate::HttpAnswerGenerator;
use vault_ai_retriever::retrieval::engine::RetrievalEngine;
use vault_ai_retriever::retrieval::index_manager::IndexManager;
use vault_ai_retriever::retrieval::watcher::VaultWatcher;
use vault_ai_retriever::storage::memory_store::MemoryVectorStore;

/// Index a vault of text documents and answer questions over it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the watched vault root
    #[arg(long)]
    vault_root: Option<PathBuf>,

    /// Override the plugin/IPC directory for request and response files
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index the vault, watch for changes, and answer deposited questions
    Serve,
    /// Deposit a question for a running serve loop and wait for the answer
    Ask {
        /// The question to ask
        question: String,
        /// How long to wait for an answer, in seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = VaultConfig::load(args.config.as_deref())?;
    if let Some(vault_root) = args.vault_root {
        config.vault_root = vault_root;
    }
    if let Some(plugin_dir) = args.plugin_dir {
        config.plugin_dir = plugin_dir;
    }

    match args.command {
        Commands::Serve => serve(config).await,
        Commands::Ask {
            question,
            timeout_secs,
        } => ask(config, question, Duration::from_secs(timeout_secs)).await,
    }
}

async fn serve(config: VaultConfig) -> Result<()> {
    let embedder = Arc::new(
        FastEmbedProvider::create(config.embedding.clone())
            .await
            .context("Failed to initialize embedding provider")?,
    );
    let store = Arc::new(MemoryVectorStore::new());
    let generator = Arc::new(HttpAnswerGenerator::new(config.generator.clone())?);

    let mut index = IndexManager::new(
        config.vault_root.clone(),
        config.excluded_dirs(),
        embedder.clone(),
        store.clone(),
    );

    info!("Processing existing files in: {}", config.vault_root.display());
    let indexed = index.scan_tree().await?;
    info!("Initial scan embedded {indexed} files");

    let index = Arc::new(Mutex::new(index));
    let watcher = VaultWatcher::open(&config.vault_root, index.clone(), config.debounce())?;

    let engine = RetrievalEngine::new(embedder, store);
    let gateway = QueryGateway::new(
        config.plugin_dir.clone(),
        config.top_k,
        config.snippet_max_chars,
        engine,
        generator,
    );

    let poll_interval = config.poll_interval();
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break Ok(());
            }
            _ = tokio::time::sleep(poll_interval) => {
                // Only lock acquisition failures escape poll_once, and those
                // are unrecoverable
                if let Err(e) = gateway.poll_once().await {
                    break Err(e);
                }
            }
        }
    };

    // Stop the change listener before exiting
    watcher.shutdown().await;
    result
}

async fn ask(config: VaultConfig, question: String, timeout: Duration) -> Result<()> {
    let request_path = config.plugin_dir.join(REQUEST_FILE);
    let response_path = config.plugin_dir.join(RESPONSE_FILE);

    // Deposit the request under the same lock discipline the gateway uses
    {
        let lock_path = config.plugin_dir.join(format!("{REQUEST_FILE}.lock"));
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        lock.lock_exclusive()
            .context("Failed to acquire request lock")?;
        let request = QueryRequest {
            question: question.clone(),
        };
        let result = std::fs::write(&request_path, serde_json::to_string_pretty(&request)?);
        lock.unlock().context("Failed to release request lock")?;
        result.context("Failed to write request file")?;
    }
    info!("Deposited question, waiting for answer");

    let started = Instant::now();
    while started.elapsed() < timeout {
        tokio::time::sleep(Duration::from_millis(500)).await;

        let Ok(raw) = std::fs::read_to_string(&response_path) else {
            continue;
        };
        let Ok(response) = serde_json::from_str::<QueryResponse>(&raw) else {
            continue;
        };
        if response.question != question {
            // Stale response from an earlier request
            continue;
        }

        println!("{}", response.answer);
        if !response.sources.is_empty() {
            println!("\nSources:");
            for source in &response.sources {
                println!("  {}", source.display());
            }
        }
        return Ok(());
    }

    bail!("Timed out after {}s waiting for an answer", timeout.as_secs())
}
