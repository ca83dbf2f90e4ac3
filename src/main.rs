//! Smart Recycle - waste classification service
//!
//! Classifies item descriptions into disposal categories by semantic search
//! over a recycling knowledge base.
//!
//! # Usage
//!
//! ```bash
//! # Seed the collection, then serve the HTTP API
//! smart-recycle ingest
//! smart-recycle serve --addr 0.0.0.0:8080
//!
//! # Interactive terminal chat
//! smart-recycle chat
//!
//! # One-shot classification, standard JSON profile
//! smart-recycle classify "alte Zeitung"
//! ```
//!
//! # Environment Variables
//!
//! - `SMART_RECYCLE_CONFIG`: Path to a TOML settings file
//! - `OPENAI_API_KEY`, `QDRANT_URL`, `TOP_K`, `MIN_SCORE`, ...: setting overrides
//! - `SMART_RECYCLE_CORS_ORIGINS`: Comma-separated allowed browser origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use smart_recycle::api::{create_app, AppState};
use smart_recycle::config::{self, Settings};
use smart_recycle::embedding::build_provider;
use smart_recycle::index::build_index;
use smart_recycle::{
    Classifier, IndexError, KnowledgeBaseLoader, KnowledgeDataset, StatsStore, StatsTracker,
};

mod chat;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "smart-recycle")]
#[command(about = "Smart Recycle waste classification service")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the HTTP API (default)
    Serve {
        /// Override the server address (default: "0.0.0.0:8080")
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Embed the knowledge base and upsert it into the collection
    Ingest {
        /// TOML dataset replacing the configured one
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
    },

    /// Interactive classification in the terminal
    Chat,

    /// Classify one description and print the decision as JSON
    Classify {
        /// Item description
        text: String,
    },
}

// ============================================================================
// Task Names (for supervisor logging)
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
        }
    }
}

// ============================================================================
// Shared Initialization
// ============================================================================

/// Components shared by every subcommand.
struct Services {
    classifier: Arc<Classifier>,
    loader: Arc<KnowledgeBaseLoader>,
    stats_store: Option<StatsStore>,
}

impl Services {
    fn init(settings: &Settings) -> Result<Self> {
        let embedder = build_provider(&settings.embedding, &settings.network)
            .context("Failed to build embedding provider")?;
        info!("✓ Embedding provider: {}", embedder.provider_name());

        let index = build_index(&settings.index, &settings.network)
            .context("Failed to build similarity index")?;
        info!(
            "✓ Similarity index: {} (collection '{}')",
            index.backend_name(),
            settings.index.collection
        );

        let stats_store = match settings.stats.store_path.as_deref() {
            Some(path) => match StatsStore::open(path) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Stats store unavailable, counters kept in memory");
                    None
                }
            },
            None => None,
        };
        let tracker = match stats_store.as_ref().map(StatsStore::load) {
            Some(Ok(counters)) => {
                info!("✓ Stats counters restored");
                StatsTracker::with_counters(counters)
            }
            Some(Err(e)) => {
                warn!(error = %e, "Stored stats unreadable, starting from zero");
                StatsTracker::new()
            }
            None => StatsTracker::new(),
        };

        let classifier = Classifier::from_parts(
            embedder.clone(),
            index.clone(),
            settings.index.collection.clone(),
            &settings.classification,
            Arc::new(tracker),
        );
        let loader = KnowledgeBaseLoader::new(
            embedder,
            index,
            settings.index.collection.clone(),
            settings.index.upsert_batch,
            settings.knowledge.enrich_for(settings.embedding.provider),
        );

        Ok(Self {
            classifier: Arc::new(classifier),
            loader: Arc::new(loader),
            stats_store,
        })
    }

    /// Write the counters back to the store, if one is open.
    async fn flush_stats(&self) {
        let Some(store) = &self.stats_store else {
            return;
        };
        match store.save(&self.classifier.stats_tracker().counters()).await {
            Ok(()) => info!("✓ Stats counters flushed"),
            Err(e) => warn!(error = %e, "Failed to flush stats counters"),
        }
    }
}

async fn run_ingest(services: &Services, dataset: KnowledgeDataset) -> Result<()> {
    let entries = dataset.entries();
    info!("📚 Ingesting {} knowledge entries...", entries.len());
    let report = services
        .loader
        .load(&entries)
        .await
        .context("Knowledge base ingestion failed")?;
    info!(
        "✓ Ingest completed: {}/{} entries in '{}'",
        report.written, report.total, report.collection
    );
    Ok(())
}

/// Seed the collection from the configured dataset when it is empty or
/// missing. Other index errors leave the service running degraded.
async fn seed_if_empty(services: &Services, settings: &Settings) -> Result<()> {
    let index = services.classifier.index();
    match index.count(services.classifier.collection()).await {
        Ok(0) | Err(IndexError::CollectionMissing(_)) => {
            info!("Collection is empty, seeding from the knowledge dataset");
            let dataset = KnowledgeDataset::load(&settings.knowledge)
                .context("Failed to load knowledge dataset")?;
            if let Err(e) = run_ingest(services, dataset).await {
                warn!("Seeding failed, classifications will answer UNKNOWN: {:#}", e);
            }
        }
        Ok(n) => info!("✓ Collection holds {} entries", n),
        Err(e) => warn!(error = %e, "Index not reachable, classifications will answer UNKNOWN"),
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Monitor spawned tasks until shutdown or the first failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the server finish in-flight requests
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            warn!("Task ended with error during shutdown: {}", e);
        }
    }

    Ok(())
}

async fn run_server(services: &Services, settings: &Settings, addr: String) -> Result<()> {
    seed_if_empty(services, settings).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🌐 HTTP API listening on http://{}", addr);

    let state = AppState::new(services.classifier.clone(), services.loader.clone())
        .with_max_input_chars(settings.embedding.max_input_chars);
    let app = create_app(state);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl+C received, shutting down...");
        shutdown_token.cancel();
    });

    let mut task_set = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    config::init(Settings::load());
    let settings = config::get();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  ♻️  Smart Recycle v{}", env!("CARGO_PKG_VERSION"));
    info!("  Retrieval-augmented waste classification");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "   top_k={} min_score={:.2} strategy={:?}",
        settings.classification.top_k,
        settings.classification.min_score,
        settings.classification.strategy
    );

    let services = Services::init(settings)?;

    let result = match args.command.unwrap_or(SubCommand::Serve { addr: None }) {
        SubCommand::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server.addr.clone());
            run_server(&services, settings, addr).await
        }
        SubCommand::Ingest { dataset } => {
            let dataset = match dataset {
                Some(path) => KnowledgeDataset::load_from_file(&path)
                    .with_context(|| format!("Failed to load dataset {}", path.display()))?,
                None => KnowledgeDataset::load(&settings.knowledge)
                    .context("Failed to load knowledge dataset")?,
            };
            run_ingest(&services, dataset).await
        }
        SubCommand::Chat => chat::run_chat(&services.classifier).await,
        SubCommand::Classify { text } => {
            let decision = services.classifier.classify(&text).await;
            let json = serde_json::to_string_pretty(&decision)
                .context("Failed to serialize decision")?;
            println!("{json}");
            Ok(())
        }
    };

    services.flush_stats().await;
    info!("Smart Recycle shutdown complete");
    result
}
