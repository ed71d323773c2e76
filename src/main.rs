use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gazette::api;
use gazette::config::Config;
use gazette::ingest::{scheduler, Ingestor, RetryPolicy};
use gazette::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "gazette", about = "Personal news reader: RSS ingestion + HTTP API")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "gazette.toml")]
    config: PathBuf,

    /// Override the database path from the config file
    #[arg(long)]
    db: Option<String>,

    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(db_path) = args.db {
        config.database_path = db_path;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    if config.sources.is_empty() {
        tracing::warn!("No feed sources configured; only manual content will be served");
    }

    if args.reset_db && std::path::Path::new(&config.database_path).exists() {
        std::fs::remove_file(&config.database_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    // Schema is ensured exactly once, here — handles only exist after this
    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    tracing::info!(path = %config.database_path, "Database ready");

    let client = reqwest::Client::new();
    let ingestor = Arc::new(Ingestor::new(db.clone(), client, &config));

    if config.refresh_interval_minutes > 0 {
        let interval = Duration::from_secs(config.refresh_interval_minutes * 60);
        let retry = RetryPolicy {
            base_delay: Duration::from_secs(config.retry_base_delay_secs.max(1)),
            max_attempts: config.retry_max_attempts,
        };
        let _scheduler = scheduler::spawn(Arc::clone(&ingestor), interval, retry);
        tracing::info!(
            interval_minutes = config.refresh_interval_minutes,
            "Scheduled periodic ingestion"
        );
    } else {
        tracing::info!("Periodic ingestion disabled (refresh_interval_minutes = 0)");
    }

    let router = api::create_router(db, ingestor);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Serving HTTP API");

    axum::serve(listener, router)
        .await
        .context("HTTP server exited with error")?;

    Ok(())
}
