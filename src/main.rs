//! Report 5 service
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API (default subcommand)
//! report5 --db ./data/report5
//!
//! # In-memory store, nothing persisted
//! report5 --memory
//!
//! # Dump every record (zstd when the file ends in .zst)
//! report5 backup --out backup.json.zst
//!
//! # Load a backup, skipping records already present
//! report5 import --from backup.json.zst
//! ```
//!
//! # Environment Variables
//!
//! - `REPORT5_CONFIG`: Path to the TOML config (default: ./report5.toml)
//! - `REPORT5_ADDR`: Override the bind address
//! - `REPORT5_DB`: Override the sled database directory
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe the database on startup (for testing)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use report5::api::{create_app, ApiState};
use report5::config::{defaults, ReportConfig, StoreBackend};
use report5::storage::{import_records, read_backup, write_backup};
use report5::{InMemoryStore, LocalClock, SledStatusStore, StatusStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "report5")]
#[command(about = "Report 5 tank status service")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default from config: "0.0.0.0:8080")
    #[arg(short, long, env = "REPORT5_ADDR")]
    addr: Option<String>,

    /// Override the sled database directory
    #[arg(long, env = "REPORT5_DB")]
    db: Option<PathBuf>,

    /// Use the in-memory store regardless of config
    #[arg(long)]
    memory: bool,

    /// Config file (otherwise $REPORT5_CONFIG, then ./report5.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wipe the sled database directory on startup.
    /// WARNING: This is destructive and cannot be undone!
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP service (default)
    Serve,
    /// Write every record to a JSON backup
    Backup {
        #[arg(long)]
        out: PathBuf,
    },
    /// Load records from a JSON backup
    Import {
        #[arg(long = "from")]
        from: PathBuf,
    },
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if database reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

fn reset_data_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        info!(path = %path.display(), "Database directory does not exist, nothing to reset");
        return Ok(());
    }
    warn!(path = %path.display(), "RESET_DB requested, wiping status database");
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Startup
// ============================================================================

fn load_config(args: &CliArgs) -> Result<ReportConfig> {
    let mut config = match &args.config {
        Some(path) => ReportConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReportConfig::load(),
    };
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if let Some(db) = &args.db {
        config.store.path = db.clone();
    }
    if args.memory {
        config.store.backend = StoreBackend::Memory;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_store(config: &ReportConfig, reset: bool) -> Result<Arc<dyn StatusStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory status store (nothing is persisted)");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Sled => {
            let path = &config.store.path;
            if reset {
                reset_data_directory(path)?;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let store = SledStatusStore::open(path)
                .with_context(|| format!("Failed to open status store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

async fn serve(config: ReportConfig, store: Arc<dyn StatusStore>) -> Result<()> {
    let addr = config.server.addr.clone();
    let state = ApiState::new(store, Arc::new(config), Arc::new(LocalClock));
    let sessions = state.sessions.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(%addr, "HTTP server listening");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    // Periodic sweep of idle navigation sessions
    let sweep_token = cancel_token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(defaults::SESSION_SWEEP_SECS));
        loop {
            tokio::select! {
                _ = sweep_token.cancelled() => break,
                _ = interval.tick() => {
                    sessions.prune_idle().await;
                }
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await
        .context("HTTP server error")?;
    info!("Graceful shutdown complete");
    Ok(())
}

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
    let config = load_config(&args)?;
    info!(
        tanks = config.fleet.tanks.len(),
        backend = ?config.store.backend,
        "Report 5 starting"
    );

    let reset = should_reset_db(args.reset_db);
    let store = open_store(&config, reset)?;

    match args.command.unwrap_or(SubCommand::Serve) {
        SubCommand::Serve => {
            serve(config, store.clone()).await?;
            store.flush().context("Failed to flush status store")?;
            Ok(())
        }
        SubCommand::Backup { out } => {
            let records = store.all_records().await?;
            let bytes = write_backup(&out, &records)
                .with_context(|| format!("Failed to write backup {}", out.display()))?;
            info!(path = %out.display(), records = records.len(), bytes, "Backup complete");
            Ok(())
        }
        SubCommand::Import { from } => {
            let records = read_backup(&from)
                .with_context(|| format!("Failed to read backup {}", from.display()))?;
            let summary = import_records(store.as_ref(), records).await?;
            store.flush().context("Failed to flush status store")?;
            info!(imported = summary.imported, skipped = summary.skipped, "Import finished");
            Ok(())
        }
    }
}
