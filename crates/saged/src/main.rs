//! Sage Daemon - progress and puzzle scoring service
//!
//! Serves the content catalog and records learner progress over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sage_common::{InMemoryCatalog, JsonDirLedgerStore, JsonlAttemptLog, ProgressEngine};
use saged::config::SagedConfig;
use saged::server::{self, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saged")]
#[command(about = "Sage daemon - learning progress and puzzle scoring", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (overrides $SAGED_CONFIG and defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:7870
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = SagedConfig::load(args.config.as_deref())?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("[BOOT] Sage daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let catalog_path = config.storage.catalog_path();
    let catalog = if catalog_path.exists() {
        InMemoryCatalog::load(&catalog_path)
            .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?
    } else {
        warn!(
            "[BOOT] No catalog at {}, serving an empty catalog",
            catalog_path.display()
        );
        InMemoryCatalog::default()
    };

    let data_dir = &config.storage.data_dir;
    let ledgers = JsonDirLedgerStore::new(data_dir)
        .with_context(|| format!("Failed to open ledger store in {}", data_dir.display()))?;
    let attempts = JsonlAttemptLog::new(data_dir);
    info!("[BOOT] Storage ready in {}", data_dir.display());

    let engine = ProgressEngine::new(
        Arc::new(catalog),
        Arc::new(ledgers),
        Arc::new(attempts),
        config.engine_config(),
    );

    let listen = args.listen.unwrap_or_else(|| config.server.listen_addr.clone());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", listen))?;

    server::run(AppState::new(engine), addr).await
}
