//! listcat-sync - catalog sync daemon
//!
//! Restores the catalog snapshot, then keeps it fresh on a timer until
//! interrupted. `--once` runs a single full sync and exits.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use listcat_common::config::{self as common_config, TomlConfig};
use listcat_common::events::{CatalogEvent, EventBus};
use listcat_sync::config::SyncConfig;
use listcat_sync::CatalogContext;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for listcat-sync
#[derive(Parser, Debug)]
#[command(name = "listcat-sync")]
#[command(about = "Mirrors curated list pages into a local catalog cache")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the catalog snapshot
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Run one full sync and exit
    #[arg(long)]
    once: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: bootstrap config (CLI → env → TOML → defaults)
    let config_path = common_config::resolve_config_path(args.config.as_deref());
    let mut toml = common_config::load_toml_config(config_path.as_deref());

    init_tracing(&toml)?;

    info!("Starting listcat-sync");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    // Step 2: root folder
    let root_folder = common_config::resolve_root_folder(args.root_folder.as_deref(), &toml);
    common_config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Root folder: {}", root_folder.display());

    // Step 3: engine
    common_config::apply_env_overrides(&mut toml.sync);

    if args.write_config {
        let Some(path) = config_path else {
            anyhow::bail!("No config file location; pass --config or set LISTCAT_CONFIG");
        };
        toml.root_folder = Some(root_folder);
        common_config::write_toml_config(&toml, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let config = SyncConfig::from_toml(&toml, root_folder);
    info!(
        interval_secs = config.sync_interval.as_secs(),
        sources = config.sources.len(),
        fallback_lists = config.fallback_list_ids.len(),
        "Sync configuration resolved"
    );

    let event_bus = EventBus::new(100);
    let context = CatalogContext::with_http(config, event_bus.clone())
        .await
        .context("Failed to initialize catalog engine")?;

    if args.once {
        let outcome = context
            .catalog
            .sync_now(true)
            .await
            .into_result()
            .context("Sync failed")?;
        info!(?outcome, "Single sync finished");
        return Ok(());
    }

    // Step 4: scheduler until shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(log_events(event_bus, cancel.clone()));

    let scheduler = context.scheduler.clone();
    let scheduler_cancel = cancel.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    shutdown_signal().await;
    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the TOML level; a configured log file replaces stderr
fn init_tracing(toml: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml.logging.level));

    match &toml.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Mirror catalog events into the log
async fn log_events(event_bus: EventBus, cancel: CancellationToken) {
    let mut rx = event_bus.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(CatalogEvent::RevisionChanged { old_revision, new_revision, .. }) => {
                    info!(old_revision, new_revision, "Catalog revision changed");
                }
                Ok(event) => debug!(?event, "Catalog event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
