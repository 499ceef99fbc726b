//! Headless VLAN Manager sync daemon
//!
//! Runs the sync loop without the HTTP API, for replicas that only keep the shared
//! cache fresh. `--once` runs a single cycle and exits non-zero on failure.

use anyhow::{Context, Result};
use navigator_core::{Config, LockRetryPolicy, LockedStore, LogFormat};
use navigator_sync::{SyncMetrics, SyncOrchestrator};
use navigator_vlan::{Transformer, VlanClient};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!("Starting vlan-sync daemon...");

    let store = Arc::new(LockedStore::new(
        config.cache.external_path(),
        LockRetryPolicy::from_config(&config.cache),
    ));
    let client = VlanClient::new(&config.vlan_manager)?;
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            Arc::new(client),
            Transformer::new(config.clusters.clone()),
            store,
            &config.vlan_manager,
        )
        .with_metrics(SyncMetrics::new()?),
    );

    if once {
        return match orchestrator.sync_once().await {
            Ok(report) => {
                info!(
                    "Synchronized {} clusters across {} sites ({} rejected)",
                    report.total_clusters, report.total_sites, report.rejected
                );
                Ok(())
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                Err(e.into())
            }
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_task = tokio::spawn(orchestrator.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    sync_task.await?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
