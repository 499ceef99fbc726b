use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use navigator_core::{Config, LockRetryPolicy, LockedStore, LogFormat, ManualClusters};
use navigator_sync::{DnsResolver, Inventory, SyncMetrics, SyncOrchestrator};
use navigator_vlan::{Transformer, VlanClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod handlers;
mod router;

use handlers::{handle_request, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!("Starting navigator-server...");
    info!("  - VLAN Manager: {}", config.vlan_manager.url);
    info!("  - Sync interval: {}s", config.vlan_manager.sync_interval_seconds);
    info!("  - DNS server: {} (timeout {}s)", config.dns.server, config.dns.timeout_seconds);
    info!("  - Cache directory: {}", config.cache.directory.display());

    let metrics = SyncMetrics::new()?;
    info!("Metrics collector initialized");

    let retry = LockRetryPolicy::from_config(&config.cache);
    let external = Arc::new(LockedStore::new(config.cache.external_path(), retry.clone()));
    let manual = Arc::new(ManualClusters::new(
        LockedStore::new(config.cache.manual_path(), retry),
        config.clusters.clone(),
    ));

    let dns = Arc::new(DnsResolver::from_config(&config.dns)?.with_metrics(metrics.clone()));
    let inventory = Inventory::new(external.clone(), manual, dns);
    inventory.initialize().await?;
    info!("Cluster stores initialized");

    let client = VlanClient::new(&config.vlan_manager)?;
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            Arc::new(client),
            Transformer::new(config.clusters.clone()),
            external,
            &config.vlan_manager,
        )
        .with_metrics(metrics.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_task = tokio::spawn(orchestrator.clone().run(shutdown_rx));

    let state = Arc::new(AppState {
        inventory,
        orchestrator,
        metrics,
    });

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .with_context(|| format!("invalid server address '{}'", config.server.address))?;
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    tokio::select! {
        result = accept_connections(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = sync_task.await {
        warn!("Sync task ended abnormally: {}", e);
    }
    info!("navigator-server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn accept_connections(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}
