//! Periodic VLAN Manager synchronization
//!
//! One cycle fetches segments, transforms them and commits the external payload. Any
//! failure before the commit completes leaves the cache file untouched, so readers keep
//! serving the last good payload while its age grows.

use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use chrono::{DateTime, Utc};
use navigator_api::{CachePayload, ExternalCollection, SyncPhase, SyncReport, SyncStatus};
use navigator_core::{LockedStore, VlanManagerConfig};
use navigator_vlan::{SegmentSource, Transformer};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, Default)]
struct SyncState {
    last_sync_time: Option<DateTime<Utc>>,
    last_attempt_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
    last_report: Option<SyncReport>,
}

pub struct SyncOrchestrator {
    source: Arc<dyn SegmentSource>,
    transformer: Transformer,
    store: Arc<LockedStore<ExternalCollection>>,
    interval: Duration,
    phase: AtomicU32,
    running: AtomicBool,
    in_flight: Mutex<()>,
    state: RwLock<SyncState>,
    metrics: Option<SyncMetrics>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn SegmentSource>,
        transformer: Transformer,
        store: Arc<LockedStore<ExternalCollection>>,
        config: &VlanManagerConfig,
    ) -> Self {
        Self {
            source,
            transformer,
            store,
            interval: config.sync_interval(),
            phase: AtomicU32::new(SyncPhase::Idle as u32),
            running: AtomicBool::new(false),
            in_flight: Mutex::new(()),
            state: RwLock::new(SyncState::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_u32(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.store(phase as u32, Ordering::SeqCst);
    }

    /// Run one cycle now
    ///
    /// Fails with `SyncInProgress` when another cycle of this process is running.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let _cycle = self.in_flight.try_lock().map_err(|_| SyncError::SyncInProgress)?;

        let started = Instant::now();
        let attempted_at = Utc::now();
        self.state.write().await.last_attempt_time = Some(attempted_at);
        if let Some(metrics) = &self.metrics {
            metrics.sync_attempts_total.inc();
        }

        match self.run_cycle(attempted_at, started).await {
            Ok(report) => {
                self.set_phase(SyncPhase::Idle);
                let mut state = self.state.write().await;
                state.last_sync_time = Some(report.synced_at);
                state.last_error = None;
                state.consecutive_failures = 0;
                state.last_report = Some(report.clone());
                drop(state);

                if let Some(metrics) = &self.metrics {
                    metrics.sync_duration_seconds.observe(started.elapsed().as_secs_f64());
                    metrics
                        .last_success_timestamp_seconds
                        .set(report.synced_at.timestamp() as f64);
                    metrics.clusters_committed.set(report.total_clusters as i64);
                }
                Ok(report)
            }
            Err(e) => {
                self.set_phase(SyncPhase::Degraded);
                let mut state = self.state.write().await;
                state.last_error = Some(e.to_string());
                state.consecutive_failures += 1;
                drop(state);

                if let Some(metrics) = &self.metrics {
                    metrics.sync_failures_total.with_label_values(&[e.reason()]).inc();
                }
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, synced_at: DateTime<Utc>, started: Instant) -> Result<SyncReport, SyncError> {
        self.set_phase(SyncPhase::Fetching);
        let segments = self.source.fetch_segments().await?;
        if segments.is_empty() {
            return Err(SyncError::EmptyResponse);
        }
        let sites = match self.source.fetch_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!("Failed to fetch sites, deriving them from segments: {}", e);
                Vec::new()
            }
        };

        self.set_phase(SyncPhase::Transforming);
        let output = self.transformer.transform(&segments, sites, synced_at);
        let payload = CachePayload::at(output.collection, synced_at);
        let stats = payload.stats;

        self.set_phase(SyncPhase::Committing);
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.write(&payload)).await??;

        Ok(SyncReport {
            synced_at,
            total_clusters: stats.total_clusters,
            total_sites: stats.total_sites,
            total_segments: stats.total_segments,
            rejected: output.rejected,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Timer-driven cycle; an overlapping tick is skipped
    async fn tick(&self) {
        match self.sync_once().await {
            Ok(report) => info!(
                "VLAN sync completed: {} clusters across {} sites ({} segments, {} rejected) in {}ms",
                report.total_clusters,
                report.total_sites,
                report.total_segments,
                report.rejected,
                report.duration_ms
            ),
            Err(SyncError::SyncInProgress) => debug!("Sync already running, skipping tick"),
            Err(e) => error!("VLAN sync failed, serving cached data: {}", e),
        }
    }

    /// Sync at start-up, then every interval until `shutdown` flips to true
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Starting VLAN sync loop against {} every {:?}",
            self.source.endpoint(),
            self.interval
        );

        self.tick().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("VLAN sync loop stopped");
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.read().await.clone();
        let store = self.store.clone();
        let cache = tokio::task::spawn_blocking(move || store.read()).await;

        let now = Utc::now();
        let (cache_last_updated, cache_age_minutes) = match cache {
            Ok(Ok(payload)) => (
                Some(payload.last_updated),
                Some((payload.age_minutes(now) * 100.0).round() / 100.0),
            ),
            Ok(Err(e)) => {
                if !e.is_missing() {
                    warn!("Cache unreadable while building sync status: {}", e);
                }
                (None, None)
            }
            Err(e) => {
                warn!("Cache status task failed: {}", e);
                (None, None)
            }
        };

        SyncStatus {
            service_running: self.running.load(Ordering::SeqCst),
            phase: self.phase(),
            synchronized: cache_last_updated.is_some(),
            sync_interval_seconds: self.interval.as_secs(),
            vlan_manager_url: self.source.endpoint().to_string(),
            last_sync_time: state.last_sync_time,
            last_attempt_time: state.last_attempt_time,
            last_error: state.last_error,
            consecutive_failures: state.consecutive_failures,
            cache_exists: self.store.exists(),
            cache_last_updated,
            cache_age_minutes,
            last_report: state.last_report,
        }
    }
}
