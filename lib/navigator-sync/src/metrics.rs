//! Prometheus metrics for sync cycles and DNS lookups

use anyhow::Result;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics collector for the sync engine
#[derive(Clone)]
pub struct SyncMetrics {
    /// Sync cycles started
    pub sync_attempts_total: Counter,
    /// Failed sync cycles by reason
    pub sync_failures_total: CounterVec,
    /// Duration of successful sync cycles in seconds
    pub sync_duration_seconds: Histogram,
    /// Unix timestamp of the last successful sync
    pub last_success_timestamp_seconds: Gauge,
    /// Clusters in the last committed external payload
    pub clusters_committed: IntGauge,
    /// DNS lookups by result
    pub dns_lookups_total: CounterVec,
    /// DNS lookup latency in seconds
    pub dns_lookup_duration_seconds: Histogram,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let sync_attempts_total = Counter::new("navigator_sync_attempts_total", "Total sync cycles started")?;

        let sync_failures_total = CounterVec::new(
            Opts::new("navigator_sync_failures_total", "Failed sync cycles by reason"),
            &["reason"],
        )?;

        let sync_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "navigator_sync_duration_seconds",
            "Duration of successful sync cycles in seconds",
        ))?;

        let last_success_timestamp_seconds = Gauge::new(
            "navigator_sync_last_success_timestamp_seconds",
            "Unix timestamp of the last successful sync",
        )?;

        let clusters_committed = IntGauge::new(
            "navigator_clusters_committed",
            "Clusters in the last committed external payload",
        )?;

        let dns_lookups_total = CounterVec::new(
            Opts::new("navigator_dns_lookups_total", "DNS lookups by result"),
            &["result"],
        )?;

        let dns_lookup_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("navigator_dns_lookup_duration_seconds", "DNS lookup latency in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(sync_attempts_total.clone()))?;
        registry.register(Box::new(sync_failures_total.clone()))?;
        registry.register(Box::new(sync_duration_seconds.clone()))?;
        registry.register(Box::new(last_success_timestamp_seconds.clone()))?;
        registry.register(Box::new(clusters_committed.clone()))?;
        registry.register(Box::new(dns_lookups_total.clone()))?;
        registry.register(Box::new(dns_lookup_duration_seconds.clone()))?;

        Ok(Self {
            sync_attempts_total,
            sync_failures_total,
            sync_duration_seconds,
            last_success_timestamp_seconds,
            clusters_committed,
            dns_lookups_total,
            dns_lookup_duration_seconds,
            registry,
        })
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
