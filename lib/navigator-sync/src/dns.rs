//! Load-balancer address resolution for clusters
//!
//! Each cluster's ingress hostname is built from a template and resolved as an A record
//! against the configured DNS server. Every lookup carries its own timeout and fails
//! on its own; a failure leaves the address unset and is counted, nothing more.

use crate::metrics::SyncMetrics;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hickory_resolver::config::{LookupIpStrategy, NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use navigator_api::{Cluster, DnsStats, Site};
use navigator_core::DnsConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, info};

/// Why a single lookup produced no address
#[derive(Clone, Debug, PartialEq)]
pub enum LookupFailure {
    Timeout,
    NotFound,
    Other(String),
}

impl std::fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupFailure::Timeout => f.write_str("timed out"),
            LookupFailure::NotFound => f.write_str("no A record"),
            LookupFailure::Other(e) => f.write_str(e),
        }
    }
}

/// Resolves a hostname to its addresses in response order
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupFailure>;
}

/// Lookup against one explicit name server using hickory
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        let name_servers = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], name_servers);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl AddressLookup for HickoryLookup {
    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupFailure> {
        match self.resolver.lookup_ip(hostname).await {
            Ok(answer) => Ok(answer.iter().collect()),
            Err(e) => Err(match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => LookupFailure::NotFound,
                ResolveErrorKind::Timeout => LookupFailure::Timeout,
                _ => LookupFailure::Other(e.to_string()),
            }),
        }
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_micros: AtomicU64,
}

/// Batched, timeout-bounded resolver with process-local statistics
pub struct DnsResolver {
    lookup: Arc<dyn AddressLookup>,
    template: String,
    timeout: Duration,
    concurrency: usize,
    counters: Counters,
    metrics: Option<SyncMetrics>,
}

impl DnsResolver {
    pub fn new(lookup: Arc<dyn AddressLookup>, config: &DnsConfig) -> Self {
        Self {
            lookup,
            template: config.resolution_path.clone(),
            timeout: config.timeout(),
            concurrency: config.concurrency.max(1),
            counters: Counters::default(),
            metrics: None,
        }
    }

    /// Resolver that talks to the configured DNS server
    pub fn from_config(config: &DnsConfig) -> navigator_core::Result<Self> {
        let lookup = HickoryLookup::new(config.server_addr()?, config.timeout());
        Ok(Self::new(Arc::new(lookup), config))
    }

    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Expand the hostname template for one cluster
    pub fn hostname_for(&self, cluster_name: &str, domain_name: &str) -> String {
        self.template
            .replace("{cluster_name}", cluster_name)
            .replace("{clusterName}", cluster_name)
            .replace("{domain_name}", domain_name)
            .replace("{domainName}", domain_name)
    }

    /// Resolve one cluster's address; `None` on timeout, NXDOMAIN or an empty answer
    pub async fn resolve(&self, cluster_name: &str, domain_name: &str) -> Option<IpAddr> {
        let hostname = self.hostname_for(cluster_name, domain_name);
        let started = Instant::now();

        let outcome = match time::timeout(self.timeout, self.lookup.lookup(&hostname)).await {
            Ok(Ok(addresses)) => addresses.into_iter().next().ok_or(LookupFailure::NotFound),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LookupFailure::Timeout),
        };

        let elapsed = started.elapsed();
        self.record(elapsed, outcome.is_ok());

        match outcome {
            Ok(address) => {
                debug!("Resolved {} to {} in {:?}", hostname, address, elapsed);
                Some(address)
            }
            Err(e) => {
                debug!("Failed to resolve {}: {}", hostname, e);
                None
            }
        }
    }

    /// Fill in missing addresses, preserving input order
    ///
    /// Clusters that already carry an address are passed through without a lookup.
    pub async fn resolve_batch(&self, clusters: Vec<Cluster>) -> Vec<Cluster> {
        let pending = clusters.iter().filter(|c| c.load_balancer_ip.is_none()).count();
        if pending == 0 {
            return clusters;
        }
        let started = Instant::now();

        let resolved: Vec<Cluster> = stream::iter(clusters)
            .map(|mut cluster| async move {
                if cluster.load_balancer_ip.is_none() {
                    cluster.load_balancer_ip = self.resolve(&cluster.cluster_name, &cluster.domain_name).await;
                }
                cluster
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        info!(
            "Resolved {} cluster addresses in {:?}",
            pending,
            started.elapsed()
        );
        resolved
    }

    /// Resolve every cluster of every site as one batch
    pub async fn resolve_sites(&self, sites: Vec<Site>) -> Vec<Site> {
        let mut layout = Vec::with_capacity(sites.len());
        let mut clusters = Vec::new();
        for site in sites {
            layout.push((site.site, site.clusters.len()));
            clusters.extend(site.clusters);
        }

        let mut resolved = self.resolve_batch(clusters).await.into_iter();
        layout
            .into_iter()
            .map(|(name, count)| Site::new(name, resolved.by_ref().take(count).collect()))
            .collect()
    }

    pub fn stats(&self) -> DnsStats {
        let request_count = self.counters.requests.load(Ordering::Relaxed);
        let total_time_seconds = self.counters.total_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        DnsStats {
            request_count,
            success_count: self.counters.successes.load(Ordering::Relaxed),
            failure_count: self.counters.failures.load(Ordering::Relaxed),
            total_time_seconds,
            average_time_seconds: if request_count > 0 {
                total_time_seconds / request_count as f64
            } else {
                0.0
            },
        }
    }

    pub fn reset_stats(&self) {
        self.counters.requests.store(0, Ordering::Relaxed);
        self.counters.successes.store(0, Ordering::Relaxed);
        self.counters.failures.store(0, Ordering::Relaxed);
        self.counters.total_micros.store(0, Ordering::Relaxed);
        info!("DNS statistics reset");
    }

    fn record(&self, elapsed: Duration, success: bool) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        self.counters
            .total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        let result = if success {
            self.counters.successes.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            "failure"
        };

        if let Some(metrics) = &self.metrics {
            metrics.dns_lookups_total.with_label_values(&[result]).inc();
            metrics.dns_lookup_duration_seconds.observe(elapsed.as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use navigator_api::{ClusterMetadata, ClusterSource};
    use std::collections::HashMap;

    /// Answers from a fixed table; unknown hosts are NXDOMAIN, hung hosts never answer
    struct FakeLookup {
        answers: HashMap<String, Option<Vec<IpAddr>>>,
        calls: AtomicU64,
    }

    impl FakeLookup {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
                calls: AtomicU64::new(0),
            }
        }

        fn answer(mut self, hostname: &str, ips: &[&str]) -> Self {
            let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
            self.answers.insert(hostname.to_string(), Some(ips));
            self
        }

        fn hang(mut self, hostname: &str) -> Self {
            self.answers.insert(hostname.to_string(), None);
            self
        }
    }

    #[async_trait]
    impl AddressLookup for FakeLookup {
        async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(hostname) {
                Some(Some(ips)) => Ok(ips.clone()),
                Some(None) => {
                    time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
                None => Err(LookupFailure::NotFound),
            }
        }
    }

    fn config() -> DnsConfig {
        DnsConfig {
            timeout_seconds: 0.2,
            ..Default::default()
        }
    }

    fn cluster(name: &str) -> Cluster {
        Cluster {
            id: Cluster::external_id(name, "site1"),
            cluster_name: name.to_string(),
            site: "site1".to_string(),
            segments: vec!["10.0.0.0/24".to_string()],
            domain_name: "example.com".to_string(),
            console_url: Cluster::console_url_for(name, "example.com"),
            load_balancer_ip: None,
            source: ClusterSource::External,
            created_at: Utc::now(),
            metadata: ClusterMetadata::default(),
        }
    }

    #[test]
    fn test_hostname_template() {
        let resolver = DnsResolver::new(Arc::new(FakeLookup::new()), &config());
        assert_eq!(resolver.hostname_for("ocp4-a", "example.com"), "ingress.ocp4-a.example.com");

        let camel = DnsResolver::new(
            Arc::new(FakeLookup::new()),
            &DnsConfig {
                resolution_path: "lb.{clusterName}.apps.{domainName}".to_string(),
                ..config()
            },
        );
        assert_eq!(camel.hostname_for("ocp4-a", "example.com"), "lb.ocp4-a.apps.example.com");
    }

    #[tokio::test]
    async fn test_first_answer_wins() {
        let lookup = FakeLookup::new().answer("ingress.ocp4-a.example.com", &["10.0.0.7", "10.0.0.8"]);
        let resolver = DnsResolver::new(Arc::new(lookup), &config());
        assert_eq!(
            resolver.resolve("ocp4-a", "example.com").await,
            Some("10.0.0.7".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_batch_with_one_timeout() {
        let lookup = FakeLookup::new()
            .answer("ingress.ocp4-a.example.com", &["10.0.0.1"])
            .answer("ingress.ocp4-b.example.com", &["10.0.0.2"])
            .hang("ingress.ocp4-c.example.com")
            .answer("ingress.ocp4-d.example.com", &["10.0.0.4"])
            .answer("ingress.ocp4-e.example.com", &["10.0.0.5"]);
        let resolver = DnsResolver::new(Arc::new(lookup), &config());
        let batch: Vec<Cluster> = ["ocp4-a", "ocp4-b", "ocp4-c", "ocp4-d", "ocp4-e"].into_iter().map(cluster).collect();

        let resolved = resolver.resolve_batch(batch).await;

        assert_eq!(resolved.len(), 5);
        let names: Vec<&str> = resolved.iter().map(|c| c.cluster_name.as_str()).collect();
        assert_eq!(names, vec!["ocp4-a", "ocp4-b", "ocp4-c", "ocp4-d", "ocp4-e"]);
        assert_eq!(resolved.iter().filter(|c| c.load_balancer_ip.is_some()).count(), 4);
        assert!(resolved[2].load_balancer_ip.is_none());

        let stats = resolver.stats();
        assert_eq!(stats.request_count, 5);
        assert_eq!(stats.success_count, 4);
        assert_eq!(stats.failure_count, 1);
        assert!(stats.average_time_seconds > 0.0);
    }

    #[tokio::test]
    async fn test_nxdomain_and_empty_answer_are_failures() {
        let lookup = FakeLookup::new().answer("ingress.ocp4-empty.example.com", &[]);
        let resolver = DnsResolver::new(Arc::new(lookup), &config());

        assert!(resolver.resolve("ocp4-missing", "example.com").await.is_none());
        assert!(resolver.resolve("ocp4-empty", "example.com").await.is_none());
        assert_eq!(resolver.stats().failure_count, 2);
    }

    #[tokio::test]
    async fn test_existing_addresses_are_not_looked_up() {
        let lookup = Arc::new(FakeLookup::new().answer("ingress.ocp4-b.example.com", &["10.0.0.2"]));
        let resolver = DnsResolver::new(lookup.clone(), &config());
        let mut known = cluster("ocp4-a");
        known.load_balancer_ip = Some("192.0.2.10".parse().unwrap());

        let resolved = resolver.resolve_batch(vec![known, cluster("ocp4-b")]).await;

        assert_eq!(resolved[0].load_balancer_ip, Some("192.0.2.10".parse().unwrap()));
        assert_eq!(resolved[1].load_balancer_ip, Some("10.0.0.2".parse().unwrap()));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_sites_keeps_grouping() {
        let lookup = FakeLookup::new()
            .answer("ingress.ocp4-a.example.com", &["10.0.0.1"])
            .answer("ingress.ocp4-c.example.com", &["10.0.0.3"]);
        let resolver = DnsResolver::new(Arc::new(lookup), &config());
        let sites = vec![
            Site::new("site1", vec![cluster("ocp4-a"), cluster("ocp4-b")]),
            Site::new("site2", vec![cluster("ocp4-c")]),
        ];

        let resolved = resolver.resolve_sites(sites).await;
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].cluster_count, 2);
        assert!(resolved[0].clusters[0].load_balancer_ip.is_some());
        assert!(resolved[0].clusters[1].load_balancer_ip.is_none());
        assert_eq!(resolved[1].clusters[0].load_balancer_ip, Some("10.0.0.3".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let resolver = DnsResolver::new(Arc::new(FakeLookup::new()), &config());
        resolver.resolve("ocp4-a", "example.com").await;
        assert_eq!(resolver.stats().request_count, 1);

        resolver.reset_stats();
        assert_eq!(resolver.stats(), DnsStats::default());
    }
}
