//! Read paths and operator mutations over the two cluster collections
//!
//! Store calls block on file locks, so every one of them runs on the blocking pool.

use crate::dns::DnsResolver;
use crate::error::SyncError;
use navigator_api::{Cluster, ExternalCollection, NewCluster, Site, Statistics};
use navigator_core::{merge, statistics, CacheError, CoreError, LockedStore, ManualClusters};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

pub struct Inventory {
    external: Arc<LockedStore<ExternalCollection>>,
    manual: Arc<ManualClusters>,
    dns: Arc<DnsResolver>,
}

impl Inventory {
    pub fn new(
        external: Arc<LockedStore<ExternalCollection>>,
        manual: Arc<ManualClusters>,
        dns: Arc<DnsResolver>,
    ) -> Self {
        Self { external, manual, dns }
    }

    pub fn dns(&self) -> &DnsResolver {
        &self.dns
    }

    /// Create the manual document if this is the first replica to start
    pub async fn initialize(&self) -> Result<(), SyncError> {
        let manual = self.manual.clone();
        spawn_blocking(move || manual.ensure_initialized()).await??;
        Ok(())
    }

    async fn external_clusters(&self) -> Result<Vec<Cluster>, SyncError> {
        let store = self.external.clone();
        match spawn_blocking(move || store.read()).await? {
            Ok(payload) => Ok(payload.data.clusters),
            Err(CacheError::Missing { .. }) => Err(CoreError::NotYetSynchronized.into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn manual_clusters(&self) -> Result<Vec<Cluster>, SyncError> {
        let manual = self.manual.clone();
        Ok(spawn_blocking(move || manual.list()).await??)
    }

    /// Merged sites view, optionally with load-balancer addresses resolved
    ///
    /// Fails with `NotYetSynchronized` until some replica has committed an external
    /// payload, and with a cache error when either document cannot be read.
    pub async fn sites(&self, resolve: bool) -> Result<Vec<Site>, SyncError> {
        let external = self.external_clusters().await?;
        let manual = self.manual_clusters().await?;
        let sites = merge(&external, &manual);
        debug!(
            "Merged {} external and {} manual clusters into {} sites",
            external.len(),
            manual.len(),
            sites.len()
        );

        if resolve {
            Ok(self.dns.resolve_sites(sites).await)
        } else {
            Ok(sites)
        }
    }

    pub async fn site_names(&self) -> Result<Vec<String>, SyncError> {
        Ok(navigator_core::merge::site_names(&self.sites(false).await?))
    }

    pub async fn statistics(&self) -> Result<Statistics, SyncError> {
        Ok(statistics(&self.sites(false).await?))
    }

    pub async fn list_manual(&self) -> Result<Vec<Cluster>, SyncError> {
        self.manual_clusters().await
    }

    /// Look a cluster up by id in the collection its id belongs to
    pub async fn get_cluster(&self, id: &str) -> Result<Cluster, SyncError> {
        if id.starts_with("vlan-") {
            return self
                .external_clusters()
                .await?
                .into_iter()
                .find(|c| c.id == id)
                .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()).into());
        }
        let manual = self.manual.clone();
        let id = id.to_string();
        Ok(spawn_blocking(move || manual.get(&id)).await??)
    }

    /// Create a manual cluster, resolving its address first when none was given
    ///
    /// Only a request that passed validation is ever looked up.
    pub async fn create_manual(&self, request: NewCluster) -> Result<Cluster, SyncError> {
        let mut cluster = self.manual.prepare(request)?;
        if cluster.load_balancer_ip.is_none() {
            cluster.load_balancer_ip = self.dns.resolve(&cluster.cluster_name, &cluster.domain_name).await;
            if let Some(ip) = cluster.load_balancer_ip {
                info!("Resolved load balancer {} for new cluster {}", ip, cluster.cluster_name);
            }
        }

        let manual = self.manual.clone();
        Ok(spawn_blocking(move || manual.insert(cluster)).await??)
    }

    pub async fn delete_manual(&self, id: &str) -> Result<Cluster, SyncError> {
        let manual = self.manual.clone();
        let id = id.to_string();
        Ok(spawn_blocking(move || manual.delete(&id)).await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{AddressLookup, LookupFailure};
    use async_trait::async_trait;
    use chrono::Utc;
    use navigator_api::{CachePayload, ClusterMetadata, ClusterSource};
    use navigator_core::{ClusterPolicy, DnsConfig, LockRetryPolicy};
    use std::net::IpAddr;
    use tempfile::TempDir;

    struct StaticLookup;

    #[async_trait]
    impl AddressLookup for StaticLookup {
        async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupFailure> {
            if hostname.contains("ocp4-a") {
                Ok(vec!["10.0.0.1".parse().unwrap()])
            } else {
                Err(LookupFailure::NotFound)
            }
        }
    }

    fn external_cluster(name: &str, site: &str) -> Cluster {
        Cluster {
            id: Cluster::external_id(name, site),
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: vec!["10.1.0.0/24".to_string()],
            domain_name: "example.com".to_string(),
            console_url: Cluster::console_url_for(name, "example.com"),
            load_balancer_ip: None,
            source: ClusterSource::External,
            created_at: Utc::now(),
            metadata: ClusterMetadata::default(),
        }
    }

    fn inventory(dir: &TempDir) -> Inventory {
        let external = LockedStore::new(dir.path().join("vlan_cache.json"), LockRetryPolicy::default());
        let manual = ManualClusters::new(
            LockedStore::new(dir.path().join("manual_clusters.json"), LockRetryPolicy::default()),
            ClusterPolicy::default(),
        );
        let dns = DnsResolver::new(Arc::new(StaticLookup), &DnsConfig::default());
        Inventory::new(Arc::new(external), Arc::new(manual), Arc::new(dns))
    }

    fn commit_external(dir: &TempDir, clusters: Vec<Cluster>) {
        let store: LockedStore<ExternalCollection> =
            LockedStore::new(dir.path().join("vlan_cache.json"), LockRetryPolicy::default());
        store
            .write(&CachePayload::new(ExternalCollection {
                clusters,
                sites: vec!["S1".to_string()],
            }))
            .unwrap();
    }

    fn request(name: &str, site: &str) -> NewCluster {
        NewCluster {
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: vec!["10.9.0.0/24".to_string()],
            domain_name: None,
            load_balancer_ip: None,
        }
    }

    #[tokio::test]
    async fn test_sites_before_first_sync() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();

        let err = inventory.sites(false).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::NotYetSynchronized)));
    }

    #[tokio::test]
    async fn test_corrupt_cache_surfaces_error() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();
        std::fs::write(dir.path().join("vlan_cache.json"), b"{ truncated").unwrap();

        let err = inventory.sites(false).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::Cache(CacheError::Read { .. }))));
    }

    #[tokio::test]
    async fn test_merged_view_prefers_external() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();
        inventory.create_manual(request("ocp4-a", "S1")).await.unwrap();
        inventory.create_manual(request("ocp4-lab", "S2")).await.unwrap();
        commit_external(&dir, vec![external_cluster("ocp4-a", "S1")]);

        let sites = inventory.sites(true).await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].clusters.len(), 1);
        assert_eq!(sites[0].clusters[0].source, ClusterSource::External);
        assert_eq!(sites[0].clusters[0].load_balancer_ip, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(sites[1].clusters[0].source, ClusterSource::Manual);

        assert_eq!(inventory.site_names().await.unwrap(), vec!["S1", "S2"]);
        let stats = inventory.statistics().await.unwrap();
        assert_eq!(stats.total_clusters, 2);
        assert_eq!(stats.source_distribution["manual"], 1);
    }

    #[tokio::test]
    async fn test_create_resolves_address_when_missing() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();

        let resolved = inventory.create_manual(request("OCP4-A", "S9")).await.unwrap();
        assert_eq!(resolved.load_balancer_ip, Some("10.0.0.1".parse().unwrap()));

        let unresolved = inventory.create_manual(request("ocp4-z", "S9")).await.unwrap();
        assert!(unresolved.load_balancer_ip.is_none());
        assert_eq!(inventory.dns().stats().request_count, 2);

        let mut supplied = request("ocp4-y", "S9");
        supplied.load_balancer_ip = Some("192.0.2.1".parse().unwrap());
        let supplied = inventory.create_manual(supplied).await.unwrap();
        assert_eq!(supplied.load_balancer_ip, Some("192.0.2.1".parse().unwrap()));
        assert_eq!(inventory.dns().stats().request_count, 2);
    }

    #[tokio::test]
    async fn test_invalid_create_never_reaches_dns() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();

        let mut bad_name = request("evil.attacker.example/x", "S1");
        bad_name.domain_name = Some("internal.corp".to_string());
        let err = inventory.create_manual(bad_name).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::InvalidClusterName { .. })));

        let mut bad_segment = request("ocp4-a", "S1");
        bad_segment.segments = vec!["192.168.1".to_string()];
        let err = inventory.create_manual(bad_segment).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::InvalidCidr { .. })));

        let stats = inventory.dns().stats();
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.failure_count, 0);
        assert!(inventory.list_manual().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let dir = TempDir::new().unwrap();
        let inventory = inventory(&dir);
        inventory.initialize().await.unwrap();
        commit_external(&dir, vec![external_cluster("ocp4-ext", "S1")]);
        let created = inventory.create_manual(request("ocp4-lab", "S1")).await.unwrap();

        assert_eq!(inventory.get_cluster(&created.id).await.unwrap().id, created.id);
        assert_eq!(
            inventory.get_cluster("vlan-ocp4-ext@S1").await.unwrap().cluster_name,
            "ocp4-ext"
        );
        assert!(matches!(
            inventory.delete_manual("vlan-ocp4-ext@S1").await,
            Err(SyncError::Core(CoreError::ExternalClusterProtected(_)))
        ));

        inventory.delete_manual(&created.id).await.unwrap();
        assert!(inventory.list_manual().await.unwrap().is_empty());
        assert!(matches!(
            inventory.get_cluster(&created.id).await,
            Err(SyncError::Core(CoreError::ClusterNotFound(_)))
        ));
    }
}
