//! Operator-authored clusters
//!
//! Every mutation is one `LockedStore::update` call so the full read-modify-write runs
//! under a single exclusive lock acquisition, across threads and across replicas.

use crate::config::ClusterPolicy;
use crate::store::LockedStore;
use crate::validation::{validate_cluster_name, validate_segments, validate_site};
use crate::{CoreError, Result};
use chrono::Utc;
use navigator_api::{Cluster, ClusterMetadata, ClusterSource, ManualCollection, NewCluster};
use tracing::info;
use uuid::Uuid;

pub struct ManualClusters {
    store: LockedStore<ManualCollection>,
    policy: ClusterPolicy,
}

impl ManualClusters {
    pub fn new(store: LockedStore<ManualCollection>, policy: ClusterPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &LockedStore<ManualCollection> {
        &self.store
    }

    /// Create the empty document on first start so later reads never hit a missing file
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.store.initialize_if_missing()? {
            info!("Initialized manual cluster store at {}", self.store.path().display());
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Cluster>> {
        Ok(self.store.read()?.data.clusters)
    }

    pub fn get(&self, id: &str) -> Result<Cluster> {
        self.list()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()))
    }

    /// Validate and persist a new manual cluster
    pub fn create(&self, request: NewCluster) -> Result<Cluster> {
        self.insert(self.prepare(request)?)
    }

    /// Persist a cluster built by [`ManualClusters::prepare`]
    ///
    /// The duplicate check and the insert happen under the same lock, so two replicas
    /// adding the same `(clusterName, site)` cannot both succeed.
    pub fn insert(&self, cluster: Cluster) -> Result<Cluster> {
        let created = self.store.update(|collection: &mut ManualCollection| {
            if collection
                .clusters
                .iter()
                .any(|c| c.cluster_name == cluster.cluster_name && c.site == cluster.site)
            {
                return Err(CoreError::ClusterAlreadyExists {
                    name: cluster.cluster_name.clone(),
                    site: cluster.site.clone(),
                });
            }
            collection.clusters.push(cluster.clone());
            Ok(cluster)
        })?;

        info!(
            "Created manual cluster {} at {} with ID {}",
            created.cluster_name, created.site, created.id
        );
        Ok(created)
    }

    /// Remove a manual cluster by id, returning the removed record
    pub fn delete(&self, id: &str) -> Result<Cluster> {
        if id.starts_with("vlan-") {
            return Err(CoreError::ExternalClusterProtected(id.to_string()));
        }

        let removed = self.store.update(|collection: &mut ManualCollection| {
            let index = collection
                .clusters
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()))?;
            Ok::<_, CoreError>(collection.clusters.remove(index))
        })?;

        info!("Deleted manual cluster {} ({})", removed.cluster_name, id);
        Ok(removed)
    }

    /// Validate a request and build the normalized record without touching the store
    pub fn prepare(&self, request: NewCluster) -> Result<Cluster> {
        let cluster_name = validate_cluster_name(&request.cluster_name, &self.policy)?;
        let site = validate_site(&request.site)?;
        let segments = validate_segments(&request.segments)?;
        let domain_name = request
            .domain_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.policy.default_domain.clone());

        Ok(Cluster {
            id: Uuid::new_v4().to_string(),
            console_url: Cluster::console_url_for(&cluster_name, &domain_name),
            cluster_name,
            site,
            segments,
            domain_name,
            load_balancer_ip: request.load_balancer_ip,
            source: ClusterSource::Manual,
            created_at: Utc::now(),
            metadata: ClusterMetadata::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LockRetryPolicy;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manual(dir: &TempDir) -> ManualClusters {
        let retry = LockRetryPolicy {
            max_attempts: 50,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
        };
        ManualClusters::new(
            LockedStore::new(dir.path().join("manual_clusters.json"), retry),
            ClusterPolicy::default(),
        )
    }

    fn request(name: &str, site: &str) -> NewCluster {
        NewCluster {
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: vec!["10.10.0.0/24".to_string()],
            domain_name: None,
            load_balancer_ip: None,
        }
    }

    #[test]
    fn test_create_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let manual = manual(&dir);
        let cluster = manual.create(request("OCP4-Lab", "site1")).unwrap();

        assert_eq!(cluster.cluster_name, "ocp4-lab");
        assert_eq!(cluster.domain_name, "example.com");
        assert_eq!(cluster.source, ClusterSource::Manual);
        assert_eq!(
            cluster.console_url,
            "https://console-openshift-console.apps.ocp4-lab.example.com"
        );
        assert!(Uuid::parse_str(&cluster.id).is_ok());
        assert_eq!(manual.get(&cluster.id).unwrap(), cluster);
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let dir = TempDir::new().unwrap();
        let manual = manual(&dir);

        let err = manual.create(request("lab", "site1")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClusterName { .. }));

        let mut bad_segment = request("ocp4-lab", "site1");
        bad_segment.segments = vec!["192.168.1".to_string()];
        assert!(matches!(manual.create(bad_segment).unwrap_err(), CoreError::InvalidCidr { .. }));
        assert!(!manual.store().exists());
    }

    #[test]
    fn test_create_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        let manual = manual(&dir);
        manual.create(request("ocp4-lab", "site1")).unwrap();

        let err = manual.create(request("ocp4-lab", "site1")).unwrap_err();
        assert!(matches!(err, CoreError::ClusterAlreadyExists { .. }));
        manual.create(request("ocp4-lab", "site2")).unwrap();
        assert_eq!(manual.list().unwrap().len(), 2);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let manual = manual(&dir);
        let cluster = manual.create(request("ocp4-lab", "site1")).unwrap();

        assert_eq!(manual.delete(&cluster.id).unwrap().id, cluster.id);
        assert!(manual.list().unwrap().is_empty());
        assert!(matches!(manual.delete(&cluster.id), Err(CoreError::ClusterNotFound(_))));
        assert!(matches!(
            manual.delete("vlan-ocp4-roi@site1"),
            Err(CoreError::ExternalClusterProtected(_))
        ));
    }

    #[test]
    fn test_list_missing_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let manual = manual(&dir);
        assert!(matches!(manual.list(), Err(CoreError::Cache(_))));
        manual.ensure_initialized().unwrap();
        assert!(manual.list().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["ocp4-alpha", "ocp4-beta"]
            .into_iter()
            .map(|name| {
                // Separate store instances, as two replicas would have
                let manual = manual(&dir);
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    manual.create(request(name, "site1")).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut names: Vec<String> = manual(&dir)
            .list()
            .unwrap()
            .into_iter()
            .map(|c| c.cluster_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["ocp4-alpha", "ocp4-beta"]);
    }

    #[test]
    fn test_many_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manual = manual(&dir);
                thread::spawn(move || manual.create(request(&format!("ocp4-node{}", i), "site1")).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manual(&dir).list().unwrap().len(), 8);
    }
}
