//! Versioned documents persisted by the locked cache store

use crate::Cluster;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current on-disk document version
pub const PAYLOAD_VERSION: u32 = 1;

/// Summary counts stored next to each collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStats {
    pub total_clusters: usize,
    pub total_sites: usize,
    pub total_segments: usize,
}

/// A logical collection that can be persisted as a cache payload
pub trait Collection: Serialize + DeserializeOwned + Default + Clone + Send + 'static {
    /// Derive the summary counts of this collection
    fn stats(&self) -> PayloadStats;
}

/// Clusters derived from the VLAN Manager plus the site list it reported
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalCollection {
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub sites: Vec<String>,
}

impl Collection for ExternalCollection {
    fn stats(&self) -> PayloadStats {
        PayloadStats {
            total_clusters: self.clusters.len(),
            total_sites: self.sites.len(),
            total_segments: self.clusters.iter().map(|c| c.segments.len()).sum(),
        }
    }
}

/// Clusters registered by operators
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualCollection {
    pub clusters: Vec<Cluster>,
}

impl Collection for ManualCollection {
    fn stats(&self) -> PayloadStats {
        let sites: BTreeSet<&str> = self.clusters.iter().map(|c| c.site.as_str()).collect();
        PayloadStats {
            total_clusters: self.clusters.len(),
            total_sites: sites.len(),
            total_segments: self.clusters.iter().map(|c| c.segments.len()).sum(),
        }
    }
}

/// The JSON document found on disk for one collection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePayload<T> {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    pub stats: PayloadStats,
    pub data: T,
}

impl<T: Collection> CachePayload<T> {
    /// Wrap a collection, stamping it with the current time and its counts
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    pub fn at(data: T, last_updated: DateTime<Utc>) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            last_updated,
            stats: data.stats(),
            data,
        }
    }

    /// Age of the document in minutes relative to `now`
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_updated).num_milliseconds() as f64 / 60_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterMetadata, ClusterSource};

    fn cluster(name: &str, site: &str, segments: &[&str]) -> Cluster {
        Cluster {
            id: Cluster::external_id(name, site),
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            domain_name: "example.com".to_string(),
            console_url: Cluster::console_url_for(name, "example.com"),
            load_balancer_ip: None,
            source: ClusterSource::External,
            created_at: Utc::now(),
            metadata: ClusterMetadata::default(),
        }
    }

    #[test]
    fn test_external_stats() {
        let collection = ExternalCollection {
            clusters: vec![
                cluster("ocp4-a", "s1", &["10.0.0.0/24", "10.0.1.0/24"]),
                cluster("ocp4-b", "s2", &["10.0.2.0/24"]),
            ],
            sites: vec!["s1".into(), "s2".into(), "s3".into()],
        };
        let stats = collection.stats();
        assert_eq!(stats.total_clusters, 2);
        assert_eq!(stats.total_sites, 3);
        assert_eq!(stats.total_segments, 3);
    }

    #[test]
    fn test_manual_stats_counts_distinct_sites() {
        let collection = ManualCollection {
            clusters: vec![
                cluster("ocp4-a", "s1", &["10.0.0.0/24"]),
                cluster("ocp4-b", "s1", &["10.0.1.0/24"]),
            ],
        };
        assert_eq!(collection.stats().total_sites, 1);
    }

    #[test]
    fn test_payload_document_shape() {
        let payload = CachePayload::new(ManualCollection::default());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["version"], PAYLOAD_VERSION);
        assert!(value["lastUpdated"].is_string());
        assert_eq!(value["stats"]["totalClusters"], 0);
        assert!(value["data"]["clusters"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_age_minutes() {
        let now = Utc::now();
        let payload = CachePayload::at(ManualCollection::default(), now - chrono::Duration::minutes(90));
        let age = payload.age_minutes(now);
        assert!((age - 90.0).abs() < 0.01);
    }
}
