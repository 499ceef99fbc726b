//! Per-site aggregates handed to callers

use crate::Cluster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A site and the clusters deployed there, sorted by cluster name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub site: String,
    pub cluster_count: usize,
    pub clusters: Vec<Cluster>,
}

impl Site {
    pub fn new(site: impl Into<String>, mut clusters: Vec<Cluster>) -> Self {
        clusters.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
        Self {
            site: site.into(),
            cluster_count: clusters.len(),
            clusters,
        }
    }
}

/// Inventory-wide statistics computed from the merged sites view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_clusters: usize,
    pub total_sites: usize,
    pub total_segments: usize,
    pub average_segments_per_cluster: f64,
    pub clusters_per_site: BTreeMap<String, usize>,
    pub segments_per_site: BTreeMap<String, usize>,
    pub domain_distribution: BTreeMap<String, usize>,
    pub source_distribution: BTreeMap<String, usize>,
    /// Number of clusters keyed by how many segments they own
    pub segments_count_distribution: BTreeMap<usize, usize>,
}
