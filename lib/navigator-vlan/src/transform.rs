//! Turn raw VLAN Manager segments into validated cluster records

use chrono::{DateTime, Utc};
use navigator_api::{Cluster, ClusterMetadata, ClusterSource, ExternalCollection, Segment};
use navigator_core::validation::{validate_cidr, validate_cluster_name};
use navigator_core::ClusterPolicy;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Result of one transform pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformOutput {
    pub collection: ExternalCollection,
    /// Name/segment pairs dropped by validation
    pub rejected: usize,
    /// Segments ignored because they were released or unassigned
    pub skipped: usize,
}

pub struct Transformer {
    policy: ClusterPolicy,
}

impl Transformer {
    pub fn new(policy: ClusterPolicy) -> Self {
        Self { policy }
    }

    /// Build the external collection from a batch of segments
    ///
    /// Invalid records are logged and excluded; they never fail the batch. A segment
    /// listing several comma-separated names is replicated into each cluster. Clusters
    /// are keyed by `(site, clusterName)` and come out sorted that way. When the site
    /// list is empty, sites are taken from the clusters.
    pub fn transform(
        &self,
        segments: &[Segment],
        sites: Vec<String>,
        synced_at: DateTime<Utc>,
    ) -> TransformOutput {
        let mut clusters: BTreeMap<(String, String), Cluster> = BTreeMap::new();
        let mut rejected = 0;
        let mut skipped = 0;

        for segment in segments {
            if segment.released {
                skipped += 1;
                continue;
            }
            let (Some(site), Some(cidr)) = (
                segment.site.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                segment.segment.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            ) else {
                skipped += 1;
                continue;
            };
            let names = segment.cluster_names();
            if names.is_empty() {
                skipped += 1;
                continue;
            }

            if let Err(e) = validate_cidr(cidr) {
                warn!("Dropping segment at {}: {}", site, e);
                rejected += names.len();
                continue;
            }

            for raw_name in names {
                let name = match validate_cluster_name(raw_name, &self.policy) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("Dropping cluster at {}: {}", site, e);
                        rejected += 1;
                        continue;
                    }
                };

                let cluster = clusters
                    .entry((site.to_string(), name.clone()))
                    .or_insert_with(|| self.new_cluster(&name, site, synced_at));
                cluster.add_segment(cidr);
                cluster.metadata.absorb(
                    segment.vlan_id.as_deref(),
                    segment.epg_name.as_deref(),
                    segment.vrf.as_deref(),
                );
            }
        }

        let clusters: Vec<Cluster> = clusters.into_values().collect();
        let mut sites: Vec<String> = if sites.is_empty() {
            clusters.iter().map(|c| c.site.clone()).collect()
        } else {
            sites.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        };
        sites.sort();
        sites.dedup();

        debug!(
            "Transformed {} segments into {} clusters ({} rejected, {} skipped)",
            segments.len(),
            clusters.len(),
            rejected,
            skipped
        );

        TransformOutput {
            collection: ExternalCollection { clusters, sites },
            rejected,
            skipped,
        }
    }

    fn new_cluster(&self, name: &str, site: &str, synced_at: DateTime<Utc>) -> Cluster {
        let domain = &self.policy.default_domain;
        Cluster {
            id: Cluster::external_id(name, site),
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: Vec::new(),
            domain_name: domain.clone(),
            console_url: Cluster::console_url_for(name, domain),
            load_balancer_ip: None,
            source: ClusterSource::External,
            created_at: synced_at,
            metadata: ClusterMetadata::default(),
        }
    }
}
