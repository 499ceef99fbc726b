//! Combine external and manual clusters into the caller-facing sites view

use navigator_api::{Cluster, ClusterKey, Site};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Merge external clusters with manual ones
///
/// External records are authoritative: a manual record sharing `(clusterName, site)`
/// with an external one is left out of the result. Sites and the clusters inside each
/// site are sorted by name.
pub fn merge(external: &[Cluster], manual: &[Cluster]) -> Vec<Site> {
    let external_keys: HashSet<ClusterKey> = external.iter().map(Cluster::key).collect();
    let mut by_site: BTreeMap<&str, Vec<Cluster>> = BTreeMap::new();
    let mut seen: HashSet<ClusterKey> = HashSet::with_capacity(external.len() + manual.len());

    for cluster in external {
        if seen.insert(cluster.key()) {
            by_site.entry(cluster.site.as_str()).or_default().push(cluster.clone());
        }
    }

    let mut suppressed = 0;
    for cluster in manual {
        let key = cluster.key();
        if external_keys.contains(&key) {
            suppressed += 1;
            continue;
        }
        if seen.insert(key) {
            by_site.entry(cluster.site.as_str()).or_default().push(cluster.clone());
        }
    }

    if suppressed > 0 {
        debug!("{} manual clusters hidden by external records", suppressed);
    }

    by_site
        .into_iter()
        .map(|(site, clusters)| Site::new(site, clusters))
        .collect()
}

/// Distinct site names, sorted
pub fn site_names(sites: &[Site]) -> Vec<String> {
    sites.iter().map(|s| s.site.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use navigator_api::{ClusterMetadata, ClusterSource};

    fn cluster(name: &str, site: &str, source: ClusterSource) -> Cluster {
        Cluster {
            id: match source {
                ClusterSource::External => Cluster::external_id(name, site),
                ClusterSource::Manual => format!("manual-{}-{}", name, site),
            },
            cluster_name: name.to_string(),
            site: site.to_string(),
            segments: vec!["10.0.0.0/24".to_string()],
            domain_name: "example.com".to_string(),
            console_url: Cluster::console_url_for(name, "example.com"),
            load_balancer_ip: None,
            source,
            created_at: Utc::now(),
            metadata: ClusterMetadata::default(),
        }
    }

    #[test]
    fn test_external_wins_on_shared_identity() {
        let external = vec![cluster("ocp4-roi", "site1", ClusterSource::External)];
        let manual = vec![cluster("ocp4-roi", "site1", ClusterSource::Manual)];

        let sites = merge(&external, &manual);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].cluster_count, 1);
        assert_eq!(sites[0].clusters[0].source, ClusterSource::External);
    }

    #[test]
    fn test_same_name_other_site_is_kept() {
        let external = vec![cluster("ocp4-roi", "site1", ClusterSource::External)];
        let manual = vec![cluster("ocp4-roi", "site2", ClusterSource::Manual)];

        let sites = merge(&external, &manual);
        assert_eq!(site_names(&sites), vec!["site1", "site2"]);
        assert_eq!(sites[1].clusters[0].source, ClusterSource::Manual);
    }

    #[test]
    fn test_output_is_sorted() {
        let external = vec![
            cluster("ocp4-zeta", "site-b", ClusterSource::External),
            cluster("ocp4-alpha", "site-b", ClusterSource::External),
        ];
        let manual = vec![
            cluster("ocp4-mid", "site-b", ClusterSource::Manual),
            cluster("ocp4-solo", "site-a", ClusterSource::Manual),
        ];

        let sites = merge(&external, &manual);
        assert_eq!(site_names(&sites), vec!["site-a", "site-b"]);
        let names: Vec<&str> = sites[1].clusters.iter().map(|c| c.cluster_name.as_str()).collect();
        assert_eq!(names, vec!["ocp4-alpha", "ocp4-mid", "ocp4-zeta"]);
        assert_eq!(sites[1].cluster_count, 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge(&[], &[]).is_empty());
    }
}
