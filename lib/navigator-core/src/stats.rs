//! Inventory statistics over the merged sites view

use navigator_api::{Site, Statistics};

pub fn statistics(sites: &[Site]) -> Statistics {
    let mut stats = Statistics {
        total_sites: sites.len(),
        ..Default::default()
    };

    for site in sites {
        let site_segments: usize = site.clusters.iter().map(|c| c.segments.len()).sum();
        stats.clusters_per_site.insert(site.site.clone(), site.cluster_count);
        stats.segments_per_site.insert(site.site.clone(), site_segments);
        stats.total_clusters += site.cluster_count;
        stats.total_segments += site_segments;

        for cluster in &site.clusters {
            *stats
                .domain_distribution
                .entry(cluster.domain_name.clone())
                .or_insert(0) += 1;
            *stats
                .source_distribution
                .entry(cluster.source.to_string())
                .or_insert(0) += 1;
            *stats
                .segments_count_distribution
                .entry(cluster.segments.len())
                .or_insert(0) += 1;
        }
    }

    if stats.total_clusters > 0 {
        let average = stats.total_segments as f64 / stats.total_clusters as f64;
        stats.average_segments_per_cluster = (average * 100.0).round() / 100.0;
    }
    stats
}
