//! Cluster records and the operator request used to create manual clusters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Where a cluster record came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterSource {
    /// Derived from VLAN Manager segments on every successful sync
    #[serde(rename = "vlan-manager", alias = "external")]
    External,
    /// Authored by an operator
    #[serde(rename = "manual")]
    Manual,
}

impl ClusterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterSource::External => "vlan-manager",
            ClusterSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ClusterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a cluster across both collections: `(clusterName, site)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub cluster_name: String,
    pub site: String,
}

impl ClusterKey {
    pub fn new(cluster_name: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            site: site.into(),
        }
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.cluster_name, self.site)
    }
}

/// Extra attributes collected from the VLAN Manager segments of a cluster
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    #[serde(default)]
    pub vlan_ids: Vec<String>,
    #[serde(default)]
    pub epg_names: Vec<String>,
    #[serde(default)]
    pub vrfs: Vec<String>,
}

impl ClusterMetadata {
    pub fn is_empty(&self) -> bool {
        self.vlan_ids.is_empty() && self.epg_names.is_empty() && self.vrfs.is_empty()
    }

    /// Record the attributes of one more segment, skipping values already present
    pub fn absorb(&mut self, vlan_id: Option<&str>, epg_name: Option<&str>, vrf: Option<&str>) {
        push_unique(&mut self.vlan_ids, vlan_id);
        push_unique(&mut self.epg_names, epg_name);
        push_unique(&mut self.vrfs, vrf);
    }
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
}

/// A named OpenShift cluster deployment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Opaque UUID for manual clusters, `vlan-{name}@{site}` for external ones
    pub id: String,
    pub cluster_name: String,
    pub site: String,
    /// CIDR segments, in first-seen order, without duplicates
    pub segments: Vec<String>,
    pub domain_name: String,
    pub console_url: String,
    #[serde(rename = "loadBalancerIP", default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<IpAddr>,
    pub source: ClusterSource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "ClusterMetadata::is_empty")]
    pub metadata: ClusterMetadata,
}

impl Cluster {
    pub fn key(&self) -> ClusterKey {
        ClusterKey::new(self.cluster_name.clone(), self.site.clone())
    }

    /// Identifier given to externally-sourced clusters
    pub fn external_id(cluster_name: &str, site: &str) -> String {
        format!("vlan-{}@{}", cluster_name, site)
    }

    /// OpenShift web console URL for a cluster
    pub fn console_url_for(cluster_name: &str, domain_name: &str) -> String {
        format!(
            "https://console-openshift-console.apps.{}.{}",
            cluster_name.trim().to_lowercase(),
            domain_name
        )
    }

    /// Add a segment unless it is already listed
    pub fn add_segment(&mut self, segment: &str) {
        if !self.segments.iter().any(|s| s == segment) {
            self.segments.push(segment.to_string());
        }
    }
}

/// Operator request for a manual cluster
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCluster {
    pub cluster_name: String,
    pub site: String,
    pub segments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(rename = "loadBalancerIP", default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<IpAddr>,
}
