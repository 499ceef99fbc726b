//! Raw records served by the VLAN Manager API

use serde::{Deserialize, Deserializer, Serialize};

/// A network segment as reported by the VLAN Manager
///
/// Every field is optional on the wire; validation happens in the transformer so
/// that one malformed record never fails the whole response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub site: Option<String>,
    /// CIDR notation, e.g. `192.168.10.0/24`
    #[serde(default)]
    pub segment: Option<String>,
    /// Comma-separated list of cluster names sharing this segment
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub vlan_id: Option<String>,
    #[serde(default)]
    pub epg_name: Option<String>,
    #[serde(default)]
    pub vrf: Option<String>,
    #[serde(default)]
    pub allocated: bool,
    #[serde(default)]
    pub released: bool,
}

impl Segment {
    /// Split the cluster name field into trimmed, non-empty names
    pub fn cluster_names(&self) -> Vec<&str> {
        self.cluster_name
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Body of the sites endpoint, either `{"sites": [...]}` or a bare array
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SitesResponse {
    Wrapped { sites: Vec<String> },
    Bare(Vec<String>),
}

impl SitesResponse {
    pub fn into_sites(self) -> Vec<String> {
        match self {
            SitesResponse::Wrapped { sites } => sites,
            SitesResponse::Bare(sites) => sites,
        }
    }
}
