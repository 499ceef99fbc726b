//! HTTP client for the VLAN Manager API

use crate::VlanError;
use async_trait::async_trait;
use navigator_api::{Segment, SitesResponse};
use navigator_core::VlanManagerConfig;
use serde_json::de::from_str;
use tracing::{debug, error};

const SEGMENTS_PATH: &str = "/api/segments";
const SITES_PATH: &str = "/api/sites";

/// Read-only source of network segments and sites
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Fetch the allocated segments
    async fn fetch_segments(&self) -> Result<Vec<Segment>, VlanError>;

    /// Fetch the list of site names
    async fn fetch_sites(&self) -> Result<Vec<String>, VlanError>;

    /// Base URL reported in sync status
    fn endpoint(&self) -> &str;
}

/// VLAN Manager client backed by reqwest
pub struct VlanClient {
    http: reqwest::Client,
    base_url: String,
}

impl VlanClient {
    pub fn new(config: &VlanManagerConfig) -> Result<Self, VlanError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure_tls_verify)
            .build()
            .map_err(|e| VlanError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, VlanError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("Request to {} failed: {}", url, e);
                VlanError::Unavailable(format!("{}: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(VlanError::Api {
                endpoint: path.to_string(),
                status: Some(status.as_u16()),
                details: if details.is_empty() {
                    status.to_string()
                } else {
                    details
                },
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                VlanError::Unavailable(format!("{}: {}", url, e))
            } else {
                VlanError::Api {
                    endpoint: path.to_string(),
                    status: Some(status.as_u16()),
                    details: format!("failed to read body: {}", e),
                }
            }
        })?;

        from_str(&body).map_err(|e| VlanError::Api {
            endpoint: path.to_string(),
            status: Some(status.as_u16()),
            details: format!("invalid JSON: {}", e),
        })
    }
}

#[async_trait]
impl SegmentSource for VlanClient {
    async fn fetch_segments(&self) -> Result<Vec<Segment>, VlanError> {
        let segments: Vec<Segment> = self
            .get_json(SEGMENTS_PATH, &[("allocated", "true")])
            .await?;
        debug!("Fetched {} segments from VLAN Manager", segments.len());
        Ok(segments)
    }

    async fn fetch_sites(&self) -> Result<Vec<String>, VlanError> {
        let sites: SitesResponse = self.get_json(SITES_PATH, &[]).await?;
        Ok(sites.into_sites())
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
