//! Cluster Navigator record types
//!
//! This library defines the data shared by the sync engine and its callers:
//! - Cluster: a named OpenShift deployment at a site, external or manual
//! - Site: the per-site aggregate produced by the merge
//! - CachePayload: the versioned JSON document persisted per collection
//! - Segment: the raw network segment record served by the VLAN Manager
//! - SyncStatus / DnsStats: process-local status snapshots

pub mod cluster;
pub mod payload;
pub mod segment;
pub mod site;
pub mod status;

pub use cluster::{Cluster, ClusterKey, ClusterMetadata, ClusterSource, NewCluster};
pub use payload::{CachePayload, Collection, ExternalCollection, ManualCollection, PayloadStats, PAYLOAD_VERSION};
pub use segment::{Segment, SitesResponse};
pub use site::{Site, Statistics};
pub use status::{DnsStats, SyncPhase, SyncReport, SyncStatus};
