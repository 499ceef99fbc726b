//! Cluster Navigator sync engine
//!
//! This library provides:
//! - The periodic VLAN Manager sync orchestrator with fallback on failure
//! - Batched, timeout-bounded DNS resolution of load-balancer addresses
//! - The inventory facade serving the merged sites view and manual mutations
//! - Prometheus metrics for both

pub mod dns;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod orchestrator;

pub use dns::{AddressLookup, DnsResolver, HickoryLookup, LookupFailure};
pub use error::SyncError;
pub use inventory::Inventory;
pub use metrics::SyncMetrics;
pub use orchestrator::SyncOrchestrator;
