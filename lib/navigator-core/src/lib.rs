//! Cluster Navigator core library
//!
//! This library provides the state-bearing pieces of the sync engine:
//! - Configuration loading and validation
//! - Error types
//! - Naming and CIDR validation
//! - The locked JSON cache store shared between process replicas
//! - Manual cluster mutations
//! - Merging external and manual clusters into the sites view
//! - Inventory statistics

pub mod config;
pub mod error;
pub mod manual;
pub mod merge;
pub mod stats;
pub mod store;
pub mod validation;

pub use config::{CacheConfig, ClusterPolicy, Config, DnsConfig, LogFormat, ServerConfig, VlanManagerConfig};
pub use error::{CacheError, CoreError, Result};
pub use manual::ManualClusters;
pub use merge::merge;
pub use stats::statistics;
pub use store::{LockRetryPolicy, LockedStore};
