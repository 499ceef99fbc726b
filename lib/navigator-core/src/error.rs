use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures of the locked cache store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache from '{}': file does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("Failed to read cache from '{}': {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write cache to '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

impl CacheError {
    /// The file has never been written by any replica
    pub fn is_missing(&self) -> bool {
        matches!(self, CacheError::Missing { .. })
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid cluster name '{name}': {reason}")]
    InvalidClusterName { name: String, reason: String },

    #[error("Invalid CIDR notation in segment '{segment}': {reason}")]
    InvalidCidr { segment: String, reason: String },

    #[error("Invalid site '{site}': {reason}")]
    InvalidSite { site: String, reason: String },

    #[error("Cluster with ID '{0}' not found")]
    ClusterNotFound(String),

    #[error("Cluster '{name}' already exists in site '{site}'")]
    ClusterAlreadyExists { name: String, site: String },

    #[error("Cannot delete VLAN Manager cluster '{0}'. Only manual clusters can be deleted.")]
    ExternalClusterProtected(String),

    #[error("VLAN Manager data has not been synchronized yet")]
    NotYetSynchronized,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CoreError {
    /// Validation failures caused by caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidClusterName { .. }
                | CoreError::InvalidCidr { .. }
                | CoreError::InvalidSite { .. }
        )
    }
}
