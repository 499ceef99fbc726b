use navigator_core::{CacheError, CoreError};
use navigator_vlan::VlanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Vlan(#[from] VlanError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("VLAN Manager returned no allocated segments")]
    EmptyResponse,

    #[error("A synchronization is already in progress")]
    SyncInProgress,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<CacheError> for SyncError {
    fn from(e: CacheError) -> Self {
        SyncError::Core(CoreError::Cache(e))
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}

impl SyncError {
    /// Short label used for the failure metric
    pub fn reason(&self) -> &'static str {
        match self {
            SyncError::Vlan(e) => e.reason(),
            SyncError::Core(CoreError::Cache(_)) => "cache",
            SyncError::Core(_) => "core",
            SyncError::EmptyResponse => "empty",
            SyncError::SyncInProgress => "in_progress",
            SyncError::Task(_) => "task",
        }
    }
}
