//! Process-local status snapshots for the sync loop and the DNS resolver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the sync state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum SyncPhase {
    Idle = 0,
    Fetching = 1,
    Transforming = 2,
    Committing = 3,
    /// Last attempt failed; readers are served the last committed payload
    Degraded = 4,
}

impl SyncPhase {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => SyncPhase::Fetching,
            2 => SyncPhase::Transforming,
            3 => SyncPhase::Committing,
            4 => SyncPhase::Degraded,
            _ => SyncPhase::Idle,
        }
    }
}

/// Outcome of one successful sync cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced_at: DateTime<Utc>,
    pub total_clusters: usize,
    pub total_sites: usize,
    pub total_segments: usize,
    /// Segment/name pairs excluded by validation
    pub rejected: usize,
    pub duration_ms: u64,
}

/// Answer to a sync status query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub service_running: bool,
    pub phase: SyncPhase,
    /// False until a payload has been committed by any replica
    pub synchronized: bool,
    pub sync_interval_seconds: u64,
    pub vlan_manager_url: String,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub cache_exists: bool,
    pub cache_last_updated: Option<DateTime<Utc>>,
    pub cache_age_minutes: Option<f64>,
    pub last_report: Option<SyncReport>,
}

/// DNS resolution counters since start-up or the last reset
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsStats {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_time_seconds: f64,
    pub average_time_seconds: f64,
}
