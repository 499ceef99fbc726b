use thiserror::Error;

#[derive(Error, Debug)]
pub enum VlanError {
    /// The API answered, but with a non-success status or an unusable body
    #[error("VLAN Manager API error at {endpoint}{}: {details}", http_status(.status))]
    Api {
        endpoint: String,
        status: Option<u16>,
        details: String,
    },

    /// The API could not be reached within the client timeout
    #[error("VLAN Manager unavailable: {0}")]
    Unavailable(String),
}

impl VlanError {
    /// Short label used for metrics and status reporting
    pub fn reason(&self) -> &'static str {
        match self {
            VlanError::Api { .. } => "api",
            VlanError::Unavailable(_) => "unavailable",
        }
    }
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}
