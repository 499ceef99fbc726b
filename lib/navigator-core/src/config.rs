//! Configuration for every component, loaded once and passed to constructors

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "NAVIGATOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// Upper bound for a single DNS lookup; a longer wait stalls a whole sites request
const MAX_DNS_TIMEOUT_SECONDS: f64 = 60.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vlan_manager: VlanManagerConfig,
    pub dns: DnsConfig,
    pub cache: CacheConfig,
    pub clusters: ClusterPolicy,
    pub server: ServerConfig,
    /// Default tracing filter when RUST_LOG is not set
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlanManagerConfig {
    pub url: String,
    pub sync_interval_seconds: u64,
    pub timeout_seconds: u64,
    pub insecure_tls_verify: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Name server, `ip` or `ip:port`
    pub server: String,
    /// Per-lookup upper bound
    pub timeout_seconds: f64,
    /// Hostname template with `{cluster_name}` and `{domain_name}` placeholders
    pub resolution_path: String,
    /// Lookups in flight per batch
    pub concurrency: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub external_file: String,
    pub manual_file: String,
    pub lock_attempts: u32,
    pub lock_base_delay_ms: u64,
    pub lock_max_delay_ms: u64,
}

/// Naming and defaulting rules applied to every cluster record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPolicy {
    pub name_prefix: String,
    pub default_domain: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vlan_manager: VlanManagerConfig::default(),
            dns: DnsConfig::default(),
            cache: CacheConfig::default(),
            clusters: ClusterPolicy::default(),
            server: ServerConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Default for VlanManagerConfig {
    fn default() -> Self {
        Self {
            url: "http://0.0.0.0:9000".to_string(),
            sync_interval_seconds: 300,
            timeout_seconds: 10,
            insecure_tls_verify: false,
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            server: "8.8.8.8".to_string(),
            timeout_seconds: 2.0,
            resolution_path: "ingress.{cluster_name}.{domain_name}".to_string(),
            concurrency: 16,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            external_file: "vlan_cache.json".to_string(),
            manual_file: "manual_clusters.json".to_string(),
            lock_attempts: 5,
            lock_base_delay_ms: 100,
            lock_max_delay_ms: 2_000,
        }
    }
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        Self {
            name_prefix: "ocp4-".to_string(),
            default_domain: "example.com".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Config {
    /// Load from the file named by `NAVIGATOR_CONFIG` (or `config.yaml`), then apply
    /// environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            let config = Self::from_file(&path)?;
            info!("Configuration loaded from {}", path);
            config
        } else {
            warn!("Config file {} not found, using defaults", path);
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML (or JSON) config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| CoreError::InvalidConfiguration(e.to_string()))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VLAN_MANAGER_URL") {
            self.vlan_manager.url = url;
        }
        if let Some(interval) = lookup("SYNC_INTERVAL_SECONDS") {
            self.vlan_manager.sync_interval_seconds = parse_value("SYNC_INTERVAL_SECONDS", &interval)?;
        }
        if let Some(insecure) = lookup("VLAN_MANAGER_INSECURE_TLS_VERIFY") {
            self.vlan_manager.insecure_tls_verify = parse_value("VLAN_MANAGER_INSECURE_TLS_VERIFY", &insecure)?;
        }
        if let Some(server) = lookup("DNS_SERVER") {
            self.dns.server = server;
        }
        if let Some(timeout) = lookup("DNS_TIMEOUT_SECONDS") {
            self.dns.timeout_seconds = parse_value("DNS_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(path) = lookup("DNS_RESOLUTION_PATH") {
            self.dns.resolution_path = path;
        }
        if let Some(domain) = lookup("DEFAULT_DOMAIN") {
            self.clusters.default_domain = domain;
        }
        if let Some(dir) = lookup("CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }
        if let Some(address) = lookup("SERVER_ADDRESS") {
            self.server.address = address;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.vlan_manager.url.trim().is_empty() {
            return Err(CoreError::InvalidConfiguration("vlan_manager.url is empty".into()));
        }
        if self.vlan_manager.sync_interval_seconds == 0 {
            return Err(CoreError::InvalidConfiguration(
                "vlan_manager.sync_interval_seconds must be positive".into(),
            ));
        }
        if !(self.dns.timeout_seconds > 0.0 && self.dns.timeout_seconds <= MAX_DNS_TIMEOUT_SECONDS) {
            return Err(CoreError::InvalidConfiguration(format!(
                "dns.timeout_seconds must be within (0, {}]",
                MAX_DNS_TIMEOUT_SECONDS
            )));
        }
        if self.dns.concurrency == 0 {
            return Err(CoreError::InvalidConfiguration("dns.concurrency must be positive".into()));
        }
        if !self.dns.resolution_path.contains("{cluster_name}")
            && !self.dns.resolution_path.contains("{clusterName}")
        {
            return Err(CoreError::InvalidConfiguration(
                "dns.resolution_path must contain {cluster_name}".into(),
            ));
        }
        self.dns.server_addr()?;
        if self.cache.lock_attempts == 0 {
            return Err(CoreError::InvalidConfiguration("cache.lock_attempts must be positive".into()));
        }
        if self.clusters.default_domain.trim().is_empty() {
            return Err(CoreError::InvalidConfiguration("clusters.default_domain is empty".into()));
        }
        Ok(())
    }
}

impl VlanManagerConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl DnsConfig {
    /// Name server socket address, port 53 unless given
    pub fn server_addr(&self) -> Result<SocketAddr> {
        if let Ok(addr) = self.server.parse::<SocketAddr>() {
            return Ok(addr);
        }
        self.server
            .parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, 53))
            .map_err(|_| CoreError::InvalidConfiguration(format!("invalid DNS server '{}'", self.server)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds.min(MAX_DNS_TIMEOUT_SECONDS))
            .unwrap_or(Duration::from_secs(MAX_DNS_TIMEOUT_SECONDS as u64))
    }
}

impl CacheConfig {
    pub fn external_path(&self) -> PathBuf {
        self.directory.join(&self.external_file)
    }

    pub fn manual_path(&self) -> PathBuf {
        self.directory.join(&self.manual_file)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidConfiguration(format!("{} has invalid value '{}'", key, value)))
}
