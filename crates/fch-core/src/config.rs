//! Configuration system for ndn-fch.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FCH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ndn-fch/config.toml
//!   3. ~/.config/ndn-fch/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum refresh interval; shorter configured values are raised to this.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FchConfig {
    pub network: NetworkConfig,
    pub refresh: RefreshConfig,
    pub probe: ProbeConfig,
    pub routers: RoutersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the query API binds to.
    pub listen: String,
    pub api_port: u16,
}

/// What to do with a cycle in which some transport/family group got no
/// usable probe response at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Publish whatever verdicts were collected.
    #[default]
    Publish,
    /// Drop the cycle and keep serving the previous snapshot.
    Discard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// Max ping names per probe request.
    pub max_names: usize,
    /// Probe attempts per router and transport/family, merged before the verdict.
    pub probe_attempts: usize,
    /// Upper bound of the pause between two probe dispatches.
    pub max_step_ms: u64,
    pub partial_policy: PartialPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Base URI of the UDP/WebSocket health probe service. Empty = disabled.
    pub udp_wss_uri: String,
    /// Base URI of the HTTP/3 health probe service. Empty = disabled.
    pub http3_uri: String,
    /// Per-request timeout towards the probe service.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutersConfig {
    /// Include the built-in router list.
    pub builtin: bool,
    /// JSON file with an operator-maintained router list. Empty = none.
    pub topology_file: PathBuf,
    /// Testbed status endpoint. Empty = disabled.
    pub testbed_uri: String,
    /// On-disk copy of the last fetched testbed list.
    pub testbed_cache: PathBuf,
    pub testbed_refresh_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".to_string(),
            api_port: 5000,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_names: 8,
            probe_attempts: 1,
            max_step_ms: 100,
            partial_policy: PartialPolicy::Publish,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            udp_wss_uri: String::new(),
            http3_uri: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for RoutersConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            topology_file: PathBuf::new(),
            testbed_uri: "https://ndndemo.arl.wustl.edu/testbed-nodes.json".to_string(),
            testbed_cache: data_dir().join("testbed-routers.json"),
            testbed_refresh_secs: 600,
        }
    }
}

impl RefreshConfig {
    /// Configured interval, raised to the enforced floor.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs).max(MIN_REFRESH_INTERVAL)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ndn-fch")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("ndn-fch")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FchConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            FchConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&FchConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply FCH_* overrides. `lookup` is `std::env::var` outside of tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FCH_NETWORK__LISTEN") {
            self.network.listen = v;
        }
        if let Some(p) = lookup("FCH_NETWORK__API_PORT").and_then(|v| v.parse().ok()) {
            self.network.api_port = p;
        }
        if let Some(n) = lookup("FCH_REFRESH__INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.refresh.interval_secs = n;
        }
        if let Some(n) = lookup("FCH_REFRESH__MAX_NAMES").and_then(|v| v.parse().ok()) {
            self.refresh.max_names = n;
        }
        if let Some(n) = lookup("FCH_REFRESH__PROBE_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.refresh.probe_attempts = n;
        }
        if let Some(n) = lookup("FCH_REFRESH__MAX_STEP_MS").and_then(|v| v.parse().ok()) {
            self.refresh.max_step_ms = n;
        }
        if let Some(v) = lookup("FCH_REFRESH__PARTIAL_POLICY") {
            match v.as_str() {
                "publish" => self.refresh.partial_policy = PartialPolicy::Publish,
                "discard" => self.refresh.partial_policy = PartialPolicy::Discard,
                _ => {}
            }
        }
        if let Some(v) = lookup("FCH_PROBE__UDP_WSS_URI") {
            self.probe.udp_wss_uri = v;
        }
        if let Some(v) = lookup("FCH_PROBE__HTTP3_URI") {
            self.probe.http3_uri = v;
        }
        if let Some(n) = lookup("FCH_PROBE__TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.probe.timeout_secs = n;
        }
        if let Some(v) = lookup("FCH_ROUTERS__TOPOLOGY_FILE") {
            self.routers.topology_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("FCH_ROUTERS__TESTBED_URI") {
            self.routers.testbed_uri = v;
        }
        if let Some(v) = lookup("FCH_ROUTERS__TESTBED_CACHE") {
            self.routers.testbed_cache = PathBuf::from(v);
        }
        if let Some(n) = lookup("FCH_ROUTERS__TESTBED_REFRESH_SECS").and_then(|v| v.parse().ok()) {
            self.routers.testbed_refresh_secs = n;
        }
        if let Some(v) = lookup("FCH_ROUTERS__BUILTIN") {
            self.routers.builtin = v == "true" || v == "1";
        }
    }
}
