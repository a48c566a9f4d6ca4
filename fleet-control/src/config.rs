//! Configuration loading for fleet controllers.
//!
//! Configuration is loaded from a TOML file (default: `fleet.toml`). Every
//! field has a default, so an empty file selects the embedded backend with
//! the stock timings.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use fleet_types::{ClusterId, ClusterShape, Role};

use crate::poller::Poller;
use crate::targets::{default_targets, RemoteTargetMap, TargetsError};

/// Which controller implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Simulated fleets run in-process.
    #[default]
    Embedded,
    /// A fixed real deployment reached over ssh.
    External,
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Backend selection.
    #[serde(default)]
    pub backend: Backend,
    /// Wait and poll timings shared by both backends.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Simulated fleet settings.
    #[serde(default)]
    pub embedded: EmbeddedConfig,
    /// Real deployment settings.
    #[serde(default)]
    pub external: ExternalConfig,
}

/// Wait and poll timings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// How long to wait after halting/resuming agents before returning
    /// (default: 5000ms).
    #[serde(default = "default_drain_window_ms")]
    pub drain_window_ms: u64,
    /// Pause between convergence checks (default: 1000ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Time allowed for each convergence check (default: 10s).
    #[serde(default = "default_convergence_timeout_secs")]
    pub convergence_timeout_secs: u64,
}

/// Simulated fleet settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedConfig {
    /// OSDs created per simulated server (default: 4).
    #[serde(default = "default_osds_per_agent")]
    pub osds_per_agent: u32,
    /// Monitors per cluster, placed on the first servers (default: 3).
    #[serde(default = "default_mon_count")]
    pub mon_count: usize,
    /// Placement groups per pool (default: 64).
    #[serde(default = "default_pgs_per_pool")]
    pub pgs_per_pool: u32,
    /// Most simulated servers this host will run at once (default: 64).
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Top-level domain for generated names, `cluster<i>.<suffix>`
    /// (default: "com").
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
    /// Agent heartbeat period (default: 1000ms).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

/// Real deployment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalConfig {
    /// The deployment's fsid.
    #[serde(default = "default_fsid")]
    pub fsid: ClusterId,
    /// Servers in the deployment (default: 3).
    #[serde(default = "default_server_count")]
    pub server_count: usize,
    /// Clusters in the deployment (default: 1).
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    /// Role marking the administrative target (default: "client.0").
    #[serde(default = "Role::admin")]
    pub admin_role: Role,
    /// Cluster CLI on the remote hosts (default: "ceph").
    #[serde(default = "default_ceph_command")]
    pub ceph_command: String,
    /// ssh connection timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// `user@host` → role tags.
    #[serde(default = "default_targets")]
    pub targets: BTreeMap<String, Vec<String>>,
}

// Default value functions
fn default_drain_window_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_convergence_timeout_secs() -> u64 {
    10
}

fn default_osds_per_agent() -> u32 {
    4
}

fn default_mon_count() -> usize {
    3
}

fn default_pgs_per_pool() -> u32 {
    64
}

fn default_max_agents() -> usize {
    64
}

fn default_domain_suffix() -> String {
    "com".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    1000
}

fn default_fsid() -> ClusterId {
    ClusterId::from_u128(0x12345)
}

fn default_server_count() -> usize {
    3
}

fn default_cluster_count() -> usize {
    1
}

fn default_ceph_command() -> String {
    "ceph".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            drain_window_ms: default_drain_window_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            convergence_timeout_secs: default_convergence_timeout_secs(),
        }
    }
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            osds_per_agent: default_osds_per_agent(),
            mon_count: default_mon_count(),
            pgs_per_pool: default_pgs_per_pool(),
            max_agents: default_max_agents(),
            domain_suffix: default_domain_suffix(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            fsid: default_fsid(),
            server_count: default_server_count(),
            cluster_count: default_cluster_count(),
            admin_role: Role::admin(),
            ceph_command: default_ceph_command(),
            connect_timeout_secs: default_connect_timeout_secs(),
            targets: default_targets(),
        }
    }
}

impl TimingConfig {
    /// Drain window after halting or resuming agents.
    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }

    /// Poller for convergence checks.
    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.convergence_timeout_secs),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

impl EmbeddedConfig {
    /// Agent heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl ExternalConfig {
    /// The only shape the deployment can provide.
    pub fn shape(&self) -> ClusterShape {
        ClusterShape::new(self.server_count).clusters(self.cluster_count)
    }

    /// Validated target map.
    pub fn target_map(&self) -> Result<RemoteTargetMap, TargetsError> {
        RemoteTargetMap::from_raw(&self.targets, &self.admin_role)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_embedded() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Embedded);
        assert_eq!(config.timing.drain_window(), Duration::from_secs(5));
        assert_eq!(config.embedded.osds_per_agent, 4);
        assert_eq!(config.external.shape(), ClusterShape::new(3));
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend, Backend::Embedded);
        assert_eq!(config.timing.convergence_timeout_secs, 10);
        assert_eq!(config.embedded.max_agents, 64);
        assert_eq!(config.external.ceph_command, "ceph");
        assert_eq!(config.external.targets.len(), 3);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
backend = "external"

[timing]
drain_window_ms = 250
poll_interval_ms = 100
convergence_timeout_secs = 120

[embedded]
osds_per_agent = 2
domain_suffix = "test"

[external]
fsid = "6b6a8a5e-8f4a-4c5e-9c1a-1f6d2b3c4d5e"
server_count = 2
admin_role = "client.1"

[external.targets]
"root@a.example" = ["mon.0", "osd.0", "client.1"]
"root@b.example" = ["mon.1", "osd.1"]
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.backend, Backend::External);
        assert_eq!(config.timing.drain_window(), Duration::from_millis(250));
        assert_eq!(
            config.timing.poller(),
            Poller::new(Duration::from_secs(120), Duration::from_millis(100))
        );
        assert_eq!(config.embedded.osds_per_agent, 2);
        assert_eq!(config.embedded.domain_suffix, "test");
        assert_eq!(config.embedded.mon_count, 3);
        assert_eq!(
            config.external.fsid.to_string(),
            "6b6a8a5e-8f4a-4c5e-9c1a-1f6d2b3c4d5e"
        );
        assert_eq!(config.external.shape(), ClusterShape::new(2));
        assert_eq!(config.external.admin_role, Role::new("client", 1));

        let map = config.external.target_map().unwrap();
        assert_eq!(map.admin().ssh_target(), "root@a.example");
    }

    #[test]
    fn invalid_role_in_config_is_parse_error() {
        let toml = r#"
[external]
admin_role = "client"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(toml::from_str::<Config>("backend = \"cloud\"").is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, "[timing]\ndrain_window_ms = 1\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.timing.drain_window_ms, 1);
    }

    #[test]
    fn sample_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../../fleet.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.backend, defaults.backend);
        assert_eq!(config.external.fsid, defaults.external.fsid);
        assert_eq!(config.external.targets, defaults.external.targets);
        assert_eq!(config.embedded.max_agents, defaults.embedded.max_agents);
        assert_eq!(config.timing.poller(), defaults.timing.poller());
    }
}
