//! Server-wide configuration knobs (spec §6 "Configuration knobs").
//!
//! Shape grounded in the teacher's `config::settings::Settings` (a single
//! `serde`-derived struct loaded from YAML, validated in a dedicated pass).

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    TimeBased,
    HashBased,
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        PartitionStrategy::TimeBased
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionConfig {
    #[serde(default)]
    pub strategy: PartitionStrategy,
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

fn default_time_format() -> String {
    "%Y/%m".to_string()
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::default(),
            time_format: default_time_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketConfig {
    #[serde(default = "default_max_ws_connections")]
    pub max_connections: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
}

fn default_max_ws_connections() -> usize {
    10
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_ping_timeout_secs() -> u64 {
    10
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_ws_connections(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
}

fn default_max_workers() -> usize {
    5
}
fn default_max_age_seconds() -> u64 {
    3600
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_age_seconds: default_max_age_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    #[serde(default = "default_step_timeout_seconds")]
    pub step_timeout_seconds: u64,
}

fn default_step_timeout_seconds() -> u64 {
    300
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_seconds: default_step_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    #[serde(default = "default_idle_ttl_seconds")]
    pub idle_ttl_seconds: u64,
}

fn default_idle_ttl_seconds() -> u64 {
    3600
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: default_idle_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Root of the partitioned on-disk layout (spec §4.2).
    pub base_dir: PathBuf,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::Settings("baseDir must be non-empty".into()));
        }
        if self.websocket.max_connections == 0 {
            return Err(ConfigError::Settings(
                "websocket.maxConnections must be at least 1".into(),
            ));
        }
        if self.jobs.max_workers == 0 {
            return Err(ConfigError::Settings(
                "jobs.maxWorkers must be at least 1".into(),
            ));
        }
        if self.execution.step_timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "execution.stepTimeoutSeconds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.base_dir.join("sqlite/chat.db")
    }

    pub fn sqlite_snapshots_dir(&self) -> PathBuf {
        self.base_dir.join("sqlite/snapshots")
    }

    pub fn dumps_dir(&self) -> PathBuf {
        self.base_dir.join("dumps")
    }

    pub fn log_path(&self) -> PathBuf {
        crate::shared::logging::server_log_path(&self.base_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let ws = WebSocketConfig::default();
        assert_eq!(ws.max_connections, 10);
        let jobs = JobsConfig::default();
        assert_eq!(jobs.max_workers, 5);
        let exec = ExecutionConfig::default();
        assert_eq!(exec.step_timeout_seconds, 300);
        let ctx = ContextConfig::default();
        assert_eq!(ctx.idle_ttl_seconds, 3600);
        let partition = PartitionConfig::default();
        assert_eq!(partition.time_format, "%Y/%m");
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let settings: Settings = serde_yaml::from_str("baseDir: /tmp/flowchat\n").expect("parse");
        assert_eq!(settings.jobs.max_workers, 5);
        assert_eq!(settings.partition.strategy, PartitionStrategy::TimeBased);
    }

    #[test]
    fn validate_rejects_zero_max_workers() {
        let mut settings: Settings =
            serde_yaml::from_str("baseDir: /tmp/flowchat\n").expect("parse");
        settings.jobs.max_workers = 0;
        let err = settings.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn from_path_reads_and_parses_yaml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "baseDir: /tmp/flowchat\n").expect("write config");
        let settings = Settings::from_path(&path).expect("load settings");
        assert_eq!(settings.base_dir, PathBuf::from("/tmp/flowchat"));
    }
}
