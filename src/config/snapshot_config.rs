use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COLLECTOR_TIMEOUT_SECS, DEFAULT_COMMAND_TIMEOUT_SECS};

/// Tuning knobs loaded from an optional YAML file.
///
/// Command-line flags always win over values here; this file only supplies
/// what the flags leave unset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SnapshotConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Timeout for a single PBS or host command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Timeout for a whole collector
    #[serde(default = "default_collector_timeout")]
    pub collector_timeout_secs: u64,
    /// Daemon log count used when `--daemon-logs` is not given
    #[serde(default)]
    pub daemon_logs: Option<usize>,
    /// Accounting log count used when `--accounting-logs` is not given
    #[serde(default)]
    pub accounting_logs: Option<usize>,
    /// Alternate pbs.conf location; `PBS_CONF_FILE` still takes precedence
    #[serde(default)]
    pub pbs_conf: Option<PathBuf>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_collector_timeout() -> u64 {
    DEFAULT_COLLECTOR_TIMEOUT_SECS
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            collector_timeout_secs: DEFAULT_COLLECTOR_TIMEOUT_SECS,
            daemon_logs: None,
            accounting_logs: None,
            pbs_conf: None,
        }
    }
}

impl SnapshotConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: SnapshotConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }
}

/// Load the tuning file if one was given, else defaults
pub fn load_config(config_path: Option<&Path>) -> Result<SnapshotConfig> {
    match config_path {
        Some(path) => SnapshotConfig::from_yaml_file(path),
        None => {
            debug!("No config path provided, using defaults");
            Ok(SnapshotConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_save_and_load_yaml_file() {
        let config = SnapshotConfig {
            daemon_logs: Some(3),
            command_timeout_secs: 10,
            ..SnapshotConfig::default()
        };
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("snapshot.yaml");

        config.save_to_yaml_file(&config_path).unwrap();
        let loaded = SnapshotConfig::from_yaml_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "accounting_logs: 7\n").unwrap();

        let loaded = SnapshotConfig::from_yaml_file(temp_file.path()).unwrap();
        assert_eq!(loaded.accounting_logs, Some(7));
        assert_eq!(loaded.daemon_logs, None);
        assert_eq!(loaded.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "invalid: yaml: content:").unwrap();

        let result = SnapshotConfig::from_yaml_file(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse YAML"));
    }

    #[test]
    fn test_load_config_no_path() {
        let loaded = load_config(None).unwrap();
        assert_eq!(loaded, SnapshotConfig::default());
    }
}
