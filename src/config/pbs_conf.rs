use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::config::env_vars::parse_unix_env_vars;
use crate::constants::DEFAULT_PBS_CONF;

/// Keys that the environment may override, as the PBS daemons themselves do
const ENV_OVERRIDABLE: &[&str] = &["PBS_HOME", "PBS_EXEC", "PBS_SERVER"];

/// Keys describing the communication relay topology
pub const COMM_KEYS: &[&str] = &[
    "PBS_START_COMM",
    "PBS_LEAF_NAME",
    "PBS_LEAF_ROUTERS",
    "PBS_COMM_NAME",
    "PBS_COMM_ROUTERS",
    "PBS_COMM_THREADS",
    "PBS_COMM_LOG_EVENTS",
];

/// Location of pbs.conf: `$PBS_CONF_FILE`, else `/etc/pbs.conf`
pub fn pbs_conf_path() -> PathBuf {
    std::env::var("PBS_CONF_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_PBS_CONF))
}

/// Parse `KEY=VALUE` lines; blanks and `#` comments are ignored
pub fn parse_pbs_conf(content: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            entries.insert(key.to_string(), parse_unix_env_vars(value));
        }
    }
    entries
}

/// Read and parse pbs.conf, applying environment overrides.
///
/// A missing file is not an error: a host with only client tools, or one
/// configured entirely through the environment, still gets a snapshot.
pub fn load_pbs_conf(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut entries = if path.exists() {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;
        parse_pbs_conf(&content)
    } else {
        debug!("{} not found, relying on environment", path.display());
        BTreeMap::new()
    };

    for key in ENV_OVERRIDABLE {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                entries.insert(key.to_string(), value);
            }
        }
    }

    Ok(entries)
}
