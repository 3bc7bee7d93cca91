use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::cluster::ToolDir;
use crate::config::pbs_conf::load_pbs_conf;
use crate::constants::{DEFAULT_PBS_EXEC, DEFAULT_PBS_HOME};

/// Where the PBS installation lives on this host
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PbsLayout {
    pub conf_path: PathBuf,
    pub pbs_home: PathBuf,
    pub pbs_exec: PathBuf,
    /// `PBS_SERVER`, else the local hostname
    pub server_host: String,
    /// Every parsed `pbs.conf` entry after environment overrides
    pub entries: BTreeMap<String, String>,
}

impl PbsLayout {
    /// Read pbs.conf at `conf_path` and resolve the installation paths
    pub fn from_conf(conf_path: &Path) -> Result<Self> {
        let entries = load_pbs_conf(conf_path)?;
        Ok(Self::from_entries(conf_path, entries))
    }

    pub fn from_entries(conf_path: &Path, entries: BTreeMap<String, String>) -> Self {
        let pbs_home = entries
            .get("PBS_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PBS_HOME));
        let pbs_exec = entries
            .get("PBS_EXEC")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PBS_EXEC));
        let server_host = entries
            .get("PBS_SERVER")
            .cloned()
            .unwrap_or_else(local_hostname);

        Self {
            conf_path: conf_path.to_path_buf(),
            pbs_home,
            pbs_exec,
            server_host,
            entries,
        }
    }

    /// Layout rooted at explicit directories, with no conf entries
    pub fn with_dirs(pbs_home: impl Into<PathBuf>, pbs_exec: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: PathBuf::from(crate::constants::DEFAULT_PBS_CONF),
            pbs_home: pbs_home.into(),
            pbs_exec: pbs_exec.into(),
            server_host: local_hostname(),
            entries: BTreeMap::new(),
        }
    }

    /// Absolute path of a PBS tool
    pub fn tool_path(&self, tool: &str, dir: ToolDir) -> PathBuf {
        let sub = match dir {
            ToolDir::Bin => "bin",
            ToolDir::Sbin => "sbin",
        };
        self.pbs_exec.join(sub).join(tool)
    }

    /// Path under `PBS_HOME`
    pub fn home_path(&self, rel: &str) -> PathBuf {
        self.pbs_home.join(rel)
    }

    /// Whether `PBS_HOME` can be listed by this process
    pub fn home_readable(&self) -> bool {
        std::fs::read_dir(&self.pbs_home).is_ok()
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
