use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Information category a captured item belongs to
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Server,
    Job,
    Node,
    Comm,
    Hook,
    Sched,
    Resv,
    Datastore,
    #[serde(rename = "pbs-core-meta")]
    PbsInfo,
    #[serde(rename = "core-dump")]
    Core,
    System,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Server,
        Category::Job,
        Category::Node,
        Category::Comm,
        Category::Hook,
        Category::Sched,
        Category::Resv,
        Category::Datastore,
        Category::PbsInfo,
        Category::Core,
        Category::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Server => "server",
            Category::Job => "job",
            Category::Node => "node",
            Category::Comm => "comm",
            Category::Hook => "hook",
            Category::Sched => "sched",
            Category::Resv => "resv",
            Category::Datastore => "datastore",
            Category::PbsInfo => "pbs-core-meta",
            Category::Core => "core-dump",
            Category::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of capturing one item
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Captured,
    Skipped,
    Failed,
}

/// Shape of what landed on disk; drives the obfuscation pass
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Binary,
    Directory,
}

/// One registry entry
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CollectedItem {
    pub category: Category,
    pub key: String,
    /// Relative to the snapshot root; `None` when nothing was written
    pub path: Option<PathBuf>,
    pub status: ItemStatus,
    pub collector: String,
    pub kind: ArtifactKind,
    pub reason: Option<String>,
    #[serde(default)]
    pub obfuscation_failed: bool,
}

impl CollectedItem {
    pub fn captured(
        category: Category,
        key: &str,
        path: impl Into<PathBuf>,
        kind: ArtifactKind,
        collector: &str,
    ) -> Self {
        Self {
            category,
            key: key.to_string(),
            path: Some(path.into()),
            status: ItemStatus::Captured,
            collector: collector.to_string(),
            kind,
            reason: None,
            obfuscation_failed: false,
        }
    }

    pub fn absent(
        category: Category,
        key: &str,
        status: ItemStatus,
        reason: impl Into<String>,
        collector: &str,
    ) -> Self {
        Self {
            category,
            key: key.to_string(),
            path: None,
            status,
            collector: collector.to_string(),
            kind: ArtifactKind::Text,
            reason: Some(reason.into()),
            obfuscation_failed: false,
        }
    }

    pub fn relative_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_captured(&self) -> bool {
        self.status == ItemStatus::Captured
    }
}

/// Discovery outcome for one scheduler's storage paths
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorHealth {
    Ready,
    Unreadable(String),
}

/// A configured scheduler instance and where its files live
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchedulerDescriptor {
    pub id: String,
    pub partitions: Vec<String>,
    pub priv_dir: PathBuf,
    pub log_dir: PathBuf,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// `state` attribute as listed by the server (idle, scheduling, down)
    pub state: Option<String>,
    pub health: DescriptorHealth,
}

impl SchedulerDescriptor {
    pub const DEFAULT_ID: &'static str = "default";

    pub fn is_default(&self) -> bool {
        self.id == Self::DEFAULT_ID
    }

    /// Snapshot-relative name of the private-directory artifact
    pub fn priv_artifact_name(&self) -> String {
        if self.is_default() {
            "sched_priv".to_string()
        } else {
            format!("sched_priv_{}", self.id)
        }
    }

    /// Snapshot-relative name of the log-directory artifact
    pub fn logs_artifact_name(&self) -> String {
        if self.is_default() {
            "sched_logs".to_string()
        } else {
            format!("sched_logs_{}", self.id)
        }
    }

    /// `None` when the server did not list a state
    pub fn listed_down(&self) -> Option<bool> {
        self.state
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("down"))
    }
}
