//! Scheduler discovery.
//!
//! A cluster may run several scheduler instances, each with its own private
//! and log directories. Discovery asks the server for the configured set
//! (`qmgr -c "list sched"`) and resolves where each instance keeps its files.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::cluster::{AdminCommand, ClusterInterface, PbsLayout};
use crate::constants::{DFLT_SCHED_LOGS_PATH, DFLT_SCHED_PRIV_PATH};
use crate::error::SnapshotError;
use crate::models::{DescriptorHealth, SchedulerDescriptor};

/// Result of scheduler discovery
#[derive(Debug, Clone)]
pub struct Discovery {
    /// In listing order; `default` is always present
    pub descriptors: Vec<SchedulerDescriptor>,
    /// Listing text as returned by the server, `None` for the fallback set
    pub raw_listing: Option<String>,
    /// Whether the default entry had to be synthesized
    pub default_synthesized: bool,
}

impl Discovery {
    /// Fallback when the server cannot be asked: just the default instance
    pub fn default_only(layout: &PbsLayout) -> Self {
        Self {
            descriptors: vec![default_descriptor(&layout.pbs_home)],
            raw_listing: None,
            default_synthesized: true,
        }
    }

    pub fn get(&self, id: &str) -> Option<&SchedulerDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Text of the listing artifact. The server's output is kept verbatim;
    /// a synthesized default is put first, matching descriptor order.
    pub fn listing_text(&self) -> Option<String> {
        let raw = self.raw_listing.as_ref()?;
        if !self.default_synthesized {
            return Some(raw.clone());
        }

        let mut text = String::new();
        if let Some(d) = self.get(SchedulerDescriptor::DEFAULT_ID) {
            text.push_str(&format!(
                "Sched {}\n    sched_priv = {}\n    sched_log = {}\n",
                d.id,
                d.priv_dir.display(),
                d.log_dir.display()
            ));
        }
        text.push_str(raw);
        Some(text)
    }
}

/// Ask the server for the scheduler set.
///
/// A failed query is fatal; an unreadable directory only marks the
/// descriptor.
pub async fn discover(cluster: &dyn ClusterInterface) -> Result<Discovery, SnapshotError> {
    info!("Discovering scheduler instances");

    let listing = cluster
        .query(AdminCommand::QmgrListSched)
        .await
        .map_err(|e| SnapshotError::DiscoveryFailure(e.to_string()))?;

    let pbs_home = &cluster.layout().pbs_home;
    let mut descriptors = parse_sched_listing(&listing, pbs_home);

    let default_synthesized = !descriptors.iter().any(|d| d.is_default());
    if default_synthesized {
        debug!("No default scheduler listed, synthesizing one");
        descriptors.insert(0, default_descriptor(pbs_home));
    }

    for d in &descriptors {
        if let DescriptorHealth::Unreadable(reason) = &d.health {
            warn!("Scheduler {}: {}", d.id, reason);
        }
    }

    info!(
        "Discovered {} scheduler(s): {}",
        descriptors.len(),
        descriptors
            .iter()
            .map(|d| d.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Discovery {
        descriptors,
        raw_listing: Some(listing),
        default_synthesized,
    })
}

/// Parse `Sched <id>` blocks from a `list sched` listing
pub fn parse_sched_listing(listing: &str, pbs_home: &Path) -> Vec<SchedulerDescriptor> {
    let mut blocks: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for line in listing.lines() {
        if let Some(id) = line.strip_prefix("Sched ") {
            blocks.push((id.trim().to_string(), Vec::new()));
            continue;
        }
        let Some((_, attrs)) = blocks.last_mut() else {
            continue;
        };

        if line.starts_with('\t') {
            // Wrapped value
            if let Some((_, value)) = attrs.last_mut() {
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(" = ") {
            attrs.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    blocks
        .into_iter()
        .map(|(id, attrs)| build_descriptor(id, &attrs, pbs_home))
        .collect()
}

fn build_descriptor(id: String, attrs: &[(String, String)], pbs_home: &Path) -> SchedulerDescriptor {
    let attr = |name: &str| {
        attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };

    if id == SchedulerDescriptor::DEFAULT_ID {
        let mut d = default_descriptor(pbs_home);
        d.partitions = attr("partition").map(|p| split_partitions(&p)).unwrap_or_default();
        d.host = attr("sched_host");
        d.port = attr("sched_port").and_then(|p| p.parse().ok());
        d.state = attr("state");
        return d;
    }

    let priv_dir = attr("sched_priv")
        .map(PathBuf::from)
        .unwrap_or_else(|| pbs_home.join(format!("{}_{}", DFLT_SCHED_PRIV_PATH, id)));
    let log_dir = attr("sched_log")
        .map(PathBuf::from)
        .unwrap_or_else(|| pbs_home.join(format!("{}_{}", DFLT_SCHED_LOGS_PATH, id)));
    let health = check_health(&priv_dir, &log_dir);

    SchedulerDescriptor {
        id,
        partitions: attr("partition").map(|p| split_partitions(&p)).unwrap_or_default(),
        priv_dir,
        log_dir,
        host: attr("sched_host"),
        port: attr("sched_port").and_then(|p| p.parse().ok()),
        state: attr("state"),
        health,
    }
}

fn default_descriptor(pbs_home: &Path) -> SchedulerDescriptor {
    let priv_dir = pbs_home.join(DFLT_SCHED_PRIV_PATH);
    let log_dir = pbs_home.join(DFLT_SCHED_LOGS_PATH);
    let health = check_health(&priv_dir, &log_dir);
    SchedulerDescriptor {
        id: SchedulerDescriptor::DEFAULT_ID.to_string(),
        partitions: Vec::new(),
        priv_dir,
        log_dir,
        host: None,
        port: None,
        state: None,
        health,
    }
}

fn split_partitions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn check_health(priv_dir: &Path, log_dir: &Path) -> DescriptorHealth {
    for dir in [priv_dir, log_dir] {
        if let Err(e) = fs::read_dir(dir) {
            return DescriptorHealth::Unreadable(format!("{}: {}", dir.display(), e));
        }
    }
    DescriptorHealth::Ready
}
