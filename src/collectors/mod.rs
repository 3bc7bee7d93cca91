//! Collectors, one per information category.
//!
//! Every collector receives the shared [`CaptureContext`] and its own
//! [`ItemSink`]. It records exactly one item per artifact it is responsible
//! for, whether the artifact was captured, skipped, or failed. Collector-local
//! errors never escape `collect`: they become item statuses.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             SnapshotSession             │
//! ├─────────────────────────────────────────┤
//! │   discovery (barrier) → join_all(...)   │
//! │  ┌────────┬──────┬──────┬───────────┐   │
//! │  │ server │ job  │ node │ resv/hook │   │
//! │  ├────────┼──────┼──────┼───────────┤   │
//! │  │ comm   │ data │ sched│ logs      │   │
//! │  ├────────┼──────┼──────┼───────────┤   │
//! │  │ system │ core │ meta │           │   │
//! │  └────────┴──────┴──────┴───────────┘   │
//! ├─────────────────────────────────────────┤
//! │        ItemSink → Registry merge        │
//! └─────────────────────────────────────────┘
//! ```

pub mod common;
pub mod comm;
pub mod core_dump;
pub mod datastore;
pub mod logs;
pub mod meta;
pub mod objects;
pub mod permission_tracker;
pub mod scheduler;
pub mod server;
pub mod system;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;

use crate::cluster::ClusterInterface;
use crate::config::{LogCount, Platform};
use crate::constants::{DEFAULT_ACCOUNTING_LOGS, DEFAULT_DAEMON_LOGS};
use crate::discovery::Discovery;
use crate::error::SnapshotError;
use crate::models::{ArtifactKind, Category, CollectedItem, ItemStatus};

pub use comm::CommCollector;
pub use core_dump::CoreDumpCollector;
pub use datastore::DatastoreCollector;
pub use logs::LogsCollector;
pub use meta::MetaCollector;
pub use objects::{ObjectCollector, ObjectKind};
pub use permission_tracker::PermissionTracker;
pub use scheduler::{SchedulerCollector, SchedulerMode};
pub use server::ServerCollector;
pub use system::SystemCollector;

/// Read-only state shared by every collector in one fan-out
#[derive(Clone)]
pub struct CaptureContext {
    /// Snapshot root; every artifact path is relative to it
    pub root: PathBuf,
    pub cluster: Arc<dyn ClusterInterface>,
    pub daemon_logs: LogCount,
    pub accounting_logs: LogCount,
    pub elevated: bool,
    pub platform: Platform,
    pub discovery: Option<Arc<Discovery>>,
    /// The server answered `qstat -B` before the fan-out
    pub server_reachable: bool,
    /// The CLI is writing its own log into the tree
    pub include_own_log: bool,
}

impl CaptureContext {
    pub fn daemon_log_limit(&self) -> Option<usize> {
        self.daemon_logs.resolve(DEFAULT_DAEMON_LOGS)
    }

    pub fn accounting_log_limit(&self) -> Option<usize> {
        self.accounting_logs.resolve(DEFAULT_ACCOUNTING_LOGS)
    }

    pub fn dest(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }
}

/// A collector's handle onto the registry.
///
/// Items are buffered here and merged by the session once the collector
/// has returned or timed out, so whatever was recorded before a timeout
/// survives.
#[derive(Debug)]
pub struct ItemSink {
    producer: String,
    items: Mutex<Vec<CollectedItem>>,
}

impl ItemSink {
    pub fn new(producer: &str) -> Self {
        Self {
            producer: producer.to_string(),
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn record(&self, item: CollectedItem) {
        debug!(
            "[{}] {}/{}: {:?}",
            self.producer, item.category, item.key, item.status
        );
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.push(item);
    }

    pub fn captured(&self, category: Category, key: &str, rel: impl Into<PathBuf>, kind: ArtifactKind) {
        self.record(CollectedItem::captured(category, key, rel, kind, &self.producer));
    }

    pub fn skipped(&self, category: Category, key: &str, reason: impl Into<String>) {
        self.record(CollectedItem::absent(
            category,
            key,
            ItemStatus::Skipped,
            reason,
            &self.producer,
        ));
    }

    pub fn failed(&self, category: Category, key: &str, reason: impl Into<String>) {
        self.record(CollectedItem::absent(
            category,
            key,
            ItemStatus::Failed,
            reason,
            &self.producer,
        ));
    }

    /// Record a collector-local error with the status it maps to
    pub fn error(&self, category: Category, key: &str, err: &SnapshotError) {
        self.record(CollectedItem::absent(
            category,
            key,
            err.item_status(),
            err.to_string(),
            &self.producer,
        ));
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<CollectedItem> {
        self.items.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// One category's capture logic
#[async_trait]
pub trait Collector: Send + Sync {
    /// Producer name recorded on every item
    fn name(&self) -> &'static str;

    /// Category that receives the timeout marker
    fn category(&self) -> Category;

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink);
}

#[cfg(test)]
pub(crate) fn test_context(
    cluster: crate::cluster::MockClusterInterface,
    root: &Path,
) -> CaptureContext {
    CaptureContext {
        root: root.to_path_buf(),
        cluster: Arc::new(cluster),
        daemon_logs: LogCount::Unset,
        accounting_logs: LogCount::Unset,
        elevated: true,
        platform: Platform::Linux,
        discovery: None,
        server_reachable: true,
        include_own_log: false,
    }
}
