use async_trait::async_trait;
use log::info;

use crate::cluster::Daemon;
use crate::collectors::common::{skip_all, write_text};
use crate::collectors::system::process_table;
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::config::pbs_conf::COMM_KEYS;
use crate::constants::{keys, COMM_CONF_PATH, COMM_PROCESS_PATH};
use crate::models::{ArtifactKind, Category};

/// Communication relay topology and process state
pub struct CommCollector;

#[async_trait]
impl Collector for CommCollector {
    fn name(&self) -> &'static str {
        "comm"
    }

    fn category(&self) -> Category {
        Category::Comm
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        if !ctx.cluster.daemon_running(Daemon::Comm) {
            skip_all(
                sink,
                Category::Comm,
                &[keys::COMM_CONF, keys::COMM_PROCESS],
                "pbs_comm is not running",
            );
            return;
        }

        info!("Capturing comm information");
        let conf = comm_conf_text(ctx);
        match write_text(&ctx.root, COMM_CONF_PATH, &conf).await {
            Ok(()) => sink.captured(Category::Comm, keys::COMM_CONF, COMM_CONF_PATH, ArtifactKind::Text),
            Err(e) => sink.error(Category::Comm, keys::COMM_CONF, &e),
        }

        let table = process_table(Daemon::Comm.process_names()).await;
        match write_text(&ctx.root, COMM_PROCESS_PATH, &table).await {
            Ok(()) => sink.captured(
                Category::Comm,
                keys::COMM_PROCESS,
                COMM_PROCESS_PATH,
                ArtifactKind::Text,
            ),
            Err(e) => sink.error(Category::Comm, keys::COMM_PROCESS, &e),
        }
    }
}

/// Comm-related pbs.conf entries, one `KEY=VALUE` per line
fn comm_conf_text(ctx: &CaptureContext) -> String {
    let layout = ctx.cluster.layout();
    let mut text = String::new();
    for key in COMM_KEYS {
        if let Some(value) = layout.entries.get(*key) {
            text.push_str(&format!("{}={}\n", key, value));
        }
    }
    if text.is_empty() {
        text.push_str("# no comm settings in pbs.conf; defaults apply\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{MockClusterInterface, PbsLayout};
    use crate::collectors::test_context;
    use crate::models::ItemStatus;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_comm_conf_entries() {
        let out = TempDir::new().unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("PBS_START_COMM".to_string(), "1".to_string());
        entries.insert("PBS_LEAF_ROUTERS".to_string(), "r1,r2".to_string());
        entries.insert("PBS_EXEC".to_string(), "/opt/pbs".to_string());

        let mut mock = MockClusterInterface::new();
        mock.expect_daemon_running().return_const(true);
        mock.expect_layout()
            .return_const(PbsLayout::from_entries(Path::new("/etc/pbs.conf"), entries));

        let ctx = test_context(mock, out.path());
        let sink = ItemSink::new("comm");
        CommCollector.collect(&ctx, &sink).await;

        assert_eq!(sink.len(), 2);
        let conf = std::fs::read_to_string(out.path().join(COMM_CONF_PATH)).unwrap();
        assert!(conf.contains("PBS_START_COMM=1\n"));
        assert!(conf.contains("PBS_LEAF_ROUTERS=r1,r2\n"));
        assert!(!conf.contains("PBS_EXEC"));
    }

    #[tokio::test]
    async fn test_comm_down() {
        let out = TempDir::new().unwrap();
        let mut mock = MockClusterInterface::new();
        mock.expect_daemon_running().return_const(false);

        let ctx = test_context(mock, out.path());
        let sink = ItemSink::new("comm");
        CommCollector.collect(&ctx, &sink).await;

        let items = sink.into_items();
        assert!(items.iter().all(|i| i.status == ItemStatus::Skipped));
        assert!(!out.path().join("comm").exists());
    }
}
