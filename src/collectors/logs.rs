use async_trait::async_trait;
use log::info;

use crate::cluster::Daemon;
use crate::collectors::common::capture_recent_logs;
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::{keys, ACCT_LOGS_PATH, COMM_LOGS_PATH, MOM_LOGS_PATH, SVR_LOGS_PATH};
use crate::models::Category;

/// A log directory owned by one daemon
struct LogSource {
    daemon: Daemon,
    category: Category,
    key: &'static str,
    /// Relative to both `PBS_HOME` and the snapshot root
    rel: &'static str,
    accounting: bool,
}

const LOG_SOURCES: &[LogSource] = &[
    LogSource {
        daemon: Daemon::Server,
        category: Category::Server,
        key: keys::SVR_LOGS,
        rel: SVR_LOGS_PATH,
        accounting: false,
    },
    LogSource {
        daemon: Daemon::Server,
        category: Category::Server,
        key: keys::ACCT_LOGS,
        rel: ACCT_LOGS_PATH,
        accounting: true,
    },
    LogSource {
        daemon: Daemon::Mom,
        category: Category::Node,
        key: keys::MOM_LOGS,
        rel: MOM_LOGS_PATH,
        accounting: false,
    },
    LogSource {
        daemon: Daemon::Comm,
        category: Category::Comm,
        key: keys::COMM_LOGS,
        rel: COMM_LOGS_PATH,
        accounting: false,
    },
];

/// Daemon and accounting logs for the daemons running on this host
pub struct LogsCollector;

#[async_trait]
impl Collector for LogsCollector {
    fn name(&self) -> &'static str {
        "logs"
    }

    fn category(&self) -> Category {
        Category::Server
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        for source in LOG_SOURCES {
            if !ctx.cluster.daemon_running(source.daemon) {
                sink.skipped(
                    source.category,
                    source.key,
                    format!("{} is not running", source.daemon),
                );
                continue;
            }

            let limit = if source.accounting {
                ctx.accounting_log_limit()
            } else {
                ctx.daemon_log_limit()
            };
            info!("Capturing {} ({} most recent)", source.rel, limit.unwrap_or(0));

            let from = ctx.cluster.layout().home_path(source.rel);
            capture_recent_logs(ctx, sink, source.category, source.key, from, source.rel, limit)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{MockClusterInterface, PbsLayout};
    use crate::collectors::test_context;
    use crate::config::LogCount;
    use crate::models::ItemStatus;
    use std::fs;
    use tempfile::TempDir;

    fn fake_home() -> TempDir {
        let home = TempDir::new().unwrap();
        for rel in [SVR_LOGS_PATH, ACCT_LOGS_PATH, MOM_LOGS_PATH, COMM_LOGS_PATH] {
            let dir = home.path().join(rel);
            fs::create_dir_all(&dir).unwrap();
            for day in 1..=8 {
                fs::write(dir.join(format!("202401{:02}", day)), "entry").unwrap();
            }
        }
        home
    }

    #[tokio::test]
    async fn test_only_running_daemons_get_subtrees() {
        let home = fake_home();
        let out = TempDir::new().unwrap();
        let mut mock = MockClusterInterface::new();
        mock.expect_daemon_running()
            .returning(|d| d == Daemon::Server);
        mock.expect_layout()
            .return_const(PbsLayout::with_dirs(home.path(), "/opt/pbs"));

        let mut ctx = test_context(mock, out.path());
        ctx.daemon_logs = LogCount::from_count(2);
        let sink = ItemSink::new("logs");
        LogsCollector.collect(&ctx, &sink).await;

        assert_eq!(fs::read_dir(out.path().join(SVR_LOGS_PATH)).unwrap().count(), 2);
        // Accounting falls back to its default of 30, capped by what exists
        assert_eq!(fs::read_dir(out.path().join(ACCT_LOGS_PATH)).unwrap().count(), 8);
        assert!(!out.path().join(MOM_LOGS_PATH).exists());
        assert!(!out.path().join(COMM_LOGS_PATH).exists());

        let items = sink.into_items();
        let mom = items.iter().find(|i| i.key == keys::MOM_LOGS).unwrap();
        assert_eq!(mom.status, ItemStatus::Skipped);
        assert_eq!(mom.category, Category::Node);
    }

    #[tokio::test]
    async fn test_zero_counts_create_no_directories() {
        let home = fake_home();
        let out = TempDir::new().unwrap();
        let mut mock = MockClusterInterface::new();
        mock.expect_daemon_running().return_const(true);
        mock.expect_layout()
            .return_const(PbsLayout::with_dirs(home.path(), "/opt/pbs"));

        let mut ctx = test_context(mock, out.path());
        ctx.daemon_logs = LogCount::Zero;
        ctx.accounting_logs = LogCount::Zero;
        let sink = ItemSink::new("logs");
        LogsCollector.collect(&ctx, &sink).await;

        assert!(fs::read_dir(out.path()).unwrap().next().is_none());
        assert!(sink.into_items().iter().all(|i| i.status == ItemStatus::Skipped));
    }
}
