use async_trait::async_trait;
use log::{info, warn};

use crate::cluster::Daemon;
use crate::collectors::common::{capture_recent_logs, capture_tree, write_text};
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::{keys, QMGR_LSCHED_PATH};
use crate::discovery::Discovery;
use crate::models::{ArtifactKind, Category, DescriptorHealth, SchedulerDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Listing, private directories and logs
    Full,
    /// Logs only, for log capture
    LogsOnly,
}

/// Per-instance scheduler state for every discovered scheduler
pub struct SchedulerCollector {
    mode: SchedulerMode,
}

impl SchedulerCollector {
    pub fn new(mode: SchedulerMode) -> Self {
        Self { mode }
    }

    /// A scheduler counts as running unless the server lists it as down;
    /// without a listed state, the local process decides.
    fn is_running(ctx: &CaptureContext, descriptor: &SchedulerDescriptor) -> bool {
        match descriptor.listed_down() {
            Some(down) => !down,
            None => ctx.cluster.daemon_running(Daemon::Scheduler),
        }
    }

    async fn capture_listing(&self, ctx: &CaptureContext, sink: &ItemSink, discovery: &Discovery) {
        let Some(text) = discovery.listing_text() else {
            sink.skipped(Category::Sched, keys::QMGR_LSCHED, "scheduler listing unavailable");
            return;
        };
        match write_text(&ctx.root, QMGR_LSCHED_PATH, &text).await {
            Ok(()) => sink.captured(
                Category::Sched,
                keys::QMGR_LSCHED,
                QMGR_LSCHED_PATH,
                ArtifactKind::Text,
            ),
            Err(e) => sink.error(Category::Sched, keys::QMGR_LSCHED, &e),
        }
    }

    async fn capture_instance(
        &self,
        ctx: &CaptureContext,
        sink: &ItemSink,
        descriptor: &SchedulerDescriptor,
    ) {
        let priv_name = descriptor.priv_artifact_name();
        let logs_name = descriptor.logs_artifact_name();

        if let DescriptorHealth::Unreadable(reason) = &descriptor.health {
            if self.mode == SchedulerMode::Full {
                sink.skipped(Category::Sched, &priv_name, reason.clone());
            }
            sink.skipped(Category::Sched, &logs_name, reason.clone());
            return;
        }

        if self.mode == SchedulerMode::Full {
            capture_tree(
                ctx,
                sink,
                Category::Sched,
                &priv_name,
                descriptor.priv_dir.clone(),
                &priv_name,
            )
            .await;
        }

        if Self::is_running(ctx, descriptor) {
            capture_recent_logs(
                ctx,
                sink,
                Category::Sched,
                &logs_name,
                descriptor.log_dir.clone(),
                &logs_name,
                ctx.daemon_log_limit(),
            )
            .await;
        } else {
            sink.skipped(
                Category::Sched,
                &logs_name,
                format!("scheduler {} is not running", descriptor.id),
            );
        }
    }
}

#[async_trait]
impl Collector for SchedulerCollector {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn category(&self) -> Category {
        Category::Sched
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        let fallback;
        let discovery = match &ctx.discovery {
            Some(d) => d.as_ref(),
            None => {
                warn!("No discovery result, capturing the default scheduler only");
                fallback = Discovery::default_only(ctx.cluster.layout());
                &fallback
            }
        };

        info!("Capturing {} scheduler(s)", discovery.descriptors.len());
        if self.mode == SchedulerMode::Full {
            self.capture_listing(ctx, sink, discovery).await;
        }
        for descriptor in &discovery.descriptors {
            self.capture_instance(ctx, sink, descriptor).await;
        }
    }
}
