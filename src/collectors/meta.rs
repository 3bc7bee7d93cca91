use async_trait::async_trait;
use chrono::Local;
use log::info;

use crate::cluster::AdminCommand;
use crate::collectors::common::{capture_file, capture_query, write_text};
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::{keys, CTIME_PATH, PBS_CONF_PATH, PBS_VERSION_PATH, SNAPSHOT_LOG_FILE};
use crate::models::{ArtifactKind, Category};

/// Installation metadata: pbs.conf, capture time, version
pub struct MetaCollector;

#[async_trait]
impl Collector for MetaCollector {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn category(&self) -> Category {
        Category::PbsInfo
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        info!("Capturing PBS metadata");

        let conf = ctx.cluster.layout().conf_path.clone();
        capture_file(ctx, sink, Category::PbsInfo, keys::PBS_CONF, conf, PBS_CONF_PATH).await;

        let now = Local::now();
        let ctime = format!("{}\n{}\n", now.format("%a %b %e %H:%M:%S %Y"), now.timestamp());
        match write_text(&ctx.root, CTIME_PATH, &ctime).await {
            Ok(()) => sink.captured(Category::PbsInfo, keys::CTIME, CTIME_PATH, ArtifactKind::Text),
            Err(e) => sink.error(Category::PbsInfo, keys::CTIME, &e),
        }

        capture_query(
            ctx,
            sink,
            Category::PbsInfo,
            keys::PBS_VERSION,
            AdminCommand::PbsVersion,
            PBS_VERSION_PATH,
        )
        .await;

        if ctx.include_own_log {
            sink.captured(
                Category::PbsInfo,
                keys::SNAPSHOT_LOG,
                SNAPSHOT_LOG_FILE,
                ArtifactKind::Text,
            );
        }
    }
}
