use async_trait::async_trait;
use log::info;

use crate::cluster::{AdminCommand, Daemon};
use crate::collectors::common::{capture_recent_logs, capture_server_queries};
use crate::collectors::permission_tracker::REQUIRES_ROOT;
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::{keys, DATASERVICE_STATUS_PATH, PG_LOGS_PATH};
use crate::models::Category;

/// Data service status and its recent logs
pub struct DatastoreCollector;

#[async_trait]
impl Collector for DatastoreCollector {
    fn name(&self) -> &'static str {
        "datastore"
    }

    fn category(&self) -> Category {
        Category::Datastore
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        info!("Capturing datastore information");
        capture_server_queries(
            ctx,
            sink,
            Category::Datastore,
            &[(
                keys::DATASERVICE_STATUS,
                AdminCommand::DataserviceStatus,
                DATASERVICE_STATUS_PATH,
            )],
        )
        .await;

        // The data service keeps its logs next to a local server
        if !ctx.cluster.daemon_running(Daemon::Server) {
            sink.skipped(Category::Datastore, keys::PG_LOGS, "pbs_server is not running here");
            return;
        }
        if !ctx.elevated {
            sink.skipped(Category::Datastore, keys::PG_LOGS, REQUIRES_ROOT);
            return;
        }
        let source = ctx.cluster.layout().home_path(PG_LOGS_PATH);
        capture_recent_logs(
            ctx,
            sink,
            Category::Datastore,
            keys::PG_LOGS,
            source,
            PG_LOGS_PATH,
            ctx.daemon_log_limit(),
        )
        .await;
    }
}
