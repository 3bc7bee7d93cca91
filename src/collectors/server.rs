use async_trait::async_trait;
use log::info;

use crate::cluster::AdminCommand;
use crate::collectors::common::{capture_file, capture_server_queries, SERVER_UNREACHABLE};
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::*;
use crate::models::Category;

/// Server configuration and, optionally, queues and extended settings.
///
/// Writes only under `server/`; server logs belong to the log collector.
pub struct ServerCollector {
    pub with_queues: bool,
    pub extended: bool,
}

impl ServerCollector {
    pub fn new(with_queues: bool, extended: bool) -> Self {
        Self {
            with_queues,
            extended,
        }
    }

    fn queries(&self) -> Vec<(&'static str, AdminCommand, &'static str)> {
        let mut queries = vec![
            (keys::QSTAT_B, AdminCommand::QstatB, QSTAT_B_PATH),
            (keys::QSTAT_BF, AdminCommand::QstatBf, QSTAT_BF_PATH),
        ];
        if self.with_queues {
            queries.push((keys::QSTAT_Q, AdminCommand::QstatQ, QSTAT_Q_PATH));
            queries.push((keys::QSTAT_QF, AdminCommand::QstatQf, QSTAT_QF_PATH));
        }
        if self.extended {
            queries.push((keys::QMGR_PS, AdminCommand::QmgrPrintServer, QMGR_PS_PATH));
            queries.push((keys::QMGR_PR, AdminCommand::QmgrPrintResources, QMGR_PR_PATH));
        }
        queries
    }
}

#[async_trait]
impl Collector for ServerCollector {
    fn name(&self) -> &'static str {
        "server"
    }

    fn category(&self) -> Category {
        Category::Server
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        if ctx.server_reachable {
            info!("Capturing server information");
        }
        capture_server_queries(ctx, sink, Category::Server, &self.queries()).await;

        if self.extended {
            if !ctx.server_reachable {
                sink.skipped(Category::Server, keys::RSCDEF, SERVER_UNREACHABLE);
                return;
            }
            let source = ctx.cluster.layout().home_path("server_priv/resourcedef");
            capture_file(ctx, sink, Category::Server, keys::RSCDEF, source, RSCDEF_PATH).await;
        }
    }
}
