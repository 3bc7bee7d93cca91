use async_trait::async_trait;
use log::info;

use crate::cluster::AdminCommand;
use crate::collectors::common::{capture_file, capture_server_queries};
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::*;
use crate::models::Category;

/// Server-managed object kinds captured purely through queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Job,
    Node,
    Reservation,
    Hook,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Job,
        ObjectKind::Node,
        ObjectKind::Reservation,
        ObjectKind::Hook,
    ];

    fn queries(&self) -> &'static [(&'static str, AdminCommand, &'static str)] {
        match self {
            ObjectKind::Job => &[
                (keys::QSTAT, AdminCommand::Qstat, QSTAT_PATH),
                (keys::QSTAT_F, AdminCommand::QstatF, QSTAT_F_PATH),
                (keys::QSTAT_T, AdminCommand::QstatT, QSTAT_T_PATH),
                (keys::QSTAT_X, AdminCommand::QstatX, QSTAT_X_PATH),
                (keys::QSTAT_NS, AdminCommand::QstatNs, QSTAT_NS_PATH),
                (keys::QSTAT_FX_DSV, AdminCommand::QstatFxDsv, QSTAT_FX_DSV_PATH),
            ],
            ObjectKind::Node => &[
                (keys::PBSNODES_VA, AdminCommand::PbsnodesVa, PBSNODES_VA_PATH),
                (keys::PBSNODES_A, AdminCommand::PbsnodesA, PBSNODES_A_PATH),
                (keys::PBSNODES_AVSJ, AdminCommand::PbsnodesAvSj, PBSNODES_AVSJ_PATH),
                (keys::PBSNODES_ASJ, AdminCommand::PbsnodesASj, PBSNODES_ASJ_PATH),
                (keys::PBSNODES_AFDSV, AdminCommand::PbsnodesAFdsv, PBSNODES_AFDSV_PATH),
                (keys::QMGR_PN, AdminCommand::QmgrPrintNodes, QMGR_PN_PATH),
            ],
            ObjectKind::Reservation => &[
                (keys::PBS_RSTAT, AdminCommand::PbsRstat, PBS_RSTAT_PATH),
                (keys::PBS_RSTAT_F, AdminCommand::PbsRstatF, PBS_RSTAT_F_PATH),
            ],
            ObjectKind::Hook => &[
                (keys::QMGR_PH, AdminCommand::QmgrPrintHooks, QMGR_PH_PATH),
                (keys::QMGR_LPBSHOOK, AdminCommand::QmgrListPbsHooks, QMGR_LPBSHOOK_PATH),
            ],
        }
    }
}

/// Job, node, reservation or hook state from the server
pub struct ObjectCollector {
    kind: ObjectKind,
}

impl ObjectCollector {
    pub fn new(kind: ObjectKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Collector for ObjectCollector {
    fn name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Job => "job",
            ObjectKind::Node => "node",
            ObjectKind::Reservation => "reservation",
            ObjectKind::Hook => "hook",
        }
    }

    fn category(&self) -> Category {
        match self.kind {
            ObjectKind::Job => Category::Job,
            ObjectKind::Node => Category::Node,
            ObjectKind::Reservation => Category::Resv,
            ObjectKind::Hook => Category::Hook,
        }
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        let category = self.category();
        if ctx.server_reachable {
            info!("Capturing {} information", self.name());
        }
        capture_server_queries(ctx, sink, category, self.kind.queries()).await;

        // The MoM configuration is a local file and does not need the server
        if self.kind == ObjectKind::Node {
            let source = ctx.cluster.layout().home_path(MOM_CONFIG_PATH);
            capture_file(ctx, sink, category, keys::MOM_CONFIG, source, MOM_CONFIG_PATH).await;
        }
    }
}
