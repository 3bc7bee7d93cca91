//! Host-level facts.
//!
//! Portable facts come from the sysinfo crate and are stored as JSON.
//! Linux-only facts come from host files and commands; on other platforms
//! they are recorded as skipped without being attempted.

pub mod host;
pub mod models;

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};
use serde::Serialize;

use crate::cluster::{AdminCommand, HostCommand};
use crate::collectors::common::{capture_file, capture_query, write_text};
use crate::collectors::permission_tracker::REQUIRES_ROOT;
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::*;
use crate::error::SnapshotError;
use crate::models::{ArtifactKind, Category};

pub use host::{render_process_table, HostSampler};

const LINUX_ONLY_KEYS: &[&str] = &[
    keys::ETC_HOSTS,
    keys::ETC_NSSWITCH_CONF,
    keys::LSOF_PBS,
    keys::VMSTAT,
    keys::DF_H,
    keys::DMESG,
];

/// Process listing for the given process names
pub async fn process_table(names: &'static [&'static str]) -> String {
    tokio::task::spawn_blocking(move || {
        let sampler = HostSampler::new();
        render_process_table(&sampler.processes_named(names))
    })
    .await
    .unwrap_or_else(|e| format!("# process sampling failed: {}\n", e))
}

pub struct SystemCollector;

impl SystemCollector {
    async fn capture_json<T: Serialize>(
        ctx: &CaptureContext,
        sink: &ItemSink,
        key: &str,
        rel: &str,
        data: &T,
    ) {
        let result = match serde_json::to_string_pretty(data) {
            Ok(json) => write_text(&ctx.root, rel, &json).await,
            Err(e) => Err(SnapshotError::Io(e.into())),
        };
        match result {
            Ok(()) => sink.captured(Category::System, key, rel, ArtifactKind::Text),
            Err(e) => sink.error(Category::System, key, &e),
        }
    }

    async fn capture_host_command(
        ctx: &CaptureContext,
        sink: &ItemSink,
        key: &str,
        command: HostCommand,
        rel: &str,
    ) {
        match ctx.cluster.host_command(command, Vec::new()).await {
            Ok(output) => match write_text(&ctx.root, rel, &output).await {
                Ok(()) => sink.captured(Category::System, key, rel, ArtifactKind::Text),
                Err(e) => sink.error(Category::System, key, &e),
            },
            Err(e) => sink.error(Category::System, key, &SnapshotError::from(e)),
        }
    }

    async fn capture_sysinfo(ctx: &CaptureContext, sink: &ItemSink) {
        let sample = tokio::task::spawn_blocking(|| {
            let sampler = HostSampler::new();
            (
                sampler.os_info(),
                sampler.pbs_processes(),
                sampler.memory(),
                sampler.disks(),
            )
        })
        .await;

        let (os, processes, memory, disks) = match sample {
            Ok(sample) => sample,
            Err(e) => {
                let reason = format!("host sampling failed: {}", e);
                for key in [keys::OS_INFO, keys::PROCESS_INFO, keys::MEMORY_INFO, keys::DISK_INFO] {
                    sink.failed(Category::System, key, reason.clone());
                }
                return;
            }
        };

        Self::capture_json(ctx, sink, keys::OS_INFO, OS_INFO_PATH, &os).await;
        match write_text(&ctx.root, PROCESS_INFO_PATH, &render_process_table(&processes)).await {
            Ok(()) => sink.captured(
                Category::System,
                keys::PROCESS_INFO,
                PROCESS_INFO_PATH,
                ArtifactKind::Text,
            ),
            Err(e) => sink.error(Category::System, keys::PROCESS_INFO, &e),
        }
        Self::capture_json(ctx, sink, keys::MEMORY_INFO, MEMORY_INFO_PATH, &memory).await;
        Self::capture_json(ctx, sink, keys::DISK_INFO, DISK_INFO_PATH, &disks).await;
    }

    async fn capture_linux(ctx: &CaptureContext, sink: &ItemSink) {
        capture_file(
            ctx,
            sink,
            Category::System,
            keys::ETC_HOSTS,
            PathBuf::from("/etc/hosts"),
            ETC_HOSTS_PATH,
        )
        .await;
        capture_file(
            ctx,
            sink,
            Category::System,
            keys::ETC_NSSWITCH_CONF,
            PathBuf::from("/etc/nsswitch.conf"),
            ETC_NSSWITCH_CONF_PATH,
        )
        .await;

        Self::capture_host_command(ctx, sink, keys::LSOF_PBS, HostCommand::LsofPbs, LSOF_PBS_PATH)
            .await;
        Self::capture_host_command(ctx, sink, keys::VMSTAT, HostCommand::Vmstat, VMSTAT_PATH).await;
        Self::capture_host_command(ctx, sink, keys::DF_H, HostCommand::DfH, DF_H_PATH).await;

        if ctx.elevated {
            Self::capture_host_command(ctx, sink, keys::DMESG, HostCommand::Dmesg, DMESG_PATH)
                .await;
        } else {
            sink.skipped(Category::System, keys::DMESG, REQUIRES_ROOT);
        }
    }
}

#[async_trait]
impl Collector for SystemCollector {
    fn name(&self) -> &'static str {
        "system"
    }

    fn category(&self) -> Category {
        Category::System
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        info!("Capturing host information");
        Self::capture_sysinfo(ctx, sink).await;

        let env = ctx.cluster.layout().home_path("pbs_environment");
        capture_file(ctx, sink, Category::System, keys::PBS_ENV, env, PBS_ENV_PATH).await;

        capture_query(
            ctx,
            sink,
            Category::System,
            keys::PBS_PROBE,
            AdminCommand::PbsProbe,
            PBS_PROBE_PATH,
        )
        .await;
        capture_query(
            ctx,
            sink,
            Category::System,
            keys::PBS_HOSTN,
            AdminCommand::PbsHostn,
            PBS_HOSTN_PATH,
        )
        .await;

        if ctx.platform.is_linux() {
            Self::capture_linux(ctx, sink).await;
        } else {
            debug!("Skipping Linux-only host facts");
            for key in LINUX_ONLY_KEYS {
                sink.skipped(Category::System, key, "not supported on this platform");
            }
        }
    }
}
