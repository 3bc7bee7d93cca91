use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::cluster::{Daemon, HostCommand, ToolDir};
use crate::collectors::common::write_text;
use crate::collectors::permission_tracker::REQUIRES_ROOT;
use crate::collectors::{CaptureContext, Collector, ItemSink};
use crate::constants::{keys, CORE_DIR};
use crate::discovery::Discovery;
use crate::models::{ArtifactKind, Category};

/// Backtraces of daemon core files, best-effort
pub struct CoreDumpCollector;

/// Core files left in a daemon's private directory
pub fn find_core_files(dir: &Path) -> Vec<PathBuf> {
    let mut cores: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name == "core" || name.starts_with("core.")
        })
        .map(|e| e.into_path())
        .collect();
    cores.sort();
    cores
}

impl CoreDumpCollector {
    fn search_dirs(ctx: &CaptureContext) -> Vec<(Daemon, PathBuf)> {
        let layout = ctx.cluster.layout();
        let mut dirs = vec![
            (Daemon::Server, layout.home_path("server_priv")),
            (Daemon::Mom, layout.home_path("mom_priv")),
        ];

        let fallback;
        let discovery = match &ctx.discovery {
            Some(d) => d.as_ref(),
            None => {
                fallback = Discovery::default_only(layout);
                &fallback
            }
        };
        for d in &discovery.descriptors {
            dirs.push((Daemon::Scheduler, d.priv_dir.clone()));
        }
        dirs
    }
}

#[async_trait]
impl Collector for CoreDumpCollector {
    fn name(&self) -> &'static str {
        "core_dump"
    }

    fn category(&self) -> Category {
        Category::Core
    }

    async fn collect(&self, ctx: &CaptureContext, sink: &ItemSink) {
        if !ctx.elevated {
            sink.skipped(Category::Core, keys::CORE_FILE_BT, REQUIRES_ROOT);
            return;
        }

        let mut written = 0;
        let mut found = 0;
        for (daemon, dir) in Self::search_dirs(ctx) {
            for core in find_core_files(&dir) {
                found += 1;
                let exe = ctx
                    .cluster
                    .layout()
                    .tool_path(daemon.executable(), ToolDir::Sbin);
                let core_name = core
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "core".to_string());
                info!("Extracting backtrace from {}", core.display());

                let args = vec![
                    exe.display().to_string(),
                    core.display().to_string(),
                ];
                let output = match ctx.cluster.host_command(HostCommand::GdbBacktrace, args).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!("Backtrace of {} failed: {}", core.display(), e);
                        continue;
                    }
                };

                let rel = format!("{}/{}_{}.out", CORE_DIR, daemon, core_name);
                match write_text(&ctx.root, &rel, &output).await {
                    Ok(()) => written += 1,
                    Err(e) => warn!("Failed to write {}: {}", rel, e),
                }
            }
        }

        debug!("{} core file(s) found, {} backtrace(s) written", found, written);
        if written > 0 {
            sink.captured(Category::Core, keys::CORE_FILE_BT, CORE_DIR, ArtifactKind::Directory);
        } else if found == 0 {
            sink.skipped(Category::Core, keys::CORE_FILE_BT, "no core files found");
        } else {
            sink.skipped(
                Category::Core,
                keys::CORE_FILE_BT,
                format!("none of {} core file(s) could be symbolized", found),
            );
        }
    }
}
