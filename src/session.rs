//! Capture orchestration.
//!
//! A [`SnapshotSession`] owns the snapshot directory and the [`Registry`].
//! It runs discovery as a barrier, fans collectors out concurrently, then
//! obfuscates, writes the manifest and archives in [`SnapshotSession::finalize`].
//! Dropping a session that was never finalized removes its directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use futures::future::join_all;
use log::{debug, info, warn};

use crate::cluster::layout::local_hostname;
use crate::cluster::{AdminCommand, ClusterInterface, Daemon};
use crate::collectors::{
    CaptureContext, CommCollector, Collector, CoreDumpCollector, DatastoreCollector, ItemSink,
    LogsCollector, MetaCollector, ObjectCollector, ObjectKind, PermissionTracker,
    SchedulerCollector, SchedulerMode, ServerCollector, SystemCollector,
};
use crate::config::SessionOptions;
use crate::discovery::{discover, Discovery};
use crate::error::SnapshotError;
use crate::models::{Category, CollectedItem};
use crate::obfuscate::Obfuscator;
use crate::privileges::{announce_privileges, is_elevated};
use crate::registry::Registry;
use crate::utils::archive::{create_archive, snapshot_name, unique_snapshot_name, Archive};
use crate::utils::manifest::write_snapshot_manifest;

/// One capture run, from `open` to `finalize`
pub struct SnapshotSession {
    options: SessionOptions,
    elevated: bool,
    cluster: Arc<dyn ClusterInterface>,
    registry: Registry,
    out_dir: PathBuf,
    root: PathBuf,
    dir_name: String,
    started: DateTime<Local>,
    discovery: Option<Arc<Discovery>>,
    finalized: bool,
}

impl SnapshotSession {
    /// Validate the output directory and create the snapshot directory.
    ///
    /// Fails before writing anything when the output directory is unusable,
    /// or when nothing could be captured: not elevated, server down and
    /// `PBS_HOME` unreadable.
    pub fn open(
        options: SessionOptions,
        cluster: Arc<dyn ClusterInterface>,
    ) -> Result<Self, SnapshotError> {
        let out_dir = preflight_out_dir(&options.out_dir)?;

        let elevated = options.elevated.unwrap_or_else(is_elevated);
        announce_privileges(elevated);

        if !elevated
            && !cluster.daemon_running(Daemon::Server)
            && !cluster.layout().home_readable()
        {
            return Err(SnapshotError::NothingCapturable(format!(
                "not running as root, pbs_server is down and {} is unreadable",
                cluster.layout().pbs_home.display()
            )));
        }

        let started = Local::now();
        let dir_name = unique_snapshot_name(&out_dir, &snapshot_name(started));
        let root = out_dir.join(&dir_name);
        fs::create_dir(&root).map_err(|e| SnapshotError::OutputDirectory {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        info!("Snapshot directory created at {}", root.display());

        Ok(Self {
            options,
            elevated,
            cluster,
            registry: Registry::new(),
            out_dir,
            root,
            dir_name,
            started,
            discovery: None,
            finalized: false,
        })
    }

    /// Snapshot directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    pub fn elevated(&self) -> bool {
        self.elevated
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn discovery(&self) -> Option<&Discovery> {
        self.discovery.as_deref()
    }

    /// Server state only; everything lands under `server/`
    pub async fn capture_server(
        &mut self,
        with_queues: bool,
        extended: bool,
    ) -> Result<PathBuf, SnapshotError> {
        info!("Capturing server information");
        let server_reachable = self.check_server().await;
        let collectors: Vec<Box<dyn Collector>> =
            vec![Box::new(ServerCollector::new(with_queues, extended))];
        self.run_collectors(collectors, self.discovery.clone(), server_reachable)
            .await;
        Ok(self.root.clone())
    }

    /// Daemon, accounting and scheduler logs of running daemons.
    ///
    /// Discovery failure is not fatal here: the default scheduler is used.
    pub async fn capture_pbs_logs(&mut self) -> Result<PathBuf, SnapshotError> {
        info!("Capturing PBS logs");
        let discovery = match &self.discovery {
            Some(d) => Arc::clone(d),
            None => match discover(self.cluster.as_ref()).await {
                Ok(d) => {
                    let d = Arc::new(d);
                    self.discovery = Some(Arc::clone(&d));
                    d
                }
                Err(e) => {
                    warn!("{}; capturing default scheduler logs only", e);
                    Arc::new(Discovery::default_only(self.cluster.layout()))
                }
            },
        };

        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(LogsCollector),
            Box::new(SchedulerCollector::new(SchedulerMode::LogsOnly)),
        ];
        self.run_collectors(collectors, Some(discovery), false).await;
        Ok(self.root.clone())
    }

    /// Discovery, then every collector concurrently
    pub async fn capture_all(&mut self) -> Result<PathBuf, SnapshotError> {
        let discovery = Arc::new(discover(self.cluster.as_ref()).await?);
        self.discovery = Some(Arc::clone(&discovery));
        let server_reachable = self.check_server().await;

        let mut collectors: Vec<Box<dyn Collector>> =
            vec![Box::new(ServerCollector::new(true, true))];
        for kind in ObjectKind::ALL {
            collectors.push(Box::new(ObjectCollector::new(kind)));
        }
        let local: Vec<Box<dyn Collector>> = vec![
            Box::new(CommCollector),
            Box::new(DatastoreCollector),
            Box::new(SchedulerCollector::new(SchedulerMode::Full)),
            Box::new(LogsCollector),
            Box::new(SystemCollector),
            Box::new(CoreDumpCollector),
            Box::new(MetaCollector),
        ];
        collectors.extend(local);
        self.run_collectors(collectors, Some(discovery), server_reachable)
            .await;
        Ok(self.root.clone())
    }

    /// Whether the server answers `qstat -B`, wherever it runs
    async fn check_server(&self) -> bool {
        match self.cluster.query(AdminCommand::QstatB).await {
            Ok(_) => true,
            Err(e) if e.server_unreachable() => {
                warn!("{}; server queries will be skipped", e);
                false
            }
            Err(e) => {
                debug!("Server check: {}", e);
                true
            }
        }
    }

    fn context(&self, discovery: Option<Arc<Discovery>>, server_reachable: bool) -> CaptureContext {
        CaptureContext {
            root: self.root.clone(),
            cluster: Arc::clone(&self.cluster),
            daemon_logs: self.options.daemon_logs,
            accounting_logs: self.options.accounting_logs,
            elevated: self.elevated,
            platform: self.options.platform,
            discovery,
            server_reachable,
            include_own_log: self.options.include_own_log,
        }
    }

    /// Run collectors concurrently, each under the collector timeout, and
    /// merge their sinks into the registry.
    async fn run_collectors(
        &mut self,
        collectors: Vec<Box<dyn Collector>>,
        discovery: Option<Arc<Discovery>>,
        server_reachable: bool,
    ) {
        let ctx = self.context(discovery, server_reachable);
        let limit = self.options.collector_timeout;

        let runs = collectors.iter().map(|collector| {
            let ctx = &ctx;
            async move {
                let sink = ItemSink::new(collector.name());
                if tokio::time::timeout(limit, collector.collect(ctx, &sink))
                    .await
                    .is_err()
                {
                    warn!(
                        "Collector {} timed out after {}s",
                        collector.name(),
                        limit.as_secs()
                    );
                    sink.failed(
                        collector.category(),
                        &format!("{}_timeout", collector.name()),
                        format!("timed out after {}s", limit.as_secs()),
                    );
                }
                sink
            }
        });
        let sinks = join_all(runs).await;

        for sink in sinks {
            debug!("Merging {} item(s) from {}", sink.len(), sink.producer());
            for item in sink.into_items() {
                if let Err(e) = self.registry.register(item) {
                    warn!("{}", e);
                }
            }
        }
    }

    pub fn server_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Server)
    }

    pub fn job_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Job)
    }

    pub fn node_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Node)
    }

    pub fn comm_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Comm)
    }

    pub fn hook_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Hook)
    }

    pub fn sched_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Sched)
    }

    pub fn resv_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Resv)
    }

    pub fn datastore_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Datastore)
    }

    pub fn pbs_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::PbsInfo)
    }

    pub fn core_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::Core)
    }

    pub fn sys_info(&self) -> &BTreeMap<String, CollectedItem> {
        self.registry.category(Category::System)
    }

    /// Seal the registry, obfuscate if requested, write the manifest and
    /// archive the tree. The snapshot directory is kept next to the archive.
    pub fn finalize(mut self) -> Result<Archive, SnapshotError> {
        self.registry.seal();

        if self.options.obfuscate {
            info!("Obfuscating identifiers");
            match Obfuscator::scan(&self.root, &self.registry) {
                Ok(obfuscator) => {
                    let flagged = obfuscator.apply(&self.root, &mut self.registry);
                    if flagged > 0 {
                        warn!("{} artifact(s) could not be fully obfuscated", flagged);
                    }
                }
                Err(e) => warn!("{}; snapshot left unobfuscated", e),
            }
        }

        if let Err(e) = write_snapshot_manifest(
            &self.root,
            &local_hostname(),
            &self.started.to_rfc3339(),
            self.options.obfuscate,
            &self.registry,
        ) {
            warn!("Failed to write snapshot manifest: {:#}", e);
        }

        PermissionTracker::from_registry(&self.registry).report_failures();

        let archive = create_archive(&self.out_dir, &self.root)?;
        self.finalized = true;
        info!("Snapshot archived to {}", archive.path.display());
        Ok(archive)
    }
}

impl Drop for SnapshotSession {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        warn!("Session not finalized, removing {}", self.root.display());
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Failed to remove {}: {}", self.root.display(), e);
        }
    }
}

/// The output directory must exist and accept new entries
fn preflight_out_dir(out_dir: &Path) -> Result<PathBuf, SnapshotError> {
    let unusable = |reason: String| SnapshotError::OutputDirectory {
        path: out_dir.to_path_buf(),
        reason,
    };

    let abs = fs::canonicalize(out_dir).map_err(|e| unusable(e.to_string()))?;
    let metadata = fs::metadata(&abs).map_err(|e| unusable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    if metadata.permissions().readonly() {
        return Err(unusable("directory is read-only".to_string()));
    }
    Ok(abs)
}
