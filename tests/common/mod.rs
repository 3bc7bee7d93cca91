//! Shared fixtures for integration tests.
//!
//! `FakeCluster` stands in for a PBS installation: a temporary `PBS_HOME`
//! populated with log and private directories, canned command output, and
//! a configurable set of running daemons.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use walkdir::WalkDir;

use pbs_snapshot::cluster::{AdminCommand, ClusterInterface, Daemon, HostCommand, PbsLayout};
use pbs_snapshot::error::QueryError;

pub struct FakeCluster {
    home: TempDir,
    layout: PbsLayout,
    running: HashSet<Daemon>,
    /// The server answers queries without running on this host
    remote_server: bool,
    outputs: HashMap<AdminCommand, String>,
    schedulers: Vec<ListedScheduler>,
    /// Holds explicitly configured scheduler directories outside `PBS_HOME`
    sched_dir: TempDir,
}

struct ListedScheduler {
    id: String,
    /// `sched_priv` and `sched_log` attributes, when listed
    dirs: Option<(PathBuf, PathBuf)>,
}

impl FakeCluster {
    /// Installation with every daemon running and only the default scheduler
    pub fn new() -> Self {
        let home = TempDir::new().expect("temp PBS_HOME");
        let root = home.path();

        for (dir, prefix) in [
            ("server_logs", "2024010"),
            ("server_priv/accounting", "2024010"),
            ("mom_logs", "2024010"),
            ("comm_logs", "2024010"),
            ("sched_logs", "2024010"),
            ("datastore/pg_log", "postgresql-"),
        ] {
            populate(&root.join(dir), prefix, 8);
        }
        populate(&root.join("sched_priv"), "sched_config_", 2);
        fs::create_dir_all(root.join("mom_priv")).unwrap();
        fs::write(root.join("mom_priv/config"), "$clienthost head01\n").unwrap();
        fs::write(root.join("server_priv/resourcedef"), "ngpus type=long\n").unwrap();
        fs::write(root.join("pbs_environment"), "TZ=UTC\n").unwrap();

        let conf_path = root.join("pbs.conf");
        fs::write(
            &conf_path,
            format!(
                "PBS_HOME={}\nPBS_EXEC=/opt/pbs\nPBS_SERVER=head01\nPBS_START_COMM=1\n",
                root.display()
            ),
        )
        .unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("PBS_HOME".to_string(), root.display().to_string());
        entries.insert("PBS_EXEC".to_string(), "/opt/pbs".to_string());
        entries.insert("PBS_SERVER".to_string(), "head01".to_string());
        entries.insert("PBS_START_COMM".to_string(), "1".to_string());
        let layout = PbsLayout::from_entries(&conf_path, entries);

        Self {
            home,
            layout,
            running: Daemon::ALL.iter().copied().collect(),
            remote_server: false,
            outputs: HashMap::new(),
            schedulers: Vec::new(),
            sched_dir: TempDir::new().expect("temp sched_dir"),
        }
    }

    pub fn with_running(mut self, daemons: &[Daemon]) -> Self {
        self.running = daemons.iter().copied().collect();
        self
    }

    /// The server runs on another host: queries succeed, no local process
    pub fn with_remote_server(mut self) -> Self {
        self.running.remove(&Daemon::Server);
        self.remote_server = true;
        self
    }

    pub fn with_output(mut self, command: AdminCommand, output: &str) -> Self {
        self.outputs.insert(command, output.to_string());
        self
    }

    /// Add a scheduler with deterministically named directories
    pub fn with_scheduler(mut self, id: &str) -> Self {
        let root = self.home.path();
        populate(&root.join(format!("sched_priv_{}", id)), "sched_config_", 2);
        populate(&root.join(format!("sched_logs_{}", id)), "2024010", 4);
        self.schedulers.push(ListedScheduler {
            id: id.to_string(),
            dirs: None,
        });
        self
    }

    /// Add a scheduler whose directories are configured outside `PBS_HOME`
    pub fn with_custom_scheduler(mut self, id: &str) -> Self {
        let priv_dir = self.sched_dir.path().join(format!("sched_priv_{}", id));
        let log_dir = self.sched_dir.path().join(format!("sched_logs_{}", id));
        populate(&priv_dir, "sched_config_", 2);
        populate(&log_dir, "2024010", 4);
        self.schedulers.push(ListedScheduler {
            id: id.to_string(),
            dirs: Some((priv_dir, log_dir)),
        });
        self
    }

    pub fn sched_dir(&self) -> &Path {
        self.sched_dir.path()
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn scheduler_ids(&self) -> Vec<String> {
        let mut ids = vec!["default".to_string()];
        ids.extend(self.schedulers.iter().map(|s| s.id.clone()));
        ids
    }

    fn sched_listing(&self) -> String {
        let state = if self.running.contains(&Daemon::Scheduler) {
            "idle"
        } else {
            "down"
        };
        let mut text = format!(
            "Sched default\n    sched_host = head01\n    sched_port = 15004\n    state = {}\n",
            state
        );
        for (i, sched) in self.schedulers.iter().enumerate() {
            text.push_str(&format!(
                "Sched {}\n    sched_host = head01\n    sched_port = {}\n    partition = P{}\n",
                sched.id,
                15050 + i,
                i + 1
            ));
            if let Some((priv_dir, log_dir)) = &sched.dirs {
                text.push_str(&format!(
                    "    sched_priv = {}\n    sched_log = {}\n",
                    priv_dir.display(),
                    log_dir.display()
                ));
            }
            text.push_str(&format!("    state = {}\n", state));
        }
        text
    }
}

#[async_trait]
impl ClusterInterface for FakeCluster {
    async fn query(&self, command: AdminCommand) -> Result<String, QueryError> {
        if let Some(output) = self.outputs.get(&command) {
            return Ok(output.clone());
        }
        let needs_server = !matches!(
            command,
            AdminCommand::PbsProbe | AdminCommand::PbsHostn | AdminCommand::PbsVersion
        );
        let server_up = self.remote_server || self.running.contains(&Daemon::Server);
        if needs_server && !server_up {
            return Err(QueryError::ServerUnavailable {
                program: command.display_line(),
                stderr: "Connection refused".to_string(),
            });
        }
        match command {
            AdminCommand::QmgrListSched => Ok(self.sched_listing()),
            other => Ok(format!("{} output\n", other.display_line())),
        }
    }

    async fn host_command(
        &self,
        command: HostCommand,
        _extra_args: Vec<String>,
    ) -> Result<String, QueryError> {
        Ok(format!("{:?} output\n", command))
    }

    fn daemon_running(&self, daemon: Daemon) -> bool {
        self.running.contains(&daemon)
    }

    fn layout(&self) -> &PbsLayout {
        &self.layout
    }
}

/// `count` files named `<prefix><n>` with distinct contents
pub fn populate(dir: &Path, prefix: &str, count: usize) {
    fs::create_dir_all(dir).unwrap();
    for n in 0..count {
        fs::write(dir.join(format!("{}{}", prefix, n)), format!("entry {}\n", n)).unwrap();
    }
}

/// Every regular file under `root`, relative to it
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}
