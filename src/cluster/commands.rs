use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use sysinfo::{ProcessExt, System, SystemExt};
use tokio::process::Command;

use crate::cluster::{AdminCommand, ClusterInterface, Daemon, HostCommand, PbsLayout};
use crate::error::QueryError;

/// Production cluster boundary: runs the real PBS client tools
pub struct PbsCli {
    layout: PbsLayout,
    timeout: Duration,
    running: HashSet<Daemon>,
}

impl PbsCli {
    /// Snapshot the process table once; liveness does not change mid-capture
    /// as far as gating is concerned.
    pub fn new(layout: PbsLayout, timeout: Duration) -> Self {
        let mut system = System::new();
        system.refresh_processes();

        let names: HashSet<String> = system
            .processes()
            .values()
            .map(|p| p.name().to_string())
            .collect();
        let running = detect_running(&names);

        info!(
            "Detected running PBS daemons: {}",
            running
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            layout,
            timeout,
            running,
        }
    }

    async fn run<I, S>(&self, program: &Path, args: I) -> Result<String, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = program.display().to_string();
        debug!("Running {}", name);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => QueryError::NotFound {
                    program: name.clone(),
                },
                _ => QueryError::Io {
                    program: name.clone(),
                    reason: e.to_string(),
                },
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| QueryError::Io {
                program: name.clone(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!("{} timed out after {}s", name, self.timeout.as_secs());
                return Err(QueryError::Timeout {
                    program: name,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(QueryError::from_stderr(&name, output.status.code(), &stderr))
        }
    }
}

fn detect_running(process_names: &HashSet<String>) -> HashSet<Daemon> {
    Daemon::ALL
        .iter()
        .copied()
        .filter(|d| d.process_names().iter().any(|n| process_names.contains(*n)))
        .collect()
}

#[async_trait]
impl ClusterInterface for PbsCli {
    async fn query(&self, command: AdminCommand) -> Result<String, QueryError> {
        let (tool, dir, args) = command.invocation();
        let program = self.layout.tool_path(tool, dir);

        let mut argv: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if command == AdminCommand::PbsHostn {
            argv.push(self.layout.server_host.clone());
        }
        self.run(&program, argv).await
    }

    async fn host_command(
        &self,
        command: HostCommand,
        extra_args: Vec<String>,
    ) -> Result<String, QueryError> {
        let (tool, args) = command.invocation();
        let argv = args
            .iter()
            .map(|a| a.to_string())
            .chain(extra_args)
            .collect::<Vec<_>>();
        self.run(Path::new(tool), argv).await
    }

    fn daemon_running(&self, daemon: Daemon) -> bool {
        self.running.contains(&daemon)
    }

    fn layout(&self) -> &PbsLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(exec: &Path) -> PbsCli {
        PbsCli {
            layout: PbsLayout::with_dirs("/var/spool/pbs", exec),
            timeout: Duration::from_secs(5),
            running: HashSet::new(),
        }
    }

    #[test]
    fn test_detect_running() {
        let names: HashSet<String> = ["pbs_server.bin", "pbs_comm", "bash"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let running = detect_running(&names);
        assert!(running.contains(&Daemon::Server));
        assert!(running.contains(&Daemon::Comm));
        assert!(!running.contains(&Daemon::Mom));
        assert_eq!(running.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = cli(dir.path()).query(AdminCommand::QstatB).await;
        assert!(matches!(result, Err(QueryError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_tool_from_exec_bin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("qstat");
        std::fs::write(&script, "#!/bin/sh\necho \"args: $@\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let out = cli(dir.path()).query(AdminCommand::QstatBf).await.unwrap();
        assert_eq!(out.trim(), "args: -Bf");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unauthorized_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("qmgr");
        std::fs::write(&script, "#!/bin/sh\necho 'Unauthorized Request' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let result = cli(dir.path()).query(AdminCommand::QmgrPrintServer).await;
        assert!(matches!(result, Err(QueryError::Unauthorized { .. })));
    }
}
