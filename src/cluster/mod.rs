//! Boundary to the cluster being snapshotted.
//!
//! Collectors never spawn PBS tools or inspect the process table directly.
//! They go through [`ClusterInterface`], which has one production
//! implementation ([`commands::PbsCli`]) and is mocked in tests.

pub mod commands;
pub mod layout;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

pub use commands::PbsCli;
pub use layout::PbsLayout;

/// PBS daemon kinds whose liveness gates collection
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Daemon {
    Server,
    Mom,
    Comm,
    Scheduler,
    DataService,
}

impl Daemon {
    pub const ALL: [Daemon; 5] = [
        Daemon::Server,
        Daemon::Mom,
        Daemon::Comm,
        Daemon::Scheduler,
        Daemon::DataService,
    ];

    /// Process names the daemon runs under
    pub fn process_names(&self) -> &'static [&'static str] {
        match self {
            Daemon::Server => &["pbs_server.bin", "pbs_server"],
            Daemon::Mom => &["pbs_mom"],
            Daemon::Comm => &["pbs_comm"],
            Daemon::Scheduler => &["pbs_sched"],
            Daemon::DataService => &["postgres", "postmaster"],
        }
    }

    /// Executable under `$PBS_EXEC/sbin`, used to symbolize core files
    pub fn executable(&self) -> &'static str {
        match self {
            Daemon::Server => "pbs_server.bin",
            Daemon::Mom => "pbs_mom",
            Daemon::Comm => "pbs_comm",
            Daemon::Scheduler => "pbs_sched",
            Daemon::DataService => "postgres",
        }
    }
}

impl fmt::Display for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Daemon::Server => "pbs_server",
            Daemon::Mom => "pbs_mom",
            Daemon::Comm => "pbs_comm",
            Daemon::Scheduler => "pbs_sched",
            Daemon::DataService => "pbs_dataservice",
        };
        f.write_str(name)
    }
}

/// Read-only administrative queries issued through the PBS client tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCommand {
    QstatB,
    QstatBf,
    QstatQ,
    QstatQf,
    QmgrPrintServer,
    QmgrPrintResources,
    Qstat,
    QstatF,
    QstatT,
    QstatX,
    QstatNs,
    QstatFxDsv,
    PbsnodesVa,
    PbsnodesA,
    PbsnodesAvSj,
    PbsnodesASj,
    PbsnodesAFdsv,
    QmgrPrintNodes,
    PbsRstat,
    PbsRstatF,
    QmgrPrintHooks,
    QmgrListPbsHooks,
    QmgrListSched,
    DataserviceStatus,
    PbsProbe,
    PbsHostn,
    PbsVersion,
}

/// Which `$PBS_EXEC` subdirectory a tool lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDir {
    Bin,
    Sbin,
}

impl AdminCommand {
    /// Tool name, its directory, and arguments.
    ///
    /// `PbsHostn` takes the server host as its final argument; the
    /// implementation appends it from the layout.
    pub fn invocation(&self) -> (&'static str, ToolDir, &'static [&'static str]) {
        use AdminCommand::*;
        use ToolDir::*;
        match self {
            QstatB => ("qstat", Bin, &["-B"]),
            QstatBf => ("qstat", Bin, &["-Bf"]),
            QstatQ => ("qstat", Bin, &["-Q"]),
            QstatQf => ("qstat", Bin, &["-Qf"]),
            QmgrPrintServer => ("qmgr", Bin, &["-c", "print server"]),
            QmgrPrintResources => ("qmgr", Bin, &["-c", "print resource"]),
            Qstat => ("qstat", Bin, &[]),
            QstatF => ("qstat", Bin, &["-f"]),
            QstatT => ("qstat", Bin, &["-t"]),
            QstatX => ("qstat", Bin, &["-x"]),
            QstatNs => ("qstat", Bin, &["-ns"]),
            QstatFxDsv => ("qstat", Bin, &["-fx", "-F", "dsv"]),
            PbsnodesVa => ("pbsnodes", Bin, &["-va"]),
            PbsnodesA => ("pbsnodes", Bin, &["-a"]),
            PbsnodesAvSj => ("pbsnodes", Bin, &["-avSj"]),
            PbsnodesASj => ("pbsnodes", Bin, &["-aSj"]),
            PbsnodesAFdsv => ("pbsnodes", Bin, &["-aF", "dsv"]),
            QmgrPrintNodes => ("qmgr", Bin, &["-c", "print node @default"]),
            PbsRstat => ("pbs_rstat", Bin, &[]),
            PbsRstatF => ("pbs_rstat", Bin, &["-f"]),
            QmgrPrintHooks => ("qmgr", Bin, &["-c", "print hook @default"]),
            QmgrListPbsHooks => ("qmgr", Bin, &["-c", "list pbshook"]),
            QmgrListSched => ("qmgr", Bin, &["-c", "list sched"]),
            DataserviceStatus => ("pbs_dataservice", Sbin, &["status"]),
            PbsProbe => ("pbs_probe", Sbin, &["-v"]),
            PbsHostn => ("pbs_hostn", Bin, &["-v"]),
            PbsVersion => ("qstat", Bin, &["--version"]),
        }
    }

    /// Human-readable command line, used in logs and artifact headers
    pub fn display_line(&self) -> String {
        let (tool, _, args) = self.invocation();
        let mut line = tool.to_string();
        for arg in args {
            if arg.contains(' ') {
                line.push_str(&format!(" \"{}\"", arg));
            } else {
                line.push(' ');
                line.push_str(arg);
            }
        }
        line
    }
}

/// Host-level commands that are not PBS tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    LsofPbs,
    Vmstat,
    DfH,
    Dmesg,
    /// `gdb` backtrace; the executable and core path are passed separately
    GdbBacktrace,
}

impl HostCommand {
    pub fn invocation(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            HostCommand::LsofPbs => ("lsof", &["-c", "pbs_"]),
            HostCommand::Vmstat => ("vmstat", &[]),
            HostCommand::DfH => ("df", &["-h"]),
            HostCommand::Dmesg => ("dmesg", &[]),
            HostCommand::GdbBacktrace => ("gdb", &["-batch", "-ex", "thread apply all bt"]),
        }
    }
}

/// Everything a collector may ask of the cluster and its host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterInterface: Send + Sync {
    /// Run one administrative query and return its standard output
    async fn query(&self, command: AdminCommand) -> Result<String, QueryError>;

    /// Run one host command with extra trailing arguments
    async fn host_command(
        &self,
        command: HostCommand,
        extra_args: Vec<String>,
    ) -> Result<String, QueryError>;

    /// Whether the daemon is running on this host
    fn daemon_running(&self, daemon: Daemon) -> bool;

    /// Installation layout (pbs.conf, PBS_HOME, PBS_EXEC)
    fn layout(&self) -> &PbsLayout;
}
