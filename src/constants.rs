//! Global constants for pbs_snapshot.
//!
//! Snapshot-relative paths, registry keys, and tuning defaults live here so
//! collectors, the verifier, and tests agree on one layout.

// Output contract
/// Prefix of the single stdout line announcing the archive
pub const SNAPSHOT_ANNOUNCE_PREFIX: &str = "Snapshot available at";

/// Archive file-name stem prefix
pub const SNAPSHOT_NAME_PREFIX: &str = "snapshot_";

/// Timestamp format embedded in the snapshot name
pub const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%d_%H_%M_%S";

/// Compression suffix of the archive, including the dot
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Suffix of the in-progress archive before the final rename
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Manifest written at the snapshot root during finalize
pub const MANIFEST_FILE: &str = "snapshot_manifest.json";

/// The tool's own log inside the snapshot
pub const SNAPSHOT_LOG_FILE: &str = "pbs_snapshot.log";

// Buffer sizes
/// Chunk size for compression operations (512KB)
pub const COMPRESSION_CHUNK_SIZE: usize = 512 * 1024;

/// Large file threshold for compression decisions (100MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 100 * 1024 * 1024;

pub const COMPRESSED_EXTENSIONS: &[&str] = &["zip", "gz", "xz", "bz2", "7z", "tgz", "bz"];

// Timeouts
/// Default per-command timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Default per-collector timeout in seconds
pub const DEFAULT_COLLECTOR_TIMEOUT_SECS: u64 = 600;

// Log retention defaults when a count is left unset
pub const DEFAULT_DAEMON_LOGS: usize = 5;
pub const DEFAULT_ACCOUNTING_LOGS: usize = 30;

// PBS installation defaults
pub const DEFAULT_PBS_CONF: &str = "/etc/pbs.conf";
pub const DEFAULT_PBS_HOME: &str = "/var/spool/pbs";
pub const DEFAULT_PBS_EXEC: &str = "/opt/pbs";

// Snapshot layout: top-level directories
pub const SERVER_DIR: &str = "server";
pub const JOB_DIR: &str = "job";
pub const NODE_DIR: &str = "node";
pub const HOOK_DIR: &str = "hook";
pub const RESV_DIR: &str = "reservation";
pub const SCHED_DIR: &str = "scheduler";
pub const COMM_DIR: &str = "comm";
pub const DATASTORE_DIR: &str = "datastore";
pub const SYS_DIR: &str = "system";
pub const CORE_DIR: &str = "core_file_bt";

// Snapshot layout: log subtrees
pub const SVR_LOGS_PATH: &str = "server_logs";
pub const ACCT_LOGS_PATH: &str = "server_priv/accounting";
pub const MOM_LOGS_PATH: &str = "mom_logs";
pub const COMM_LOGS_PATH: &str = "comm_logs";
pub const DFLT_SCHED_LOGS_PATH: &str = "sched_logs";
pub const DFLT_SCHED_PRIV_PATH: &str = "sched_priv";
pub const PG_LOGS_PATH: &str = "datastore/pg_log";

// Snapshot layout: individual artifacts
pub const QSTAT_B_PATH: &str = "server/qstat_B.out";
pub const QSTAT_BF_PATH: &str = "server/qstat_Bf.out";
pub const QSTAT_Q_PATH: &str = "server/qstat_Q.out";
pub const QSTAT_QF_PATH: &str = "server/qstat_Qf.out";
pub const QMGR_PS_PATH: &str = "server/qmgr_ps.out";
pub const QMGR_PR_PATH: &str = "server/qmgr_pr.out";
pub const RSCDEF_PATH: &str = "server/resourcedef";
pub const QSTAT_PATH: &str = "job/qstat.out";
pub const QSTAT_F_PATH: &str = "job/qstat_f.out";
pub const QSTAT_T_PATH: &str = "job/qstat_t.out";
pub const QSTAT_X_PATH: &str = "job/qstat_x.out";
pub const QSTAT_NS_PATH: &str = "job/qstat_ns.out";
pub const QSTAT_FX_DSV_PATH: &str = "job/qstat_fx_F_dsv.out";
pub const PBSNODES_VA_PATH: &str = "node/pbsnodes_va.out";
pub const PBSNODES_A_PATH: &str = "node/pbsnodes_a.out";
pub const PBSNODES_AVSJ_PATH: &str = "node/pbsnodes_avSj.out";
pub const PBSNODES_ASJ_PATH: &str = "node/pbsnodes_aSj.out";
pub const PBSNODES_AFDSV_PATH: &str = "node/pbsnodes_aFdsv.out";
pub const QMGR_PN_PATH: &str = "node/qmgr_pn_default.out";
pub const MOM_CONFIG_PATH: &str = "mom_priv/config";
pub const PBS_RSTAT_PATH: &str = "reservation/pbs_rstat.out";
pub const PBS_RSTAT_F_PATH: &str = "reservation/pbs_rstat_f.out";
pub const QMGR_PH_PATH: &str = "hook/qmgr_ph_default.out";
pub const QMGR_LPBSHOOK_PATH: &str = "hook/qmgr_lpbshook.out";
pub const QMGR_LSCHED_PATH: &str = "scheduler/qmgr_lsched.out";
pub const COMM_CONF_PATH: &str = "comm/pbs_comm_conf.out";
pub const COMM_PROCESS_PATH: &str = "comm/pbs_comm_process.out";
pub const DATASERVICE_STATUS_PATH: &str = "datastore/pbs_dataservice_status.out";
pub const PBS_CONF_PATH: &str = "pbs.conf";
pub const CTIME_PATH: &str = "ctime";
pub const PBS_VERSION_PATH: &str = "pbs_version.out";
pub const OS_INFO_PATH: &str = "system/os_info.json";
pub const PROCESS_INFO_PATH: &str = "system/process_info";
pub const MEMORY_INFO_PATH: &str = "system/memory.json";
pub const DISK_INFO_PATH: &str = "system/disks.json";
pub const PBS_ENV_PATH: &str = "system/pbs_environment";
pub const PBS_PROBE_PATH: &str = "system/pbs_probe_v.out";
pub const PBS_HOSTN_PATH: &str = "system/pbs_hostn_v.out";
pub const ETC_HOSTS_PATH: &str = "system/etc_hosts";
pub const ETC_NSSWITCH_CONF_PATH: &str = "system/etc_nsswitch_conf";
pub const LSOF_PBS_PATH: &str = "system/lsof_pbs.out";
pub const VMSTAT_PATH: &str = "system/vmstat.out";
pub const DF_H_PATH: &str = "system/df_h.out";
pub const DMESG_PATH: &str = "system/dmesg.out";

/// Registry keys. Stable identifiers, independent of capture order.
pub mod keys {
    pub const QSTAT_B: &str = "qstat_B";
    pub const QSTAT_BF: &str = "qstat_Bf";
    pub const QSTAT_Q: &str = "qstat_Q";
    pub const QSTAT_QF: &str = "qstat_Qf";
    pub const QMGR_PS: &str = "qmgr_ps";
    pub const QMGR_PR: &str = "qmgr_pr";
    pub const RSCDEF: &str = "resourcedef";
    pub const SVR_LOGS: &str = "server_logs";
    pub const ACCT_LOGS: &str = "accounting_logs";

    pub const QSTAT: &str = "qstat";
    pub const QSTAT_F: &str = "qstat_f";
    pub const QSTAT_T: &str = "qstat_t";
    pub const QSTAT_X: &str = "qstat_x";
    pub const QSTAT_NS: &str = "qstat_ns";
    pub const QSTAT_FX_DSV: &str = "qstat_fx_dsv";

    pub const PBSNODES_VA: &str = "pbsnodes_va";
    pub const PBSNODES_A: &str = "pbsnodes_a";
    pub const PBSNODES_AVSJ: &str = "pbsnodes_avSj";
    pub const PBSNODES_ASJ: &str = "pbsnodes_aSj";
    pub const PBSNODES_AFDSV: &str = "pbsnodes_aFdsv";
    pub const QMGR_PN: &str = "qmgr_pn";
    pub const MOM_CONFIG: &str = "mom_config";
    pub const MOM_LOGS: &str = "mom_logs";

    pub const PBS_RSTAT: &str = "pbs_rstat";
    pub const PBS_RSTAT_F: &str = "pbs_rstat_f";

    pub const QMGR_PH: &str = "qmgr_ph";
    pub const QMGR_LPBSHOOK: &str = "qmgr_lpbshook";

    pub const QMGR_LSCHED: &str = "qmgr_lsched";

    pub const COMM_CONF: &str = "pbs_comm_conf";
    pub const COMM_PROCESS: &str = "pbs_comm_process";
    pub const COMM_LOGS: &str = "comm_logs";

    pub const DATASERVICE_STATUS: &str = "dataservice_status";
    pub const PG_LOGS: &str = "pg_log";

    pub const PBS_CONF: &str = "pbs_conf";
    pub const CTIME: &str = "ctime";
    pub const PBS_VERSION: &str = "pbs_version";
    pub const SNAPSHOT_LOG: &str = "pbs_snapshot_log";

    pub const CORE_FILE_BT: &str = "core_file_bt";

    pub const OS_INFO: &str = "os_info";
    pub const PROCESS_INFO: &str = "process_info";
    pub const MEMORY_INFO: &str = "memory_info";
    pub const DISK_INFO: &str = "disk_info";
    pub const PBS_ENV: &str = "pbs_environment";
    pub const PBS_PROBE: &str = "pbs_probe";
    pub const PBS_HOSTN: &str = "pbs_hostn";
    pub const ETC_HOSTS: &str = "etc_hosts";
    pub const ETC_NSSWITCH_CONF: &str = "etc_nsswitch_conf";
    pub const LSOF_PBS: &str = "lsof_pbs";
    pub const VMSTAT: &str = "vmstat";
    pub const DF_H: &str = "df_h";
    pub const DMESG: &str = "dmesg";
}
