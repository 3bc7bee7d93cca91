//! End-to-end snapshot capture against a fake PBS installation.

mod common;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use zip::read::ZipArchive;

use common::{files_under, FakeCluster};
use pbs_snapshot::cluster::{AdminCommand, Daemon};
use pbs_snapshot::config::{LogCount, Platform, SessionOptions};
use pbs_snapshot::constants::{
    keys, ACCT_LOGS_PATH, COMM_LOGS_PATH, MOM_LOGS_PATH, PBS_RSTAT_F_PATH, PG_LOGS_PATH,
    QMGR_LSCHED_PATH, QSTAT_F_PATH, SVR_LOGS_PATH,
};
use pbs_snapshot::error::SnapshotError;
use pbs_snapshot::models::Category;
use pbs_snapshot::registry::Exclusion;
use pbs_snapshot::session::SnapshotSession;
use pbs_snapshot::utils::archive::snapshot_dir_name_for_archive;

const USER: &str = "tstusr01";
const GROUP: &str = "tstgrp01";

fn options(out: &TempDir) -> SessionOptions {
    SessionOptions::new(out.path())
        .with_elevated(true)
        .with_platform(Platform::Linux)
}

fn open(options: SessionOptions, cluster: FakeCluster) -> SnapshotSession {
    SnapshotSession::open(options, Arc::new(cluster)).expect("session opens")
}

fn with_reservation(cluster: FakeCluster) -> FakeCluster {
    cluster
        .with_output(
            AdminCommand::PbsRstatF,
            &format!(
                "Resv ID: R101.head01\nReserve_Name = NULL\nReserve_Owner = pbsadmin@head01\n\
                 Authorized_Users = {u}@head01\nAuthorized_Groups = {g}\n",
                u = USER,
                g = GROUP
            ),
        )
        .with_output(
            AdminCommand::QstatF,
            &format!(
                "Job Id: 7.head01\n    Job_Owner = {u}@head01\n    euser = {u}\n    egroup = {g}\n",
                u = USER,
                g = GROUP
            ),
        )
}

#[tokio::test]
async fn test_capture_server_writes_only_under_server() {
    let out = TempDir::new().unwrap();
    let mut session = open(options(&out), FakeCluster::new());

    let root = session.capture_server(true, true).await.unwrap();

    let files = files_under(&root);
    assert!(!files.is_empty());
    for file in &files {
        assert!(file.starts_with("server"), "{} outside server/", file.display());
    }
    assert!(session.server_info().values().all(|i| i.is_captured()));
    assert!(session.job_info().is_empty());
}

#[tokio::test]
async fn test_pbs_logs_only_for_running_daemons() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new().with_running(&[Daemon::Server, Daemon::Mom]);
    let mut session = open(options(&out), cluster);

    let root = session.capture_pbs_logs().await.unwrap();

    assert!(root.join(SVR_LOGS_PATH).is_dir());
    assert!(root.join(ACCT_LOGS_PATH).is_dir());
    assert!(root.join(MOM_LOGS_PATH).is_dir());
    assert!(!root.join(COMM_LOGS_PATH).exists());
    assert!(!root.join("sched_logs").exists());
}

#[tokio::test]
async fn test_pbs_logs_without_server_uses_default_scheduler() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new().with_running(&[Daemon::Comm, Daemon::Scheduler]);
    let mut session = open(options(&out), cluster);

    let root = session.capture_pbs_logs().await.unwrap();

    assert!(root.join(COMM_LOGS_PATH).is_dir());
    assert!(root.join("sched_logs").is_dir());
    assert!(!root.join(SVR_LOGS_PATH).exists());
    assert!(!root.join(ACCT_LOGS_PATH).exists());
    assert!(!root.join(MOM_LOGS_PATH).exists());
}

#[tokio::test]
async fn test_zero_log_counts_create_no_log_directories() {
    let out = TempDir::new().unwrap();
    let options = options(&out).with_log_counts(LogCount::Zero, LogCount::Zero);
    let mut session = open(options, FakeCluster::new().with_scheduler("sc1"));

    let root = session.capture_all().await.unwrap();

    for rel in [
        SVR_LOGS_PATH,
        ACCT_LOGS_PATH,
        MOM_LOGS_PATH,
        COMM_LOGS_PATH,
        PG_LOGS_PATH,
        "sched_logs",
        "sched_logs_sc1",
        "server_priv",
    ] {
        assert!(!root.join(rel).exists(), "{} should not exist", rel);
    }
    assert!(root.join("sched_priv").is_dir());
}

#[tokio::test]
async fn test_multiple_schedulers() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new()
        .with_scheduler("sc1")
        .with_scheduler("sc2")
        .with_custom_scheduler("sc3");
    let expected_ids = cluster.scheduler_ids();
    let sched_dir = cluster.sched_dir().to_path_buf();
    let mut session = open(options(&out), cluster);

    let root = session.capture_all().await.unwrap();

    let discovery = session.discovery().unwrap();
    assert_eq!(discovery.descriptors.len(), 4);
    let sc3 = discovery.get("sc3").unwrap();
    assert_eq!(sc3.priv_dir, sched_dir.join("sched_priv_sc3"));
    assert_eq!(sc3.log_dir, sched_dir.join("sched_logs_sc3"));
    for d in &discovery.descriptors {
        for name in [d.priv_artifact_name(), d.logs_artifact_name()] {
            let dir = root.join(&name);
            assert!(dir.is_dir(), "{} missing", name);
            assert!(fs::read_dir(&dir).unwrap().count() > 0, "{} is empty", name);
            assert!(session.sched_info()[&name].is_captured());
        }
    }

    let listing = fs::read_to_string(root.join(QMGR_LSCHED_PATH)).unwrap();
    let ids: Vec<String> = listing
        .lines()
        .filter_map(|l| l.strip_prefix("Sched "))
        .map(|id| id.trim().to_string())
        .collect();
    assert_eq!(ids, expected_ids);
}

#[tokio::test]
async fn test_custom_scheduler_directories_captured() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new().with_custom_scheduler("sc3");
    let mut session = open(options(&out), cluster);

    let root = session.capture_all().await.unwrap();

    for name in ["sched_priv_sc3", "sched_logs_sc3"] {
        let dir = root.join(name);
        assert!(dir.is_dir(), "{} missing", name);
        assert!(fs::read_dir(&dir).unwrap().count() > 0, "{} is empty", name);
        assert!(session.sched_info()[name].is_captured());
    }
    assert_eq!(fs::read_dir(root.join("sched_logs_sc3")).unwrap().count(), 4);
}

#[tokio::test]
async fn test_remote_server_still_captures_server_objects() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new()
        .with_running(&[Daemon::Mom, Daemon::Comm, Daemon::Scheduler])
        .with_remote_server();
    let mut session = open(options(&out), cluster);

    let root = session.capture_all().await.unwrap();

    assert!(session.server_info()[keys::QSTAT_B].is_captured());
    for info in [session.job_info(), session.resv_info(), session.hook_info()] {
        assert!(!info.is_empty());
        assert!(info.values().all(|i| i.is_captured()));
    }
    assert!(root.join(QSTAT_F_PATH).is_file());
    assert!(root.join(PBS_RSTAT_F_PATH).is_file());
    // Local server logs only exist where the server runs
    assert!(!root.join(SVR_LOGS_PATH).exists());
    assert!(root.join(MOM_LOGS_PATH).is_dir());
}

#[tokio::test]
async fn test_discovery_failure_aborts_and_rolls_back() {
    let out = TempDir::new().unwrap();
    let cluster = FakeCluster::new().with_running(&[Daemon::Mom]);
    let mut session = open(options(&out), cluster);
    let root = session.root().to_path_buf();

    let result = session.capture_all().await;
    assert!(matches!(result, Err(SnapshotError::DiscoveryFailure(_))));

    drop(session);
    assert!(!root.exists());
}

#[tokio::test]
async fn test_obfuscation_removes_identifiers() {
    let out = TempDir::new().unwrap();
    let options = options(&out).with_obfuscation(true);
    let mut session = open(options, with_reservation(FakeCluster::new()));

    let root = session.capture_all().await.unwrap();
    session.finalize().unwrap();

    let rstat = fs::read_to_string(root.join(PBS_RSTAT_F_PATH)).unwrap();
    let qstat = fs::read_to_string(root.join(QSTAT_F_PATH)).unwrap();
    assert!(!rstat.contains(USER) && !rstat.contains(GROUP));
    assert!(!qstat.contains(USER) && !qstat.contains(GROUP));

    // The same placeholder stands for the user in both artifacts
    let placeholder = rstat
        .lines()
        .find_map(|l| l.strip_prefix("Authorized_Users = "))
        .and_then(|v| v.split('@').next())
        .unwrap()
        .to_string();
    assert!(placeholder.starts_with("pbsuser_"));
    assert!(qstat.contains(&format!("euser = {}", placeholder)));
    assert!(qstat.contains(&format!("Job_Owner = {}@head01", placeholder)));
}

#[tokio::test]
async fn test_without_obfuscation_identifiers_remain() {
    let out = TempDir::new().unwrap();
    let mut session = open(options(&out), with_reservation(FakeCluster::new()));

    let root = session.capture_all().await.unwrap();
    session.finalize().unwrap();

    let rstat = fs::read_to_string(root.join(PBS_RSTAT_F_PATH)).unwrap();
    assert!(rstat.contains(USER));
    assert!(rstat.contains(GROUP));
}

#[tokio::test]
async fn test_archive_extracts_to_snapshot_dir() {
    let out = TempDir::new().unwrap();
    let mut session = open(options(&out), FakeCluster::new());
    session.capture_server(false, false).await.unwrap();
    let dir_name = session.dir_name().to_string();

    let archive = session.finalize().unwrap();

    assert_eq!(archive.dir_name, dir_name);
    assert_eq!(
        snapshot_dir_name_for_archive(&archive.path).as_deref(),
        Some(dir_name.as_str())
    );
    assert_eq!(archive.path.parent().unwrap(), fs::canonicalize(out.path()).unwrap());
    assert!(out.path().join(&dir_name).is_dir());

    let extract = TempDir::new().unwrap();
    let mut zip = ZipArchive::new(fs::File::open(&archive.path).unwrap()).unwrap();
    zip.extract(extract.path()).unwrap();
    assert!(extract.path().join(&dir_name).join("server/qstat_B.out").is_file());
    assert!(extract
        .path()
        .join(&dir_name)
        .join("snapshot_manifest.json")
        .is_file());
}

#[tokio::test]
async fn test_end_to_end_all_categories_verified() {
    let out = TempDir::new().unwrap();
    let options = options(&out)
        .with_log_counts(LogCount::from_count(5), LogCount::from_count(2))
        .with_obfuscation(false);
    let mut session = open(options, FakeCluster::new().with_scheduler("sc1"));

    let root = session.capture_all().await.unwrap();

    let populated = session.registry().populated_categories();
    assert_eq!(populated.len(), Category::ALL.len());
    for category in Category::ALL {
        assert!(populated.contains(&category), "{} not registered", category);
    }

    let missing = session.registry().verify(&root, &Exclusion::high_volume());
    assert!(missing.is_empty(), "missing artifacts: {:?}", missing);

    assert_eq!(fs::read_dir(root.join(SVR_LOGS_PATH)).unwrap().count(), 2);
    assert_eq!(fs::read_dir(root.join(ACCT_LOGS_PATH)).unwrap().count(), 5);
    assert!(!session.pbs_info().is_empty());
    assert!(!session.sys_info().is_empty());

    let archive = session.finalize().unwrap();
    assert!(archive.path.is_file());
}
