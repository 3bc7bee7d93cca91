use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use zip::{write::FileOptions, ZipWriter};

use crate::constants::{
    ARCHIVE_SUFFIX, COMPRESSED_EXTENSIONS, COMPRESSION_CHUNK_SIZE as CHUNK_SIZE,
    LARGE_FILE_COMPRESSION_THRESHOLD, PARTIAL_SUFFIX, SNAPSHOT_NAME_PREFIX, SNAPSHOT_TIME_FORMAT,
};
use crate::error::SnapshotError;

/// A finished snapshot archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Absolute path of the `.zip`
    pub path: PathBuf,
    /// Snapshot directory the archive extracts to
    pub dir_name: String,
}

/// Snapshot directory name for an archive path: its file name without the
/// compression suffix. `None` if the path does not end in that suffix.
pub fn snapshot_dir_name_for_archive(archive: &Path) -> Option<String> {
    let name = archive.file_name()?.to_str()?;
    let stem = name.strip_suffix(ARCHIVE_SUFFIX)?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Archive file name for a snapshot directory name
pub fn archive_file_name(dir_name: &str) -> String {
    format!("{}{}", dir_name, ARCHIVE_SUFFIX)
}

/// `snapshot_<YYYYMMDD_HH_MM_SS>`
pub fn snapshot_name(at: DateTime<Local>) -> String {
    format!("{}{}", SNAPSHOT_NAME_PREFIX, at.format(SNAPSHOT_TIME_FORMAT))
}

/// First name based on `base` whose directory and archive are both free in
/// `out_dir`; collisions get a `_N` suffix.
pub fn unique_snapshot_name(out_dir: &Path, base: &str) -> String {
    let taken = |name: &str| {
        out_dir.join(name).exists() || out_dir.join(archive_file_name(name)).exists()
    };
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// File entry with its compression options
struct FileEntry {
    rel_path: String,
    abs_path: PathBuf,
    options: FileOptions,
}

/// Pick compression options from file type and size
pub fn get_compression_options(path: &Path) -> FileOptions {
    let low_compression = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => COMPRESSED_EXTENSIONS.contains(&ext),
        _ => false,
    };

    let large_file = matches!(
        fs::metadata(path),
        Ok(metadata) if metadata.len() > LARGE_FILE_COMPRESSION_THRESHOLD
    );

    let level = if low_compression || large_file { 1 } else { 6 };
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(level))
        .unix_permissions(0o644)
}

/// Worker function for compression threads
fn compression_worker(
    receiver: Receiver<Option<FileEntry>>,
    zip: Arc<Mutex<ZipWriter<fs::File>>>,
) -> Result<()> {
    let mut buffer = vec![0u8; CHUNK_SIZE];

    while let Ok(Some(entry)) = receiver.recv() {
        let start = Instant::now();

        let file = fs::File::open(&entry.abs_path)
            .with_context(|| format!("Failed to open {}", entry.abs_path.display()))?;
        let mut reader = BufReader::new(file);
        let mut written = 0u64;

        {
            let mut zip = zip
                .lock()
                .map_err(|_| anyhow!("Archive writer lock poisoned"))?;

            zip.start_file(entry.rel_path.clone(), entry.options)
                .with_context(|| format!("Failed to start entry {}", entry.rel_path))?;

            loop {
                let bytes_read = reader
                    .read(&mut buffer)
                    .with_context(|| format!("Failed to read {}", entry.abs_path.display()))?;
                if bytes_read == 0 {
                    break;
                }
                zip.write_all(&buffer[..bytes_read])
                    .with_context(|| format!("Failed to write {}", entry.rel_path))?;
                written += bytes_read as u64;
            }
        }

        debug!(
            "Compressed {} ({} bytes) in {:?}",
            entry.rel_path,
            written,
            start.elapsed()
        );
    }

    Ok(())
}

/// Scan a directory and queue its files, entries rooted at `prefix`
fn scan_directory(
    base_path: &Path,
    dir_path: &Path,
    prefix: &str,
    dirs: &mut Vec<String>,
    sender: &Sender<Option<FileEntry>>,
) -> Result<()> {
    let entries = fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read directory {}", dir_path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir_path.display()))?;
        let path = entry.path();

        let rel = path.strip_prefix(base_path).unwrap_or(&path);
        let rel_path = format!("{}/{}", prefix, rel.to_string_lossy());

        if path.is_dir() {
            dirs.push(format!("{}/", rel_path));
            scan_directory(base_path, &path, prefix, dirs, sender)?;
        } else {
            let options = get_compression_options(&path);
            sender
                .send(Some(FileEntry {
                    rel_path,
                    abs_path: path.clone(),
                    options,
                }))
                .map_err(|_| anyhow!("All compression workers exited"))?;
        }
    }
    Ok(())
}

/// Pack `snapshot_dir` into `<out_dir>/<dir name>.zip`.
///
/// The archive is written to a `.partial` file and renamed when complete;
/// on failure the partial file is removed.
pub fn create_archive(out_dir: &Path, snapshot_dir: &Path) -> Result<Archive, SnapshotError> {
    let dir_name = snapshot_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| SnapshotError::ArchiveCreationFailure {
            path: snapshot_dir.to_path_buf(),
            reason: "snapshot directory has no usable name".to_string(),
        })?;

    let final_path = out_dir.join(archive_file_name(&dir_name));
    let partial_path = out_dir.join(format!("{}{}", archive_file_name(&dir_name), PARTIAL_SUFFIX));

    match pack(snapshot_dir, &dir_name, &partial_path).and_then(|()| {
        fs::rename(&partial_path, &final_path)
            .with_context(|| format!("Failed to rename {}", partial_path.display()))
    }) {
        Ok(()) => {
            let path = fs::canonicalize(&final_path).unwrap_or(final_path);
            Ok(Archive { path, dir_name })
        }
        Err(e) => {
            let _ = fs::remove_file(&partial_path);
            Err(SnapshotError::ArchiveCreationFailure {
                path: final_path,
                reason: format!("{:#}", e),
            })
        }
    }
}

fn pack(source_dir: &Path, prefix: &str, zip_path: &Path) -> Result<()> {
    let start = Instant::now();
    info!("Compressing snapshot with multithreading...");

    if !source_dir.is_dir() {
        bail!("{} is not a directory", source_dir.display());
    }

    let zip_file = fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file {}", zip_path.display()))?;
    let zip = Arc::new(Mutex::new(ZipWriter::new(zip_file)));

    let (sender, receiver) = bounded::<Option<FileEntry>>(1000);

    // 1 thread per CPU core, max 8
    let thread_count = std::cmp::min(num_cpus::get(), 8);

    let mut workers = Vec::with_capacity(thread_count);
    for i in 0..thread_count {
        let worker_receiver = receiver.clone();
        let worker_zip = Arc::clone(&zip);
        let handle = std::thread::Builder::new()
            .name(format!("compression-{}", i))
            .spawn(move || match compression_worker(worker_receiver, worker_zip) {
                Ok(()) => true,
                Err(e) => {
                    error!("Error in compression worker {}: {:#}", i, e);
                    false
                }
            })
            .context("Failed to spawn compression worker")?;
        workers.push(handle);
    }
    // Workers hold the only receivers, so a send fails once they all exit
    drop(receiver);

    let mut dirs = vec![format!("{}/", prefix)];
    let scanned = scan_directory(source_dir, source_dir, prefix, &mut dirs, &sender);

    for _ in 0..thread_count {
        let _ = sender.send(None);
    }
    drop(sender);

    let mut workers_ok = true;
    for worker in workers {
        workers_ok &= worker.join().unwrap_or(false);
    }
    scanned?;
    if !workers_ok {
        bail!("One or more compression workers failed");
    }

    let mut zip = Arc::try_unwrap(zip)
        .map_err(|_| anyhow!("Archive writer still shared"))?
        .into_inner()
        .map_err(|_| anyhow!("Archive writer lock poisoned"))?;

    for dir in dirs {
        zip.add_directory(dir.clone(), FileOptions::default())
            .with_context(|| format!("Failed to add directory entry {}", dir))?;
    }
    zip.finish().context("Failed to finalize zip file")?;

    info!(
        "Compressed snapshot to {} in {:?}",
        zip_path.display(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use tempfile::TempDir;
    use zip::read::ZipArchive;

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_snapshot_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(snapshot_name(at), "snapshot_20240309_07_05_01");
    }

    #[test]
    fn test_dir_name_requires_suffix() {
        assert_eq!(snapshot_dir_name_for_archive(Path::new("/tmp/snapshot_x.tar")), None);
        assert_eq!(snapshot_dir_name_for_archive(Path::new("/tmp/.zip")), None);
        assert_eq!(
            snapshot_dir_name_for_archive(Path::new("/tmp/snapshot_x.zip")).as_deref(),
            Some("snapshot_x")
        );
    }

    #[test]
    fn test_unique_snapshot_name() {
        let out = TempDir::new().unwrap();
        assert_eq!(unique_snapshot_name(out.path(), "snapshot_a"), "snapshot_a");

        fs::create_dir(out.path().join("snapshot_a")).unwrap();
        fs::write(out.path().join("snapshot_a_1.zip"), "x").unwrap();
        assert_eq!(unique_snapshot_name(out.path(), "snapshot_a"), "snapshot_a_2");
    }

    #[test]
    fn test_create_archive_rooted_at_dir_name() {
        let out = TempDir::new().unwrap();
        let snap = out.path().join("snapshot_20240101_00_00_00");
        fs::create_dir_all(snap.join("server")).unwrap();
        fs::create_dir_all(snap.join("sched_logs")).unwrap();
        fs::write(snap.join("server/qstat_B.out"), "Server Max\n").unwrap();
        fs::write(snap.join("ctime"), "now\n").unwrap();

        let archive = create_archive(out.path(), &snap).unwrap();
        assert_eq!(archive.dir_name, "snapshot_20240101_00_00_00");
        assert_eq!(
            snapshot_dir_name_for_archive(&archive.path).as_deref(),
            Some(archive.dir_name.as_str())
        );
        assert!(archive.path.is_absolute());

        let names = entry_names(&archive.path);
        assert!(names.contains(&"snapshot_20240101_00_00_00/server/qstat_B.out".to_string()));
        assert!(names.contains(&"snapshot_20240101_00_00_00/ctime".to_string()));
        assert!(names.contains(&"snapshot_20240101_00_00_00/sched_logs/".to_string()));
        assert!(names
            .iter()
            .all(|n| n.starts_with("snapshot_20240101_00_00_00/")));
        assert!(!out
            .path()
            .join("snapshot_20240101_00_00_00.zip.partial")
            .exists());
    }

    #[test]
    fn test_failed_pack_leaves_nothing() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("snapshot_missing");

        match create_archive(out.path(), &missing) {
            Err(SnapshotError::ArchiveCreationFailure { reason, .. }) => {
                assert!(reason.contains("is not a directory"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!out.path().join("snapshot_missing.zip").exists());
        assert!(!out.path().join("snapshot_missing.zip.partial").exists());
    }

    proptest! {
        #[test]
        fn prop_archive_name_round_trips(
            secs in 0i64..4_102_444_800,
            suffix in proptest::option::of(1u32..1000),
        ) {
            let at = Local.timestamp_opt(secs, 0).unwrap();
            let base = snapshot_name(at);
            let dir_name = match suffix {
                Some(n) => format!("{}_{}", base, n),
                None => base,
            };
            let archive = Path::new("/var/tmp/out").join(archive_file_name(&dir_name));
            prop_assert_eq!(snapshot_dir_name_for_archive(&archive), Some(dir_name));
        }
    }
}
