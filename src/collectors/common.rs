use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};
use walkdir::WalkDir;

use crate::cluster::AdminCommand;
use crate::collectors::{CaptureContext, ItemSink};
use crate::error::{io_error_at, SnapshotError};
use crate::models::{ArtifactKind, Category};

/// Skip reason for server queries when `qstat -B` got no answer
pub const SERVER_UNREACHABLE: &str = "PBS server is unreachable";

/// Write `content` to `root/rel`, creating parents
pub async fn write_text(root: &Path, rel: &str, content: &str) -> Result<(), SnapshotError> {
    let dest = root.join(rel);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error_at(parent, e))?;
    }
    tokio::fs::write(&dest, content)
        .await
        .map_err(|e| io_error_at(&dest, e))
}

/// Run a query and store its output as one text artifact
pub async fn capture_query(
    ctx: &CaptureContext,
    sink: &ItemSink,
    category: Category,
    key: &str,
    command: AdminCommand,
    rel: &str,
) {
    let output = match ctx.cluster.query(command).await {
        Ok(output) => output,
        Err(e) => {
            debug!("{} failed: {}", command.display_line(), e);
            sink.error(category, key, &SnapshotError::from(e));
            return;
        }
    };

    match write_text(&ctx.root, rel, &output).await {
        Ok(()) => sink.captured(category, key, rel, ArtifactKind::Text),
        Err(e) => sink.error(category, key, &e),
    }
}

/// Run a batch of server queries, or skip them all when the server did not
/// answer `qstat -B`
pub async fn capture_server_queries(
    ctx: &CaptureContext,
    sink: &ItemSink,
    category: Category,
    queries: &[(&'static str, AdminCommand, &'static str)],
) {
    if !ctx.server_reachable {
        for (key, _, _) in queries {
            sink.skipped(category, key, SERVER_UNREACHABLE);
        }
        return;
    }
    for (key, command, rel) in queries {
        capture_query(ctx, sink, category, key, *command, rel).await;
    }
}

/// Copy one file from the installation
pub async fn capture_file(
    ctx: &CaptureContext,
    sink: &ItemSink,
    category: Category,
    key: &str,
    source: PathBuf,
    rel: &str,
) {
    let dest = ctx.dest(rel);
    let result = blocking(move || {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error_at(parent, e))?;
        }
        fs::copy(&source, &dest).map_err(|e| io_error_at(&source, e))?;
        Ok(())
    })
    .await;

    match result {
        Ok(()) => sink.captured(category, key, rel, ArtifactKind::Text),
        Err(e) => sink.error(category, key, &e),
    }
}

/// Copy a whole directory tree
pub async fn capture_tree(
    ctx: &CaptureContext,
    sink: &ItemSink,
    category: Category,
    key: &str,
    source: PathBuf,
    rel: &str,
) {
    let dest = ctx.dest(rel);
    match blocking(move || copy_tree(&source, &dest)).await {
        Ok(count) => {
            debug!("Copied {} files into {}", count, rel);
            sink.captured(category, key, rel, ArtifactKind::Directory);
        }
        Err(e) => sink.error(category, key, &e),
    }
}

/// Copy the `limit` most recent files of a log directory.
///
/// `None` means the count is zero: nothing is created and the key is skipped.
pub async fn capture_recent_logs(
    ctx: &CaptureContext,
    sink: &ItemSink,
    category: Category,
    key: &str,
    source: PathBuf,
    rel: &str,
    limit: Option<usize>,
) {
    let Some(limit) = limit else {
        sink.skipped(category, key, "log count is zero");
        return;
    };

    let dest = ctx.dest(rel);
    match blocking(move || copy_recent_files(&source, &dest, limit)).await {
        Ok(count) => {
            debug!("Copied {} most recent files into {}", count, rel);
            sink.captured(category, key, rel, ArtifactKind::Directory);
        }
        Err(e) => sink.error(category, key, &e),
    }
}

/// Record every key as skipped for the same reason
pub fn skip_all(sink: &ItemSink, category: Category, keys: &[&str], reason: &str) {
    for key in keys {
        sink.skipped(category, key, reason);
    }
}

async fn blocking<T, F>(f: F) -> Result<T, SnapshotError>
where
    F: FnOnce() -> Result<T, SnapshotError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SnapshotError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?
}

/// Recursively copy `source` into `dest`. Unreadable entries below the root
/// are logged and left out.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<usize, SnapshotError> {
    // Fail early when the root itself cannot be read
    fs::read_dir(source).map_err(|e| io_error_at(source, e))?;
    fs::create_dir_all(dest).map_err(|e| io_error_at(dest, e))?;

    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping entry under {}: {}", source.display(), e);
                continue;
            }
        };
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_error_at(&target, e))?;
        } else if entry.file_type().is_file() {
            match fs::copy(entry.path(), &target) {
                Ok(_) => copied += 1,
                Err(e) => warn!("Failed to copy {}: {}", entry.path().display(), e),
            }
        }
    }
    Ok(copied)
}

/// Regular files of `dir`, most recent first; ties broken by name, highest first
pub fn recent_files(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error_at(dir, e))? {
        let entry = entry.map_err(|e| io_error_at(dir, e))?;
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((mtime, name, entry.path()));
    }

    files.sort_by_key(|(mtime, name, _)| Reverse((*mtime, name.clone())));
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Copy the `limit` most recent files of `source` into `dest`
pub fn copy_recent_files(source: &Path, dest: &Path, limit: usize) -> Result<usize, SnapshotError> {
    let files = recent_files(source)?;
    fs::create_dir_all(dest).map_err(|e| io_error_at(dest, e))?;

    let mut copied = 0;
    for file in files.iter().take(limit) {
        let Some(name) = file.file_name() else {
            continue;
        };
        match fs::copy(file, dest.join(name)) {
            Ok(_) => copied += 1,
            Err(e) => warn!("Failed to copy {}: {}", file.display(), e),
        }
    }
    Ok(copied)
}
