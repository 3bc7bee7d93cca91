//! Error types for pbs_snapshot.
//!
//! Two layers:
//! - [`QueryError`] covers a single command run against the cluster or host
//! - [`SnapshotError`] is the session-level taxonomy
//!
//! Most variants are collector-local: a collector converts them into an
//! [`ItemStatus`] and records them in the registry instead of returning them.
//! Only discovery, output-directory, privilege and archive failures ever
//! surface from a session operation.

use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::Daemon;
use crate::models::ItemStatus;

/// Failure of one administrative or host command
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// Executable is not installed on this host
    #[error("Command not found: '{program}'")]
    NotFound { program: String },

    /// Command did not complete within the configured timeout
    #[error("Command '{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// PBS refused the request for lack of privilege
    #[error("Unauthorized request running '{program}': {stderr}")]
    Unauthorized { program: String, stderr: String },

    /// The PBS server could not be contacted
    #[error("PBS server unavailable for '{program}': {stderr}")]
    ServerUnavailable { program: String, stderr: String },

    /// Command exited non-zero
    #[error("Command '{program}' failed with exit code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Spawning or reading the command failed
    #[error("I/O error running '{program}': {reason}")]
    Io { program: String, reason: String },
}

impl QueryError {
    /// Whether the failure means the server itself could not be reached
    pub fn server_unreachable(&self) -> bool {
        matches!(
            self,
            QueryError::ServerUnavailable { .. }
                | QueryError::Timeout { .. }
                | QueryError::NotFound { .. }
        )
    }

    /// Classify stderr of a failed PBS command
    pub fn from_stderr(program: &str, code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim().to_string();
        if is_permission_message(&stderr) {
            QueryError::Unauthorized {
                program: program.to_string(),
                stderr,
            }
        } else if stderr.contains("Connection refused")
            || stderr.contains("cannot connect to server")
            || stderr.contains("Server unavailable")
        {
            QueryError::ServerUnavailable {
                program: program.to_string(),
                stderr,
            }
        } else {
            QueryError::Failed {
                program: program.to_string(),
                code,
                stderr,
            }
        }
    }
}

/// Check if a message from the OS or a PBS command indicates a permission problem
pub fn is_permission_message(msg: &str) -> bool {
    msg.contains("Permission denied")
        || msg.contains("PermissionDenied")
        || msg.contains("Unauthorized Request")
        || msg.contains("Operation not permitted")
}

/// Session-level error taxonomy
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Owning daemon is not running; expected on partially-up clusters
    #[error("Daemon {0} is not running")]
    DaemonUnavailable(Daemon),

    /// Artifact needs more privilege than the session has
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Optional source does not exist
    #[error("Not found: '{path}'")]
    ArtifactNotFound { path: String },

    /// Scheduler set could not be determined
    #[error("Scheduler discovery failed: {0}")]
    DiscoveryFailure(String),

    /// Archive could not be produced
    #[error("Failed to create archive '{path}': {reason}")]
    ArchiveCreationFailure { path: PathBuf, reason: String },

    /// An artifact could not be rewritten; it stays in the bundle unobfuscated
    #[error("Failed to obfuscate '{path}': {reason}")]
    ObfuscationFailure { path: PathBuf, reason: String },

    /// Output directory missing or unwritable
    #[error("Output directory '{path}' is unusable: {reason}")]
    OutputDirectory { path: PathBuf, reason: String },

    /// Under-privileged and no category reachable
    #[error("Nothing can be captured: {0}")]
    NothingCapturable(String),

    /// Registry bookkeeping violation
    #[error("Registry error: {0}")]
    Registry(String),

    /// Command failure from the cluster boundary
    #[error("{0}")]
    Query(#[from] QueryError),

    /// I/O errors while writing the snapshot tree
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Map a collector-local failure to the status recorded in the registry.
    ///
    /// Expected absences (daemon down, missing optional file, privilege) are
    /// `Skipped`; anything else is `Failed`.
    pub fn item_status(&self) -> ItemStatus {
        match self {
            SnapshotError::DaemonUnavailable(_)
            | SnapshotError::PermissionDenied { .. }
            | SnapshotError::ArtifactNotFound { .. } => ItemStatus::Skipped,
            SnapshotError::Query(QueryError::NotFound { .. })
            | SnapshotError::Query(QueryError::Unauthorized { .. })
            | SnapshotError::Query(QueryError::ServerUnavailable { .. }) => ItemStatus::Skipped,
            SnapshotError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ItemStatus::Skipped
            }
            SnapshotError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ItemStatus::Skipped,
            _ => ItemStatus::Failed,
        }
    }

    /// Whether this failure is a privilege problem
    pub fn is_permission(&self) -> bool {
        match self {
            SnapshotError::PermissionDenied { .. } => true,
            SnapshotError::Query(QueryError::Unauthorized { .. }) => true,
            SnapshotError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Whether this error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SnapshotError::DiscoveryFailure(_)
                | SnapshotError::ArchiveCreationFailure { .. }
                | SnapshotError::OutputDirectory { .. }
                | SnapshotError::NothingCapturable(_)
        )
    }
}

/// Build a path-aware error from an I/O failure
pub fn io_error_at(path: &std::path::Path, err: std::io::Error) -> SnapshotError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => SnapshotError::PermissionDenied {
            path: path.display().to_string(),
        },
        std::io::ErrorKind::NotFound => SnapshotError::ArtifactNotFound {
            path: path.display().to_string(),
        },
        _ => SnapshotError::Io(err),
    }
}
