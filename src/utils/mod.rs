//! Snapshot packaging helpers.
//!
//! - **Archive**: multi-threaded ZIP packing with atomic rename and the
//!   archive/snapshot-directory naming invariant
//! - **Manifest**: `snapshot_manifest.json` written at finalize

/// ZIP archive creation and snapshot naming
pub mod archive;

/// Snapshot manifest generation
pub mod manifest;
