use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use uuid::Uuid;

use crate::constants::MANIFEST_FILE;
use crate::models::ItemStatus;
use crate::registry::Registry;

/// Create the JSON manifest of a snapshot.
///
/// Lists every registry item with its path, status and reason, and the
/// per-status counts, under a fresh snapshot id.
///
/// # Example Output
///
/// ```json
/// {
///   "snapshot_id": "550e8400-e29b-41d4-a716-446655440000",
///   "hostname": "head01",
///   "capture_time": "2024-01-15T14:30:52+00:00",
///   "obfuscated": false,
///   "counts": { "captured": 40, "skipped": 6, "failed": 0 },
///   "items": [...]
/// }
/// ```
pub fn create_snapshot_manifest(
    hostname: &str,
    timestamp: &str,
    obfuscated: bool,
    registry: &Registry,
) -> Result<String> {
    let items: Vec<_> = registry
        .iter()
        .map(|item| {
            json!({
                "category": item.category,
                "key": item.key,
                "path": item.path,
                "status": item.status,
                "collector": item.collector,
                "kind": item.kind,
                "reason": item.reason,
                "obfuscation_failed": item.obfuscation_failed,
            })
        })
        .collect();

    let count = |status: ItemStatus| registry.iter().filter(|i| i.status == status).count();

    let manifest = json!({
        "snapshot_id": Uuid::new_v4().to_string(),
        "hostname": hostname,
        "capture_time": timestamp,
        "os": std::env::consts::OS,
        "tool_version": env!("CARGO_PKG_VERSION"),
        "obfuscated": obfuscated,
        "categories": registry.populated_categories(),
        "counts": {
            "captured": count(ItemStatus::Captured),
            "skipped": count(ItemStatus::Skipped),
            "failed": count(ItemStatus::Failed),
        },
        "items": items,
    });

    serde_json::to_string_pretty(&manifest).context("Failed to serialize snapshot manifest to JSON")
}

/// Write the manifest at the snapshot root
pub fn write_snapshot_manifest(
    root: &Path,
    hostname: &str,
    timestamp: &str,
    obfuscated: bool,
    registry: &Registry,
) -> Result<PathBuf> {
    let json = create_snapshot_manifest(hostname, timestamp, obfuscated, registry)?;
    let path = root.join(MANIFEST_FILE);
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
