//! Permission-skip reporting
//!
//! Collects the items a session had to skip for lack of privilege and tells
//! the operator how to get a complete snapshot.

use std::collections::BTreeSet;

use log::warn;

use crate::error::is_permission_message;
use crate::models::ItemStatus;
use crate::privileges::get_elevation_instructions;
use crate::registry::Registry;

/// Reason recorded for items gated on root
pub const REQUIRES_ROOT: &str = "requires root";

/// Items skipped because of insufficient privileges
#[derive(Debug, Clone, Default)]
pub struct PermissionTracker {
    skipped: BTreeSet<String>,
}

impl PermissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gather permission skips from a registry
    pub fn from_registry(registry: &Registry) -> Self {
        let mut tracker = Self::new();
        for item in registry.iter() {
            if item.status != ItemStatus::Skipped {
                continue;
            }
            if let Some(reason) = &item.reason {
                if Self::is_permission_reason(reason) {
                    tracker.record(&format!("{}/{}", item.category, item.key));
                }
            }
        }
        tracker
    }

    pub fn record(&mut self, name: &str) {
        self.skipped.insert(name.to_string());
    }

    pub fn is_permission_reason(reason: &str) -> bool {
        reason == REQUIRES_ROOT || is_permission_message(reason)
    }

    pub fn failure_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn should_suggest_elevation(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Report permission skips and provide guidance
    pub fn report_failures(&self) {
        if !self.should_suggest_elevation() {
            return;
        }

        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        warn!("Permission Issues Summary");
        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        warn!(
            "The following {} item(s) were skipped due to insufficient permissions:",
            self.failure_count()
        );
        for name in &self.skipped {
            warn!("  • {}", name);
        }
        warn!("");
        warn!("To capture them: {}", get_elevation_instructions());
        warn!("Note: the snapshot contains everything that was accessible.");
        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}
