//! In-memory manifest of everything a session captured.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::constants::{keys, CORE_DIR, JOB_DIR, RESV_DIR, SNAPSHOT_LOG_FILE};
use crate::error::SnapshotError;
use crate::models::{Category, CollectedItem};

/// Typed predicate exempting items from verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Category(Category),
    Key(String),
    /// Leading path component of the item's relative path
    Subtree(String),
    /// Final path component of the item's relative path
    FileName(String),
}

impl Exclusion {
    /// Items whose size or presence legitimately varies between runs
    pub fn high_volume() -> Vec<Exclusion> {
        vec![
            Exclusion::Key(keys::ACCT_LOGS.to_string()),
            Exclusion::Key(keys::QMGR_LPBSHOOK.to_string()),
            Exclusion::Subtree(RESV_DIR.to_string()),
            Exclusion::Subtree(JOB_DIR.to_string()),
            Exclusion::Key(keys::QMGR_PR.to_string()),
            Exclusion::Key(keys::PG_LOGS.to_string()),
            Exclusion::Subtree(CORE_DIR.to_string()),
            Exclusion::FileName(SNAPSHOT_LOG_FILE.to_string()),
        ]
    }

    pub fn matches(&self, item: &CollectedItem) -> bool {
        match self {
            Exclusion::Category(c) => item.category == *c,
            Exclusion::Key(k) => item.key == *k,
            Exclusion::Subtree(s) => item
                .relative_path()
                .and_then(|p| p.components().next())
                .map(|c| matches!(c, Component::Normal(n) if n == s.as_str()))
                .unwrap_or(false),
            Exclusion::FileName(f) => item
                .relative_path()
                .and_then(Path::file_name)
                .map(|n| n == f.as_str())
                .unwrap_or(false),
        }
    }
}

/// Item that should exist on disk but does not
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissingItem {
    pub category: Category,
    pub key: String,
    pub path: PathBuf,
}

/// Category → key → item. Append-only until sealed.
#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    items: BTreeMap<Category, BTreeMap<String, CollectedItem>>,
    sealed: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let items = Category::ALL
            .iter()
            .map(|c| (*c, BTreeMap::new()))
            .collect();
        Self {
            items,
            sealed: false,
        }
    }

    /// Record an item.
    ///
    /// The same producer may replace its own entry; a different producer
    /// may not claim the key.
    pub fn register(&mut self, item: CollectedItem) -> Result<(), SnapshotError> {
        if self.sealed {
            return Err(SnapshotError::Registry(format!(
                "registry is sealed, cannot add {}/{}",
                item.category, item.key
            )));
        }

        let entries = self.items.entry(item.category).or_default();
        if let Some(existing) = entries.get(&item.key) {
            if existing.collector != item.collector {
                return Err(SnapshotError::Registry(format!(
                    "{}/{} already registered by {}, rejected from {}",
                    item.category, item.key, existing.collector, item.collector
                )));
            }
            debug!("Replacing {}/{}", item.category, item.key);
        }
        entries.insert(item.key.clone(), item);
        Ok(())
    }

    pub fn lookup(&self, category: Category, key: &str) -> Option<&CollectedItem> {
        self.items.get(&category).and_then(|m| m.get(key))
    }

    pub fn category(&self, category: Category) -> &BTreeMap<String, CollectedItem> {
        // Every category is inserted at construction
        &self.items[&category]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectedItem> {
        self.items.values().flat_map(|m| m.values())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut CollectedItem> {
        self.items.values_mut().flat_map(|m| m.values_mut())
    }

    pub fn len(&self) -> usize {
        self.items.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Categories with at least one item
    pub fn populated_categories(&self) -> Vec<Category> {
        self.items
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Check that every item with a path exists under `root`
    pub fn verify(&self, root: &Path, exclusions: &[Exclusion]) -> Vec<MissingItem> {
        self.iter()
            .filter(|item| !exclusions.iter().any(|e| e.matches(item)))
            .filter_map(|item| {
                let rel = item.relative_path()?;
                if root.join(rel).exists() {
                    None
                } else {
                    Some(MissingItem {
                        category: item.category,
                        key: item.key.clone(),
                        path: rel.to_path_buf(),
                    })
                }
            })
            .collect()
    }
}
