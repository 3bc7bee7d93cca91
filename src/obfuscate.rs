//! Identifier obfuscation.
//!
//! User and group names found in sensitive attribute lines are mapped to
//! stable placeholders (`pbsuser_N`, `pbsgroup_N`) and rewritten across every
//! text artifact of the snapshot, so the same identity keeps the same
//! placeholder everywhere.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::{Captures, Regex, RegexBuilder};
use walkdir::WalkDir;

use crate::error::SnapshotError;
use crate::models::ArtifactKind;
use crate::registry::Registry;

/// Attributes whose values name users
pub const USER_ATTRIBUTES: &[&str] = &[
    "Authorized_Users",
    "euser",
    "Job_Owner",
    "Reserve_Owner",
    "owner",
    "User_List",
    "acl_users",
    "managers",
    "operators",
];

/// Attributes whose values name groups
pub const GROUP_ATTRIBUTES: &[&str] = &["Authorized_Groups", "egroup", "group_list", "acl_groups"];

lazy_static! {
    /// `name = value` or `name += value`, at line start, after whitespace,
    /// or after a DSV separator. The value runs to end of line or next `|`.
    static ref ATTRIBUTE_LINE: Regex = {
        let names = USER_ATTRIBUTES
            .iter()
            .chain(GROUP_ATTRIBUTES.iter())
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?m)(?:^|[\s|])({})\s*[+-]?=\s*([^|\r\n]*)", names))
            .expect("static attribute pattern is valid")
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdKind {
    User,
    Group,
}

/// Tries per identifier before a placeholder is accepted as is
const PLACEHOLDER_ATTEMPTS: usize = 10_000;

/// Join `-f` style values wrapped onto tab-led continuation lines
pub fn unwrap_continuations(text: &str) -> Cow<'_, str> {
    if text.contains("\n\t") {
        Cow::Owned(text.replace("\n\t", ""))
    } else {
        Cow::Borrowed(text)
    }
}

/// Identifiers named in sensitive attributes of `text`
pub fn extract_identifiers(text: &str) -> Vec<(IdKind, String)> {
    let text = unwrap_continuations(text);
    let mut found = Vec::new();
    for caps in ATTRIBUTE_LINE.captures_iter(&text) {
        let kind = if GROUP_ATTRIBUTES.contains(&&caps[1]) {
            IdKind::Group
        } else {
            IdKind::User
        };
        for raw in caps[2].split(',') {
            if let Some(id) = normalize_identifier(raw) {
                found.push((kind, id));
            }
        }
    }
    found
}

/// Strip `+`/`-` ACL prefixes and `@host` suffixes
fn normalize_identifier(raw: &str) -> Option<String> {
    let id = raw.trim().trim_start_matches(|c| c == '+' || c == '-');
    let id = id.split('@').next().unwrap_or("").trim();
    if id.is_empty() || id == "*" || id.chars().any(char::is_whitespace) {
        None
    } else {
        Some(id.to_string())
    }
}

/// Original identifier → placeholder, built once per session
#[derive(Debug, Clone, Default)]
pub struct ObfuscationMap {
    entries: BTreeMap<String, String>,
}

impl ObfuscationMap {
    /// Assign placeholders; a placeholder never contains a mapped identifier
    pub fn build(ids: impl IntoIterator<Item = (IdKind, String)>) -> Self {
        let mut by_id: BTreeMap<String, IdKind> = BTreeMap::new();
        for (kind, id) in ids {
            // First classification wins
            by_id.entry(id).or_insert(kind);
        }

        let all: BTreeSet<&str> = by_id.keys().map(|s| s.as_str()).collect();
        let mut entries = BTreeMap::new();
        let (mut users, mut groups) = (0usize, 0usize);
        for (id, kind) in &by_id {
            let placeholder = match kind {
                IdKind::User => next_placeholder("pbsuser_", &mut users, &all),
                IdKind::Group => next_placeholder("pbsgroup_", &mut groups, &all),
            };
            entries.insert(id.clone(), placeholder);
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }
}

/// Rewrites identifiers using one longest-first literal alternation
#[derive(Debug)]
pub struct Obfuscator {
    map: ObfuscationMap,
    pattern: Option<Regex>,
}

impl Obfuscator {
    pub fn new(map: ObfuscationMap) -> Result<Self, SnapshotError> {
        let pattern = if map.is_empty() {
            None
        } else {
            let mut ids: Vec<&String> = map.entries.keys().collect();
            ids.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = ids
                .iter()
                .map(|id| regex::escape(id))
                .collect::<Vec<_>>()
                .join("|");
            let regex = RegexBuilder::new(&alternation)
                .size_limit(64 * 1024 * 1024)
                .build()
                .map_err(|e| SnapshotError::ObfuscationFailure {
                    path: PathBuf::new(),
                    reason: e.to_string(),
                })?;
            Some(regex)
        };
        Ok(Self { map, pattern })
    }

    /// Scan every captured text artifact of the registry and build the map
    pub fn scan(root: &Path, registry: &Registry) -> Result<Self, SnapshotError> {
        let mut ids = Vec::new();
        for item in registry.iter().filter(|i| i.is_captured()) {
            if item.kind != ArtifactKind::Text {
                continue;
            }
            let Some(rel) = item.relative_path() else {
                continue;
            };
            if let Ok(text) = fs::read_to_string(root.join(rel)) {
                ids.extend(extract_identifiers(&text));
            }
        }
        let map = ObfuscationMap::build(ids);
        info!("Obfuscation map holds {} identifier(s)", map.len());
        Self::new(map)
    }

    pub fn map(&self) -> &ObfuscationMap {
        &self.map
    }

    pub fn rewrite_text(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &Captures| {
                    self.map.get(&caps[0]).unwrap_or(&caps[0]).to_string()
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    /// Whether any mapped identifier occurs verbatim in `text`, including
    /// across a wrapped line
    pub fn contains_identifier(&self, text: &str) -> bool {
        let unwrapped = unwrap_continuations(text);
        self.map
            .entries
            .keys()
            .any(|id| text.contains(id.as_str()) || unwrapped.contains(id.as_str()))
    }

    /// Rewrite and re-check one file. Non-UTF-8 files are left alone.
    pub fn rewrite_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let text = match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    debug!("Leaving binary file {} untouched", path.display());
                    return Ok(());
                }
            },
            Err(e) => {
                return Err(SnapshotError::ObfuscationFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        if !self.contains_identifier(&text) {
            return Ok(());
        }
        let rewritten = self.rewrite_text(&text);
        fs::write(path, &rewritten).map_err(|e| SnapshotError::ObfuscationFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let check = fs::read_to_string(path).map_err(|e| SnapshotError::ObfuscationFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if self.contains_identifier(&check) {
            return Err(SnapshotError::ObfuscationFailure {
                path: path.to_path_buf(),
                reason: "identifiers remain after rewrite".to_string(),
            });
        }
        Ok(())
    }

    /// Rewrite every captured text artifact and directory.
    ///
    /// Failures flag the item and are otherwise non-fatal. Returns the
    /// number of flagged items.
    pub fn apply(&self, root: &Path, registry: &mut Registry) -> usize {
        if self.pattern.is_none() {
            return 0;
        }

        let mut flagged = 0;
        for item in registry.iter_mut().filter(|i| i.is_captured()) {
            let Some(rel) = item.path.clone() else {
                continue;
            };
            let path = root.join(&rel);
            let result = match item.kind {
                ArtifactKind::Text => self.rewrite_file(&path),
                ArtifactKind::Directory => self.rewrite_tree(&path),
                ArtifactKind::Binary => Ok(()),
            };
            if let Err(e) = result {
                warn!("{}", e);
                item.obfuscation_failed = true;
                flagged += 1;
            }
        }
        flagged
    }

    fn rewrite_tree(&self, dir: &Path) -> Result<(), SnapshotError> {
        let mut first_error = None;
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Err(e) = self.rewrite_file(entry.path()) {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Next `<prefix><N>` that contains no mapped identifier.
///
/// When the prefix itself contains one, no number helps; the rewrite check
/// then flags the affected artifacts.
fn next_placeholder(prefix: &str, counter: &mut usize, ids: &BTreeSet<&str>) -> String {
    let clashes = |candidate: &str| ids.iter().any(|id| candidate.contains(id));
    if clashes(prefix) {
        warn!("An identifier occurs in placeholder prefix '{}'", prefix);
        *counter += 1;
        return format!("{}{}", prefix, counter);
    }
    for _ in 0..PLACEHOLDER_ATTEMPTS {
        *counter += 1;
        let candidate = format!("{}{}", prefix, counter);
        if !clashes(&candidate) {
            return candidate;
        }
    }
    *counter += 1;
    format!("{}{}", prefix, counter)
}
