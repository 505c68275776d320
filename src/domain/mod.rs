//! Core domain types shared by the mergers, the pipeline and the report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub mod error;

pub use error::MergeError;

/// Bumped whenever the JSON report layout changes.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Outcome of a single section, group or key during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionTag {
    /// Present in both; current value applied to new.
    Merge,
    /// Only in current; carried into new.
    Move,
    /// Only in new; left as generated.
    New,
    /// Inventory group in both; host list replaced by current's.
    Replace,
    /// Inventory group only in current; dropped.
    Removed,
}

impl ActionTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::Merge => "MERGE",
            ActionTag::Move => "MOVE",
            ActionTag::New => "NEW",
            ActionTag::Replace => "REPLACE",
            ActionTag::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub target: String,
    pub tag: ActionTag,
}

/// Ordered record of merge decisions.
///
/// Recording the same target twice keeps its original position and takes the
/// latest tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog {
    entries: Vec<ActionEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target name used for a key inside a section.
    pub fn key_target(section: &str, key: &str) -> String {
        format!("{section}/{key}")
    }

    pub fn record(&mut self, target: impl Into<String>, tag: ActionTag) {
        let target = target.into();
        match self.entries.iter_mut().find(|e| e.target == target) {
            Some(existing) => existing.tag = tag,
            None => self.entries.push(ActionEntry { target, tag }),
        }
    }

    pub fn record_key(&mut self, section: &str, key: &str, tag: ActionTag) {
        self.record(Self::key_target(section, key), tag);
    }

    pub fn get(&self, target: &str) -> Option<ActionTag> {
        self.entries.iter().find(|e| e.target == target).map(|e| e.tag)
    }

    pub fn get_key(&self, section: &str, key: &str) -> Option<ActionTag> {
        self.get(&Self::key_target(section, key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, tag: ActionTag) -> usize {
        self.entries.iter().filter(|e| e.tag == tag).count()
    }
}

impl fmt::Display for ActionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}': '{}'", entry.target, entry.tag)?;
        }
        f.write_str("}")
    }
}

/// How a comment block or patch whose anchor line cannot be found is reported.
///
/// Either way the miss is recorded in [`MergeOutcome::warnings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPolicy {
    Silent,
    #[default]
    Warn,
}

impl std::str::FromStr for AnchorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(AnchorPolicy::Silent),
            "warn" => Ok(AnchorPolicy::Warn),
            other => Err(format!("Invalid anchor policy '{other}' (expected 'silent' or 'warn')")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantOutcome {
    pub tenant: String,
    pub vars: ActionLog,
}

/// Result summary of one orchestrated merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub failed: bool,
    pub messages: Vec<String>,
    /// Artifact that caused a failure, when there was one.
    pub failed_path: Option<PathBuf>,
    pub config: ActionLog,
    pub inventory: ActionLog,
    pub vars: ActionLog,
    pub tenants: Vec<TenantOutcome>,
    /// Non-fatal adjustments that were skipped.
    pub warnings: Vec<String>,
    pub command_line_hosts: Vec<String>,
    pub backup: Option<PathBuf>,
}

impl MergeOutcome {
    pub fn failure(error: &MergeError) -> Self {
        Self {
            failed: true,
            messages: vec![error.to_string()],
            failed_path: error.path().map(|p| p.to_path_buf()),
            ..Self::default()
        }
    }
}
