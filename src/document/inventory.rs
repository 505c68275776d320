//! Inventory reading and host-group classification.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use super::ini::{Entry, IniError, SectionedDocument};

/// Header injected when an inventory has host entries before its first group.
pub const HOST_DEFINITIONS: &str = "host-definitions";
/// Synthetic group listing hosts supplied outside named groups.
pub const COMMAND_LINE: &str = "CommandLine";
pub const CHILDREN_SUFFIX: &str = ":children";
pub const VARS_SUFFIX: &str = ":vars";
/// Stands in for `#` so comment lines survive parsing as entries.
pub const COMMENT_SENTINEL: &str = "99999;";
/// Placeholder host for new groups; an operator must replace it.
pub const CHOOSE_TARGET_HOST: &str = "? choose-target-host";

static RANGE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+$").expect("valid regex"));
static RANGE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\]\S*").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Children,
    /// Group variables (`[name:vars]`); holds assignments, not hosts.
    Vars,
    CommandLine,
    HostDefinitions,
    Generic,
}

impl GroupKind {
    pub fn of(name: &str) -> Self {
        if name.ends_with(CHILDREN_SUFFIX) {
            GroupKind::Children
        } else if name.ends_with(VARS_SUFFIX) {
            GroupKind::Vars
        } else if name == COMMAND_LINE {
            GroupKind::CommandLine
        } else if name == HOST_DEFINITIONS {
            GroupKind::HostDefinitions
        } else {
            GroupKind::Generic
        }
    }
}

pub fn encode_comments(text: &str) -> String {
    text.replace('#', COMMENT_SENTINEL)
}

pub fn decode_comments(text: &str) -> String {
    text.replace(COMMENT_SENTINEL, "#")
}

/// Parse an inventory, injecting the `[host-definitions]` header when the text
/// starts with entries instead of a group.
///
/// With `keep_comments` the comment lines are encoded first so they come back
/// as entries.
pub fn parse_inventory(text: &str, keep_comments: bool) -> Result<SectionedDocument, IniError> {
    let source: Cow<'_, str> =
        if keep_comments { Cow::Owned(encode_comments(text)) } else { Cow::Borrowed(text) };

    let verbatim = keep_comments.then_some(COMMENT_SENTINEL);
    match SectionedDocument::parse_with(&source, false, verbatim) {
        Err(IniError::MissingSectionHeader { .. }) => SectionedDocument::parse_with(
            &format!("[{HOST_DEFINITIONS}]\n{source}"),
            false,
            verbatim,
        ),
        other => other,
    }
}

/// First whitespace-delimited token of an entry key.
///
/// A range key that parsing split at its colon (`ucs[01` / `32] ...`) is
/// rebuilt as `ucs[01:32]`.
pub fn host_identifier(entry: &Entry) -> String {
    let first = entry.key.split_whitespace().next().unwrap_or("");
    if first == entry.key && RANGE_OPEN.is_match(first) {
        if let Some(close) = entry.value.as_deref().and_then(|v| RANGE_CLOSE.find(v)) {
            return format!("{first}:{}", close.as_str());
        }
    }
    first.to_string()
}

pub fn is_comment_entry(entry: &Entry) -> bool {
    entry.key.starts_with(COMMENT_SENTINEL)
}
