//! String-level insertion of newly required keys into a written `vars.yml`.
//!
//! Each patch names an anchor key. Before every mapping line with that key the
//! patch inserts its keys as siblings in the same mapping, so a sequence item
//! `- PCP_PORT: ...` becomes `- HA_PGPOOL_VIRTUAL_IP: ''` followed by the rest.
//! Keys the item already has are not inserted again.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static MAPPING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent> *)(?P<dash>- +)?(?P<key>[A-Za-z_][A-Za-z0-9_.\-]*):(?:\s|$)")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub name: &'static str,
    pub anchor_key: &'static str,
    pub insert: &'static [(&'static str, &'static str)],
}

/// Postgres HA properties for the pgpool invocation variables.
pub const HA_PROPERTIES: Patch = Patch {
    name: "ha_properties",
    anchor_key: "PCP_PORT",
    insert: &[("HA_PGPOOL_VIRTUAL_IP", "''"), ("HA_PGPOOL_WATCHDOG_PORT", "''"), ("POOL_NUMBER", "'0'")],
};

pub const PERMS_OVERRIDE: Patch = Patch {
    name: "perms_override",
    anchor_key: "PGPOOL_PORT",
    insert: &[("PERMS_OVERRIDE", "'false'")],
};

pub const PGPOOL_HEARTBEAT: Patch = Patch {
    name: "pgpool_heartbeat",
    anchor_key: "POOL_NUMBER",
    insert: &[("HA_PGPOOL_HEARTBEAT_PORT", "''")],
};

/// Which patches to apply. They always run in the order of the fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub ha_properties: bool,
    pub perms_override: bool,
    pub pgpool_heartbeat: bool,
}

impl PatchSet {
    pub fn enabled(&self) -> Vec<&'static Patch> {
        let mut patches = Vec::new();
        if self.ha_properties {
            patches.push(&HA_PROPERTIES);
        }
        if self.perms_override {
            patches.push(&PERMS_OVERRIDE);
        }
        if self.pgpool_heartbeat {
            patches.push(&PGPOOL_HEARTBEAT);
        }
        patches
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub name: &'static str,
    pub anchor_key: &'static str,
    /// Anchor lines found.
    pub anchors: usize,
    /// Lines inserted across all anchors.
    pub inserted: usize,
}

impl PatchReport {
    pub fn anchor_missing(&self) -> bool {
        self.anchors == 0
    }
}

struct MappingLine<'a> {
    indent: usize,
    dash: &'a str,
    key: &'a str,
}

impl MappingLine<'_> {
    fn key_column(&self) -> usize {
        self.indent + self.dash.len()
    }
}

fn mapping_line(line: &str) -> Option<MappingLine<'_>> {
    let caps = MAPPING_LINE.captures(line)?;
    Some(MappingLine {
        indent: caps.name("indent").map_or(0, |m| m.as_str().len()),
        dash: caps.name("dash").map_or("", |m| m.as_str()),
        key: caps.name("key").map_or("", |m| m.as_str()),
    })
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Keys of the mapping item that contains the key at `column` on line `at`.
fn item_keys<'a>(lines: &[&'a str], at: usize, column: usize) -> Vec<&'a str> {
    let mut keys = Vec::new();

    for &line in lines[..at].iter().rev() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);
        match mapping_line(line) {
            Some(m) if indent < column => {
                if !m.dash.is_empty() && m.key_column() == column {
                    keys.push(m.key);
                }
                break;
            }
            Some(m) if indent == column && m.dash.is_empty() => keys.push(m.key),
            _ if indent < column => break,
            _ => {}
        }
    }

    for &line in &lines[at + 1..] {
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);
        if indent < column {
            break;
        }
        if let Some(m) = mapping_line(line) {
            if indent == column && m.dash.is_empty() {
                keys.push(m.key);
            }
        }
    }

    keys
}

pub fn apply_patch(text: &str, patch: &Patch) -> (String, PatchReport) {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut report =
        PatchReport { name: patch.name, anchor_key: patch.anchor_key, anchors: 0, inserted: 0 };

    for (idx, line) in lines.iter().enumerate() {
        let Some(m) = mapping_line(line).filter(|m| m.key == patch.anchor_key) else {
            out.push(line.to_string());
            continue;
        };
        report.anchors += 1;

        let column = m.key_column();
        let present = item_keys(&lines, idx, column);
        let missing: Vec<_> =
            patch.insert.iter().filter(|(key, _)| !present.contains(key)).collect();
        if missing.is_empty() {
            out.push(line.to_string());
            continue;
        }

        let pad = " ".repeat(column);
        for (pos, (key, value)) in missing.iter().enumerate() {
            if pos == 0 && !m.dash.is_empty() {
                out.push(format!("{}{}{key}: {value}", " ".repeat(m.indent), m.dash));
            } else {
                out.push(format!("{pad}{key}: {value}"));
            }
        }
        if m.dash.is_empty() {
            out.push(line.to_string());
        } else {
            out.push(format!("{pad}{}", &line[column..]));
        }
        report.inserted += missing.len();
    }

    let mut patched = out.join("\n");
    if text.ends_with('\n') {
        patched.push('\n');
    }
    (patched, report)
}

/// Apply every enabled patch in order.
pub fn apply_patches(text: &str, set: &PatchSet) -> (String, Vec<PatchReport>) {
    let mut current = text.to_string();
    let mut reports = Vec::new();
    for patch in set.enabled() {
        let (patched, report) = apply_patch(&current, patch);
        tracing::info!(
            "Patch {} matched {} anchor line(s) for {} and inserted {} line(s).",
            report.name,
            report.anchors,
            report.anchor_key,
            report.inserted
        );
        current = patched;
        reports.push(report);
    }
    (current, reports)
}
