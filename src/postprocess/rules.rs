//! Text repairs for a serialized inventory
//!
//! ORDER MATTERS: the host-range repair must run BEFORE the generic spacing
//! collapse, otherwise `ucs[01 = 32]` would become `ucs[01=32]`. Both run
//! before the comment sentinel is decoded, so they can tell comment lines apart.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::inventory::{COMMENT_SENTINEL, HOST_DEFINITIONS};

#[derive(Clone)]
pub struct RepairRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub replacement: &'static str,
    /// Leave encoded comment lines alone.
    pub skip_comments: bool,
}

pub static REPAIR_RULES: Lazy<Vec<RepairRule>> = Lazy::new(|| {
    vec![
        // ── Header injected at read time ──────────────────────────────────────
        RepairRule {
            name: "synthetic_header",
            pattern: Regex::new(&format!(r"(?m)^\[{}\]\r?\n", regex::escape(HOST_DEFINITIONS)))
                .expect("valid regex"),
            replacement: "",
            skip_comments: false,
        },
        // ── Host ranges split at their colon: ucs[01 = 32] ────────────────────
        RepairRule {
            name: "host_range",
            pattern: Regex::new(r"(?m)^(.*\[\d+) = (\d+\].*)$").expect("valid regex"),
            replacement: "${1}:${2}",
            skip_comments: true,
        },
        // ── Generic `key = value` spacing ─────────────────────────────────────
        RepairRule {
            name: "compact_assignment",
            pattern: Regex::new(r"(?m)^(.*) = (.*)$").expect("valid regex"),
            replacement: "${1}=${2}",
            skip_comments: true,
        },
        // ── Encoded comments ──────────────────────────────────────────────────
        RepairRule {
            name: "comment_sentinel",
            pattern: Regex::new(&regex::escape(COMMENT_SENTINEL)).expect("valid regex"),
            replacement: "#",
            skip_comments: false,
        },
        // ── Blank lines the writer leaves after the last group ────────────────
        RepairRule {
            name: "trailing_blank_lines",
            pattern: Regex::new(r"\n\n+\z").expect("valid regex"),
            replacement: "\n",
            skip_comments: false,
        },
    ]
});
