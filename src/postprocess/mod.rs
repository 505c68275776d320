//! Repair pass over the serialized inventory.
//!
//! The generic INI writer leaves the injected `[host-definitions]` header,
//! `key = value` spacing, split host ranges and encoded comments behind. This
//! module undoes them and puts the baseline's comment blocks back in place.

pub mod comments;
pub mod rules;

use std::collections::BTreeMap;

pub use comments::{reinject_comments, Reinjection};
use crate::document::inventory::COMMENT_SENTINEL;
use rules::REPAIR_RULES;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repair {
    pub text: String,
    /// Replacements made per rule name.
    pub counts: BTreeMap<String, usize>,
    pub comments_inserted: usize,
    pub missed_anchors: Vec<String>,
}

/// Apply the text repairs only, without touching comments from a baseline.
pub fn apply_rules(text: &str) -> (String, BTreeMap<String, usize>) {
    let mut counts = BTreeMap::new();
    let mut repaired = text.to_string();
    for rule in REPAIR_RULES.iter() {
        let mut replaced = 0usize;
        repaired = rule
            .pattern
            .replace_all(&repaired, |caps: &regex::Captures<'_>| {
                if rule.skip_comments && caps[0].trim_start().starts_with(COMMENT_SENTINEL) {
                    return caps[0].to_string();
                }
                replaced += 1;
                let mut expanded = String::new();
                caps.expand(rule.replacement, &mut expanded);
                expanded
            })
            .into_owned();
        if replaced > 0 {
            counts.insert(rule.name.to_string(), replaced);
        }
    }
    (repaired, counts)
}

/// Repair `serialized` and re-inject comment blocks from `baseline`, the new
/// inventory's text as it was before the merge.
pub fn repair(serialized: &str, baseline: &str) -> Repair {
    let (text, counts) = apply_rules(serialized);
    let reinjected = reinject_comments(&text, baseline);
    Repair {
        text: reinjected.text,
        counts,
        comments_inserted: reinjected.inserted,
        missed_anchors: reinjected.missed,
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_rules, repair};
    use crate::document::inventory::parse_inventory;
    use crate::merge::merge_inventory;
    use crate::policy::DenyList;
    use similar_asserts::assert_eq;

    #[test]
    fn removes_synthetic_header() {
        let (text, counts) = apply_rules("[host-definitions]\nh1\n\n[workers]\nh1\n\n");
        assert_eq!(text, "h1\n\n[workers]\nh1\n");
        assert_eq!(counts.get("synthetic_header"), Some(&1));
        assert_eq!(counts.get("trailing_blank_lines"), Some(&1));
    }

    #[test]
    fn restores_host_range_colon() {
        let (text, _) = apply_rules("[workers]\nucs[01 = 32]\nweb[1 = 4].example.com ansible_user = sas\n");
        assert_eq!(text, "[workers]\nucs[01:32]\nweb[1:4].example.com ansible_user=sas\n");
    }

    #[test]
    fn collapses_assignment_spacing() {
        let (text, counts) = apply_rules("h1 ansible_host = 10.0.0.1\n[all:vars]\nansible_user = sas\n");
        assert_eq!(text, "h1 ansible_host=10.0.0.1\n[all:vars]\nansible_user=sas\n");
        assert_eq!(counts.get("compact_assignment"), Some(&2));
    }

    #[test]
    fn decodes_comment_sentinel() {
        let (text, _) = apply_rules("[sas_all:children]\n99999; every role\nworkers\n");
        assert_eq!(text, "[sas_all:children]\n# every role\nworkers\n");
    }

    #[test]
    fn comment_lines_keep_their_delimiters() {
        let (text, counts) =
            apply_rules("[all:vars]\n99999; retries = 3\n99999; slot[1 = 2]\nansible_user = sas\n");
        assert_eq!(text, "[all:vars]\n# retries = 3\n# slot[1 = 2]\nansible_user=sas\n");
        assert_eq!(counts.get("compact_assignment"), Some(&1));
        assert!(counts.get("host_range").is_none());
    }

    #[test]
    fn untouched_text_reports_no_counts() {
        let (text, counts) = apply_rules("[workers]\nh1\n");
        assert_eq!(text, "[workers]\nh1\n");
        assert!(counts.is_empty());
    }

    #[test]
    fn identical_current_and_new_restore_comment_placement() {
        let baseline = "\
# Deployment targets
deployTarget ansible_host=10.0.0.1 ansible_user=sas
ucs[01:04] ansible_host=10.0.1.1

# Workers run the batch jobs
[workers]
deployTarget
ucs[01:04]

[cache]
deployTarget

[sas_all:children]
# every role above
workers
cache
";
        let current = parse_inventory(baseline, false).expect("current");
        let mut new = parse_inventory(baseline, true).expect("new");
        merge_inventory(&current, &mut new, None, &DenyList::default());

        let repaired = repair(&new.to_ini_string(), baseline);

        assert_eq!(repaired.text, baseline);
        assert!(repaired.missed_anchors.is_empty());
        assert_eq!(repaired.comments_inserted, 2);
    }

    fn round_trip(baseline: &str) -> String {
        let current = parse_inventory(baseline, false).expect("current");
        let mut new = parse_inventory(baseline, true).expect("new");
        merge_inventory(&current, &mut new, None, &DenyList::default());
        repair(&new.to_ini_string(), baseline).text
    }

    #[test]
    fn children_comments_with_delimiters_round_trip() {
        let baseline = "[workers]\nh1\n\n[sas_all:children]\n# note: all roles\n# weight = 2\nworkers\n";
        assert_eq!(round_trip(baseline), baseline);
    }

    #[test]
    fn comment_above_first_group_round_trips() {
        let baseline = "# hdr\n[workers]\nh1\n";
        assert_eq!(round_trip(baseline), baseline);
    }
}
