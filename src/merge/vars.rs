//! Variables-document merge (`vars.yml` and per-tenant variants).
//!
//! Only top-level keys are merged; a nested value is replaced as a whole.

use crate::document::{key_label, VarsDocument};
use crate::domain::{ActionLog, ActionTag};
use crate::policy::DenyList;

pub fn merge_vars(current: &VarsDocument, new: &mut VarsDocument, deny: &DenyList) -> ActionLog {
    let mut log = ActionLog::new();
    let new_keys: Vec<_> = new.keys().cloned().collect();

    for key in current.keys() {
        let label = key_label(key);
        if key.as_str().is_some_and(|k| deny.is_denied(k)) {
            tracing::info!("The option {label} will not be carried to the newer vars.yml file.");
            continue;
        }
        let tag = if new.contains(key) {
            tracing::info!("The current value of the option {label} was merged into the vars.yml file.");
            ActionTag::Merge
        } else {
            tracing::info!("The option {label} was merged into the newer vars.yml file.");
            ActionTag::Move
        };
        new.copy_entry(current, key);
        log.record(label, tag);
    }

    for key in &new_keys {
        if !current.contains(key) {
            log.record(key_label(key), ActionTag::New);
        }
    }

    log
}

#[cfg(test)]
mod tests {
    use super::merge_vars;
    use crate::document::VarsDocument;
    use crate::domain::ActionTag;
    use crate::policy::DenyList;
    use serde_yaml::Value;

    fn parse(text: &str) -> VarsDocument {
        VarsDocument::parse(text).expect("parse")
    }

    #[test]
    fn denied_key_keeps_new_value() {
        let current = parse("DEPLOYMENT_ID: abc123\n");
        let mut new = parse("DEPLOYMENT_ID: xyz789\n");

        let log = merge_vars(&current, &mut new, &DenyList::default());

        assert_eq!(new.get("DEPLOYMENT_ID"), Some(&Value::from("xyz789")));
        assert!(log.get("DEPLOYMENT_ID").is_none());
    }

    #[test]
    fn nested_values_are_replaced_whole() {
        let current = parse("INVOCATION_VARIABLES:\n  pgpoolc:\n  - PCP_PORT: '5430'\n");
        let mut new =
            parse("INVOCATION_VARIABLES:\n  pgpoolc:\n  - PCP_PORT: '5432'\n  cpspgpoolc: []\n");

        let log = merge_vars(&current, &mut new, &DenyList::default());

        assert_eq!(new.get("INVOCATION_VARIABLES"), current.get("INVOCATION_VARIABLES"));
        assert_eq!(log.get("INVOCATION_VARIABLES"), Some(ActionTag::Merge));
    }

    #[test]
    fn tags_move_and_new() {
        let current = parse("site_only: 1\nshared: old\n");
        let mut new = parse("shared: fresh\nrelease_only: true\n");

        let log = merge_vars(&current, &mut new, &DenyList::default());

        assert_eq!(log.get("site_only"), Some(ActionTag::Move));
        assert_eq!(log.get("shared"), Some(ActionTag::Merge));
        assert_eq!(log.get("release_only"), Some(ActionTag::New));
        assert_eq!(new.get("shared"), Some(&Value::from("old")));
        let keys: Vec<_> = new.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["shared", "release_only", "site_only"]);
    }

    #[test]
    fn release_comments_survive_the_merge() {
        let current = parse("a: 1\nsite_only: 'x'\n");
        let mut new = parse("---\n# keep me\na: 2\n\n# documented default\nb: true\n");

        merge_vars(&current, &mut new, &DenyList::default());

        assert_eq!(
            new.to_yaml_string().expect("yaml"),
            "---\n# keep me\na: 1\n\n# documented default\nb: true\nsite_only: 'x'\n"
        );
    }

    #[test]
    fn extra_deny_keys_are_honoured() {
        let current = parse("SITE_TOKEN: old\n");
        let mut new = parse("SITE_TOKEN: new\n");

        merge_vars(&current, &mut new, &DenyList::with_extra(["SITE_TOKEN"]));

        assert_eq!(new.get("SITE_TOKEN"), Some(&Value::from("new")));
    }
}
