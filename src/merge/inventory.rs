//! Host-inventory merge (`inventory.ini`).
//!
//! Group membership is a set, not a key/value association, so groups are
//! replaced wholesale rather than merged entry by entry.

use crate::document::inventory::{
    host_identifier, is_comment_entry, GroupKind, CHOOSE_TARGET_HOST, COMMAND_LINE,
};
use crate::document::{Section, SectionedDocument};
use crate::domain::{ActionLog, ActionTag};
use crate::policy::DenyList;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryMerge {
    pub log: ActionLog,
    /// Hosts written into the command-line group.
    pub command_line_hosts: Vec<String>,
}

/// Ordered, de-duplicated host list for the command-line group.
///
/// Hosts already in `current`'s command-line group come first, followed by the
/// hosts of every other group in document order. Children and `:vars` groups
/// do not list hosts and are not scanned.
pub fn command_line_hosts(current: &SectionedDocument) -> Vec<String> {
    let mut hosts = Vec::new();
    if let Some(group) = current.section(COMMAND_LINE) {
        collect_hosts(group, &mut hosts);
    }
    for group in current.sections() {
        match GroupKind::of(group.name()) {
            GroupKind::Children | GroupKind::Vars | GroupKind::CommandLine => continue,
            GroupKind::HostDefinitions | GroupKind::Generic => collect_hosts(group, &mut hosts),
        }
    }
    hosts
}

fn collect_hosts(group: &Section, hosts: &mut Vec<String>) {
    for entry in group.entries() {
        if is_comment_entry(entry) {
            continue;
        }
        let id = host_identifier(entry);
        if !id.is_empty() && !hosts.contains(&id) {
            hosts.push(id);
        }
    }
}

/// Reconcile `current`'s host groups into `new`'s group layout.
///
/// `default_host` fills groups that only exist in `new`; without it they get
/// the `? choose-target-host` placeholder.
pub fn merge_inventory(
    current: &SectionedDocument,
    new: &mut SectionedDocument,
    default_host: Option<&str>,
    deny: &DenyList,
) -> InventoryMerge {
    let mut log = ActionLog::new();
    let derived = command_line_hosts(current);
    let new_groups = new.section_names();
    let default_host = default_host.map(str::trim).filter(|h| !h.is_empty());

    for group in current.sections() {
        let name = group.name();
        match GroupKind::of(name) {
            GroupKind::Children => continue,
            GroupKind::CommandLine => {
                replace_with_hosts(new.add_section(name), &derived);
                tracing::info!(
                    "The host group [{name}] now lists {} host(s) from the current inventory.",
                    derived.len()
                );
                log.record(name, ActionTag::Replace);
                continue;
            }
            GroupKind::Vars | GroupKind::HostDefinitions | GroupKind::Generic => {}
        }

        let Some(target) = new.section_mut(name) else {
            tracing::info!("The entire host group [{name}] does not exist in the newer inventory.");
            log.record(name, ActionTag::Removed);
            continue;
        };

        target.clear();
        for entry in group.entries() {
            if deny.is_denied(&entry.key) {
                tracing::info!("The option {} will not be carried to the newer inventory.", entry.key);
                continue;
            }
            target.set(&entry.key, entry.value.clone());
        }
        tracing::info!("The individual host group in the existing section [{name}] has been replaced.");
        log.record(name, ActionTag::Replace);
    }

    for name in &new_groups {
        if current.has_section(name) {
            continue;
        }
        let Some(target) = new.section_mut(name) else {
            continue;
        };
        match GroupKind::of(name) {
            GroupKind::Children => continue,
            GroupKind::HostDefinitions => {
                log.record(name.as_str(), ActionTag::New);
                continue;
            }
            GroupKind::CommandLine if !derived.is_empty() => {
                replace_with_hosts(target, &derived);
                log.record(name.as_str(), ActionTag::Replace);
                continue;
            }
            _ => {}
        }

        target.clear();
        match default_host {
            Some(host) => {
                target.set(host, None);
                tracing::info!("The new host group [{name}] has been found and the host '{host}' was added.");
            }
            None => {
                target.set(CHOOSE_TARGET_HOST, None);
                tracing::warn!(
                    "The new host group [{name}] has been found and the temporary value '{CHOOSE_TARGET_HOST}' was added. The temporary value must be replaced."
                );
            }
        }
        log.record(name.as_str(), ActionTag::New);
    }

    InventoryMerge { log, command_line_hosts: derived }
}

fn replace_with_hosts(target: &mut Section, hosts: &[String]) {
    target.clear();
    for host in hosts {
        target.set(host, None);
    }
}
