//! Settings-file merge (`ansible.cfg`).

use crate::document::SectionedDocument;
use crate::domain::{ActionLog, ActionTag};
use crate::policy::DenyList;

/// Copy every non-denied key of `current` into `new`.
///
/// Sections in both are tagged `MERGE`, sections only in `current` are appended
/// and tagged `MOVE`, sections only in `new` are tagged `NEW` and left alone.
/// Each copied key is tagged like its section.
pub fn merge_config(
    current: &SectionedDocument,
    new: &mut SectionedDocument,
    deny: &DenyList,
) -> ActionLog {
    let mut log = ActionLog::new();
    let new_sections = new.section_names();

    for section in current.sections() {
        let name = section.name();
        let tag = if new.has_section(name) {
            tracing::info!("The individual options of section [{name}] are merging into the existing section.");
            ActionTag::Merge
        } else {
            tracing::info!("The entire section [{name}] is moving to the newer file unchanged.");
            ActionTag::Move
        };
        log.record(name, tag);

        let target = new.add_section(name);
        for entry in section.entries() {
            if deny.is_denied(&entry.key) {
                tracing::info!("The option {} will not be carried to the newer file.", entry.key);
                continue;
            }
            if tag == ActionTag::Merge && target.contains_key(&entry.key) {
                tracing::debug!("The current value of the option {} was merged into the file.", entry.key);
            } else {
                tracing::debug!("The option {} was added to the newer file.", entry.key);
            }
            target.set(&entry.key, entry.value.clone());
            log.record_key(name, &entry.key, tag);
        }
    }

    for name in new_sections {
        if current.section(&name).is_none() {
            tracing::info!("The section [{name}] is a new section so no change will be made.");
            log.record(name, ActionTag::New);
        }
    }

    log
}
