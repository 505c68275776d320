//! In-memory forms of the three artifacts and their readers/writers.

pub mod ini;
pub mod inventory;
pub mod vars;

pub use ini::{Entry, IniError, Section, SectionedDocument};
pub use inventory::{host_identifier, parse_inventory, GroupKind};
pub use vars::{key_label, VarsDocument, VarsError};
