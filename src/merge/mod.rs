//! The three mergers. Each mutates the new document in place and returns the
//! action log for its artifact.

pub mod config;
pub mod inventory;
pub mod vars;

pub use config::merge_config;
pub use inventory::{command_line_hosts, merge_inventory, InventoryMerge};
pub use vars::merge_vars;
