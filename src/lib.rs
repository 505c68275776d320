//! deploy-merge: carry site customizations into a newly generated deployment
//!
//! Reconciles a deployed `ansible.cfg`, `inventory.ini` and `vars.yml` into the
//! artifacts generated for an upgraded release, keeping the new layout and
//! recording every decision in an action log.

pub mod config;
pub mod document;
pub mod domain;
pub mod merge;
pub mod patch;
pub mod pipeline;
pub mod policy;
pub mod postprocess;
pub mod render;

pub use domain::{ActionLog, ActionTag, AnchorPolicy, MergeError, MergeOutcome};
pub use pipeline::{run, MergeRequest};
