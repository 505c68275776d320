//! Output rendering (JSON report)

pub mod report;

pub use report::write_report;
