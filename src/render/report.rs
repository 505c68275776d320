//! Report JSON generation.

use crate::domain::{MergeOutcome, REPORT_SCHEMA_VERSION};
use crate::pipeline::MergeRequest;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::Path;

/// Build the report document for one run.
pub fn report_value(
    request: &MergeRequest,
    outcome: &MergeOutcome,
    include_timestamp: bool,
) -> Result<Value> {
    let mut tenants = Map::new();
    for tenant in &outcome.tenants {
        tenants.insert(tenant.tenant.clone(), serde_json::to_value(&tenant.vars)?);
    }

    let mut report = Map::new();
    report.insert("schema_version".to_string(), Value::String(REPORT_SCHEMA_VERSION.to_string()));
    if include_timestamp {
        report.insert(
            "generated_at".to_string(),
            Value::String(Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()),
        );
    }
    report.insert(
        "merge".to_string(),
        Value::String(format!(
            "{} -> {}",
            request.current_dir.display(),
            request.output_dir.display()
        )),
    );
    report.insert("failed".to_string(), Value::Bool(outcome.failed));
    report.insert("messages".to_string(), serde_json::to_value(&outcome.messages)?);
    if let Some(path) = &outcome.failed_path {
        report.insert("failed_path".to_string(), Value::String(path.display().to_string()));
    }
    report.insert("warnings".to_string(), serde_json::to_value(&outcome.warnings)?);
    report.insert("config".to_string(), serde_json::to_value(&outcome.config)?);
    report.insert("inventory".to_string(), serde_json::to_value(&outcome.inventory)?);
    report.insert("vars".to_string(), serde_json::to_value(&outcome.vars)?);
    if !tenants.is_empty() {
        report.insert("tenants".to_string(), Value::Object(tenants));
    }
    report.insert(
        "command_line_hosts".to_string(),
        serde_json::to_value(&outcome.command_line_hosts)?,
    );
    report.insert("patches".to_string(), serde_json::to_value(request.patches)?);
    if let Some(backup) = &outcome.backup {
        report.insert("backup".to_string(), Value::String(backup.display().to_string()));
    }

    Ok(Value::Object(report))
}

pub fn write_report(
    report_path: &Path,
    request: &MergeRequest,
    outcome: &MergeOutcome,
    include_timestamp: bool,
) -> Result<()> {
    let report = report_value(request, outcome, include_timestamp)?;

    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed writing report: {}", report_path.display()))?;
    Ok(())
}
