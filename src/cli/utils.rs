//! Shared CLI utilities.

use anyhow::{bail, Result};

/// Tenant ids from a comma-separated `--tenants` value.
///
/// Ids are trimmed, empty ones are dropped and repeats keep their first
/// position. Each id names a `<id>_vars.yml` file, so path separators are
/// rejected.
pub fn parse_tenant_ids(value: Option<&str>) -> Result<Option<Vec<String>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let mut ids: Vec<String> = Vec::new();
    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if id.contains(['/', '\\']) || id == ".." {
            bail!("Invalid tenant id '{id}': it must be a plain file name prefix");
        }
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    Ok(Some(ids))
}
