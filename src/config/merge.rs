//! Combine command-line options with a loaded settings file.

use std::path::PathBuf;

use super::Settings;
use crate::domain::AnchorPolicy;
use crate::patch::PatchSet;
use crate::pipeline::MergeRequest;
use crate::policy::DenyList;

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub current_inventory: PathBuf,
    pub current_dir: PathBuf,
    pub output_dir: PathBuf,
    pub default_host: Option<String>,
    pub tenants: Option<Vec<String>>,
    pub anchor_policy: Option<AnchorPolicy>,
    pub add_ha_properties: bool,
    pub add_perms_override: bool,
    pub add_pgpool_heartbeat: bool,
}

/// Build the merge request. Command-line values win over the settings file;
/// a patch runs when either side enables it.
pub fn merge_cli_with_settings(settings: Settings, cli: CliOverrides) -> MergeRequest {
    let default_host = cli
        .default_host
        .or(settings.default_host)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    MergeRequest {
        current_inventory: cli.current_inventory,
        current_dir: cli.current_dir,
        output_dir: cli.output_dir,
        default_host,
        tenants: cli.tenants.unwrap_or(settings.tenants),
        patches: PatchSet {
            ha_properties: cli.add_ha_properties || settings.add_ha_properties,
            perms_override: cli.add_perms_override || settings.add_perms_override,
            pgpool_heartbeat: cli.add_pgpool_heartbeat || settings.add_pgpool_heartbeat,
        },
        anchor_policy: cli.anchor_policy.or(settings.anchor_policy).unwrap_or_default(),
        deny: DenyList::with_extra(&settings.extra_deny_keys),
    }
}
