//! Settings file loading and merging
//!
//! Settings come from an optional TOML or YAML file and the command line, with
//! precedence CLI > File > Defaults.

pub mod loader;
pub mod merge;

use serde::{Deserialize, Deserializer};

use crate::domain::AnchorPolicy;

pub use loader::load_settings;
pub use merge::{merge_cli_with_settings, CliOverrides};

/// Contents of a `deploy-merge` settings file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    #[serde(deserialize_with = "string_or_list")]
    pub extra_deny_keys: Vec<String>,
    pub default_host: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub tenants: Vec<String>,
    pub anchor_policy: Option<AnchorPolicy>,
    pub add_ha_properties: bool,
    pub add_perms_override: bool,
    pub add_pgpool_heartbeat: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Accept either `"a, b"` or `["a", "b"]`; entries are trimmed, empty ones dropped.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::Many(items) => items,
    };
    Ok(raw.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}
