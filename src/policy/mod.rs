//! Keys that are never carried from the current artifacts into the new ones.
//!
//! Version identifiers, license file names and per-install identifiers belong
//! to the generated release and always keep the new value.

use std::collections::BTreeSet;

pub const DEFAULT_DENY_KEYS: &[&str] = &[
    "MAXIMUM_RECOMMENDED_ANSIBLE_VERSION",
    "sas_install_type",
    "LICENSE_FILENAME",
    "LICENSE_COMPOSITE_FILENAME",
    "remote_tmp",
    "DEPLOYMENT_ID",
    "tenant_instance",
    "provider_endpoint_scheme",
    "INSTALL_USER",
    "INSTALL_GROUP",
    "provider_endpoint_port",
    "sas_consul_on_cas_hosts",
    "casenv_tenant",
    "REPOSITORY_WAREHOUSE",
    "setup_sas_users",
    "sas_users",
];

/// Exact-match deny-list shared by all three mergers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyList {
    keys: BTreeSet<String>,
}

impl Default for DenyList {
    fn default() -> Self {
        Self { keys: DEFAULT_DENY_KEYS.iter().map(|k| k.to_string()).collect() }
    }
}

impl DenyList {
    /// Default keys plus `extra`. The list can only grow.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for key in extra {
            let key = key.as_ref().trim();
            if !key.is_empty() {
                list.keys.insert(key.to_string());
            }
        }
        list
    }

    pub fn is_denied(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
