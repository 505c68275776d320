//! Orchestrated merge of one deployment directory.
//!
//! Reads the current and new artifacts, runs the three mergers, writes the new
//! artifacts in place, then applies the structural patches, the per-tenant
//! merges and the inventory repair pass.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::inventory::parse_inventory;
use crate::document::{SectionedDocument, VarsDocument};
use crate::domain::{AnchorPolicy, MergeError, MergeOutcome, TenantOutcome};
use crate::merge::{merge_config, merge_inventory, merge_vars};
use crate::patch::{apply_patches, PatchSet};
use crate::policy::DenyList;
use crate::postprocess::repair;

pub const INVENTORY_FILE: &str = "inventory.ini";
pub const INVENTORY_BACKUP_FILE: &str = "inventory.ini.default";
pub const VARS_FILE: &str = "vars.yml";
pub const CONFIG_FILE: &str = "ansible.cfg";

/// Everything one merge run needs.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    /// Inventory of the deployment being upgraded.
    pub current_inventory: PathBuf,
    /// Directory holding the current `ansible.cfg`, `vars.yml` and tenant files.
    pub current_dir: PathBuf,
    /// Directory holding the newly generated artifacts; they are overwritten.
    pub output_dir: PathBuf,
    pub default_host: Option<String>,
    pub tenants: Vec<String>,
    pub patches: PatchSet,
    pub anchor_policy: AnchorPolicy,
    pub deny: DenyList,
}

impl MergeRequest {
    pub fn new(
        current_inventory: impl Into<PathBuf>,
        current_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            current_inventory: current_inventory.into(),
            current_dir: current_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    fn tenant_ids(&self) -> impl Iterator<Item = &str> {
        self.tenants.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
    }
}

/// Run the merge. Failures are reported in the returned outcome.
pub fn run(request: &MergeRequest) -> MergeOutcome {
    match try_run(request) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!("{err}");
            MergeOutcome::failure(&err)
        }
    }
}

pub fn try_run(request: &MergeRequest) -> Result<MergeOutcome, MergeError> {
    tracing::info!("Process that merges deployment files started.");
    let mut outcome = MergeOutcome::default();

    let current_cfg_path = request.current_dir.join(CONFIG_FILE);
    let current_vars_path = request.current_dir.join(VARS_FILE);
    let new_inventory_path = request.output_dir.join(INVENTORY_FILE);
    let new_vars_path = request.output_dir.join(VARS_FILE);
    let new_cfg_path = request.output_dir.join(CONFIG_FILE);
    let tenant_paths: Vec<(&str, PathBuf, PathBuf)> = request
        .tenant_ids()
        .map(|tenant| {
            let file_name = format!("{tenant}_vars.yml");
            (tenant, request.current_dir.join(&file_name), request.output_dir.join(&file_name))
        })
        .collect();

    require_file("current_inventory_file", &request.current_inventory)?;
    require_file("current_vars_yml", &current_vars_path)?;
    require_file("current_ansible_cfg", &current_cfg_path)?;
    require_file("new_inventory_file", &new_inventory_path)?;
    require_file("new_vars_yml", &new_vars_path)?;
    require_file("new_ansible_cfg", &new_cfg_path)?;
    for (_, current_path, new_path) in &tenant_paths {
        require_file("current_tenant_vars_yml", current_path)?;
        require_file("new_tenant_vars_yml", new_path)?;
    }

    let current_cfg = read_config(&current_cfg_path)?;
    let current_inventory = read_inventory(&request.current_inventory, false)?;
    let current_vars = read_vars(&current_vars_path)?;

    let baseline = read_text(&new_inventory_path)?;
    let mut new_cfg = read_config(&new_cfg_path)?;
    let mut new_inventory = parse_inventory(&baseline, true)
        .map_err(|e| MergeError::parse(&new_inventory_path, e))?;
    let mut new_vars = read_vars(&new_vars_path)?;

    let mut tenants = Vec::with_capacity(tenant_paths.len());
    for (tenant, current_path, new_path) in &tenant_paths {
        tenants.push((*tenant, new_path, read_vars(current_path)?, read_vars(new_path)?));
    }

    let backup_path = request.output_dir.join(INVENTORY_BACKUP_FILE);
    write_text(&backup_path, &baseline)?;
    tracing::debug!("The newer inventory was backed up to {}", backup_path.display());

    if let Some(host) = request.default_host.as_deref() {
        tracing::info!("The merge_default_host is: {host}");
    }

    outcome.config = merge_config(&current_cfg, &mut new_cfg, &request.deny);
    let inventory = merge_inventory(
        &current_inventory,
        &mut new_inventory,
        request.default_host.as_deref(),
        &request.deny,
    );
    outcome.inventory = inventory.log;
    outcome.command_line_hosts = inventory.command_line_hosts;
    outcome.vars = merge_vars(&current_vars, &mut new_vars, &request.deny);

    write_text(&new_cfg_path, &new_cfg.to_ini_string())?;
    write_text(&new_inventory_path, &new_inventory.to_ini_string())?;
    write_vars(&new_vars_path, &new_vars)?;

    if !request.patches.is_empty() {
        let written = read_text(&new_vars_path)?;
        let (patched, reports) = apply_patches(&written, &request.patches);
        for report in reports.iter().filter(|r| r.anchor_missing()) {
            let miss = MergeError::AnchorNotFound {
                stage: report.name,
                anchor: report.anchor_key.to_string(),
            };
            record_anchor_miss(&mut outcome, request.anchor_policy, &miss);
        }
        write_text(&new_vars_path, &patched)?;
    }

    for (tenant, new_path, current, mut new) in tenants {
        tracing::info!("The tenant ID is: {tenant}");
        let log = merge_vars(&current, &mut new, &request.deny);
        write_vars(new_path, &new)?;
        outcome.tenants.push(TenantOutcome { tenant: tenant.to_string(), vars: log });
    }

    let serialized = read_text(&new_inventory_path)?;
    let repaired = repair(&serialized, &baseline);
    for (rule, count) in &repaired.counts {
        tracing::debug!("Inventory repair {rule} changed {count} line(s).");
    }
    for anchor in &repaired.missed_anchors {
        let miss = MergeError::AnchorNotFound { stage: "comments", anchor: anchor.clone() };
        record_anchor_miss(&mut outcome, request.anchor_policy, &miss);
    }
    write_text(&new_inventory_path, &repaired.text)?;

    outcome.messages = vec![
        "Merge was done successfully:".to_string(),
        format!("merge_cfg={}", outcome.config),
        format!("merge_inventory={}", outcome.inventory),
        format!("merge_vars={}", outcome.vars),
    ];
    for tenant in &outcome.tenants {
        outcome.messages.push(format!("merge_{}_vars={}", tenant.tenant, tenant.vars));
    }
    outcome.backup = Some(backup_path);

    tracing::info!(
        "Merge finished: {} -> {}",
        request.current_dir.display(),
        request.output_dir.display()
    );
    Ok(outcome)
}

fn record_anchor_miss(outcome: &mut MergeOutcome, policy: AnchorPolicy, miss: &MergeError) {
    match policy {
        AnchorPolicy::Silent => tracing::debug!("{miss}"),
        AnchorPolicy::Warn => tracing::warn!("{miss}"),
    }
    outcome.warnings.push(miss.to_string());
}

fn require_file(role: &'static str, path: &Path) -> Result<(), MergeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MergeError::MissingInputFile { role, path: path.to_path_buf() })
    }
}

fn read_text(path: &Path) -> Result<String, MergeError> {
    fs::read_to_string(path).map_err(|source| MergeError::Read { path: path.to_path_buf(), source })
}

fn write_text(path: &Path, text: &str) -> Result<(), MergeError> {
    let write_err = |source| MergeError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, text).map_err(write_err)
}

fn read_config(path: &Path) -> Result<SectionedDocument, MergeError> {
    let text = read_text(path)?;
    SectionedDocument::parse(&text, true).map_err(|e| MergeError::parse(path, e))
}

fn read_inventory(path: &Path, keep_comments: bool) -> Result<SectionedDocument, MergeError> {
    let text = read_text(path)?;
    parse_inventory(&text, keep_comments).map_err(|e| MergeError::parse(path, e))
}

fn read_vars(path: &Path) -> Result<VarsDocument, MergeError> {
    let text = read_text(path)?;
    VarsDocument::parse(&text).map_err(|e| MergeError::parse(path, e))
}

fn write_vars(path: &Path, vars: &VarsDocument) -> Result<(), MergeError> {
    let text = vars.to_yaml_string().map_err(|e| MergeError::render(path, e))?;
    write_text(path, &text)?;
    tracing::info!("The {} file has been merged successfully.", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run, MergeRequest};
    use crate::domain::{ActionTag, AnchorPolicy};
    use crate::patch::PatchSet;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CURRENT_INVENTORY: &str = "\
deployTarget ansible_host=10.0.0.5 ansible_user=sas
ucs[01:32] ansible_host=10.0.1.1

[workers]
deployTarget
ucs[01:32]

[legacy]
deployTarget

[sas_all:children]
workers
legacy
";

    const NEW_INVENTORY: &str = "\
deployTarget ansible_host=127.0.0.1

# Workers run the batch jobs
[workers]
deployTarget

[cache]
deployTarget

[sas_all:children]
workers
cache
";

    const NEW_VARS: &str = "\
---
DEPLOYMENT_ID: generated
VERIFY_DEPLOYMENT: true
INVOCATION_VARIABLES:
  pgpoolc:
  - PCP_PORT: '5440'
    PGPOOL_PORT: '5441'
";

    struct Fixture {
        _tmp: TempDir,
        current: std::path::PathBuf,
        output: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().expect("tmp");
            let current = tmp.path().join("current");
            let output = tmp.path().join("new");
            fs::create_dir_all(&current).expect("mkdir current");
            fs::create_dir_all(&output).expect("mkdir new");

            write(&current, "inventory.ini", CURRENT_INVENTORY);
            write(&current, "ansible.cfg", "[defaults]\nforks = 20\nremote_tmp = /tmp/custom\n");
            write(
                &current,
                "vars.yml",
                "VERIFY_DEPLOYMENT: false\nDEPLOYMENT_ID: site\nsas_custom_timeout: 30\n",
            );

            write(&output, "inventory.ini", NEW_INVENTORY);
            write(&output, "ansible.cfg", "[defaults]\nforks = 5\n\n[ssh_connection]\npipelining = True\n");
            write(&output, "vars.yml", NEW_VARS);

            Self { _tmp: tmp, current, output }
        }

        fn request(&self) -> MergeRequest {
            MergeRequest::new(self.current.join("inventory.ini"), &self.current, &self.output)
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.output.join(name)).expect("read output")
        }
    }

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).expect("write fixture");
    }

    #[test]
    fn merges_all_three_artifacts() {
        let fixture = Fixture::new();
        let outcome = run(&fixture.request());

        assert!(!outcome.failed, "{:?}", outcome.messages);
        assert_eq!(outcome.messages[0], "Merge was done successfully:");

        assert_eq!(outcome.config.get("defaults"), Some(ActionTag::Merge));
        assert_eq!(outcome.config.get_key("defaults", "forks"), Some(ActionTag::Merge));
        assert!(outcome.config.get_key("defaults", "remote_tmp").is_none());
        assert_eq!(outcome.config.get("ssh_connection"), Some(ActionTag::New));
        let cfg = fixture.read("ansible.cfg");
        assert!(cfg.contains("forks = 20"));
        assert!(!cfg.contains("/tmp/custom"));
        assert!(cfg.contains("[ssh_connection]\npipelining = True"));

        assert_eq!(outcome.inventory.get("workers"), Some(ActionTag::Replace));
        assert_eq!(outcome.inventory.get("legacy"), Some(ActionTag::Removed));
        assert_eq!(outcome.inventory.get("cache"), Some(ActionTag::New));
        assert_eq!(outcome.command_line_hosts, vec!["deployTarget", "ucs[01:32]"]);

        assert_eq!(outcome.vars.get("VERIFY_DEPLOYMENT"), Some(ActionTag::Merge));
        assert_eq!(outcome.vars.get("sas_custom_timeout"), Some(ActionTag::Move));
        assert_eq!(outcome.vars.get("INVOCATION_VARIABLES"), Some(ActionTag::New));
        assert!(outcome.vars.get("DEPLOYMENT_ID").is_none());

        let vars: serde_yaml::Value =
            serde_yaml::from_str(&fixture.read("vars.yml")).expect("vars yaml");
        assert_eq!(vars["DEPLOYMENT_ID"], serde_yaml::Value::from("generated"));
        assert_eq!(vars["VERIFY_DEPLOYMENT"], serde_yaml::Value::from(false));
        assert_eq!(vars["sas_custom_timeout"], serde_yaml::Value::from(30));
    }

    #[test]
    fn inventory_is_repaired_and_backed_up() {
        let fixture = Fixture::new();
        let outcome = run(&fixture.request());
        assert!(!outcome.failed, "{:?}", outcome.messages);

        assert_eq!(fixture.read("inventory.ini.default"), NEW_INVENTORY);
        assert_eq!(outcome.backup, Some(fixture.output.join("inventory.ini.default")));

        let inventory = fixture.read("inventory.ini");
        assert!(inventory.starts_with("deployTarget ansible_host=10.0.0.5 ansible_user=sas\n"));
        assert!(inventory.contains("ucs[01:32] ansible_host=10.0.1.1"));
        assert!(inventory.contains("# Workers run the batch jobs\n[workers]\ndeployTarget\nucs[01:32]\n"));
        assert!(inventory.contains("[cache]\n? choose-target-host\n"));
        assert!(!inventory.contains("[legacy]"));
        assert!(!inventory.contains("[host-definitions]"));
        assert!(!inventory.contains("99999;"));
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    }

    #[test]
    fn default_host_fills_new_groups() {
        let fixture = Fixture::new();
        let mut request = fixture.request();
        request.default_host = Some("deployTarget".to_string());

        let outcome = run(&request);
        assert!(!outcome.failed);
        assert!(fixture.read("inventory.ini").contains("[cache]\ndeployTarget\n"));
    }

    #[test]
    fn missing_current_vars_fails_without_writing() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.current.join("vars.yml")).expect("remove");

        let outcome = run(&fixture.request());

        assert!(outcome.failed);
        assert!(outcome.messages[0].starts_with("current_vars_yml is not a valid file: "));
        assert_eq!(outcome.failed_path, Some(fixture.current.join("vars.yml")));
        assert_eq!(fixture.read("inventory.ini"), NEW_INVENTORY);
        assert!(!fixture.output.join("inventory.ini.default").exists());
    }

    #[test]
    fn unparseable_config_fails() {
        let fixture = Fixture::new();
        write(&fixture.current, "ansible.cfg", "forks = 20\n");

        let outcome = run(&fixture.request());

        assert!(outcome.failed);
        assert!(outcome.messages[0].starts_with("Failed parsing "));
        assert_eq!(outcome.failed_path, Some(fixture.current.join("ansible.cfg")));
    }

    #[test]
    fn patches_extend_invocation_variables() {
        let fixture = Fixture::new();
        let mut request = fixture.request();
        request.patches =
            PatchSet { ha_properties: true, perms_override: true, pgpool_heartbeat: true };

        let outcome = run(&request);
        assert!(!outcome.failed, "{:?}", outcome.messages);

        let vars: serde_yaml::Value =
            serde_yaml::from_str(&fixture.read("vars.yml")).expect("vars yaml");
        let item = &vars["INVOCATION_VARIABLES"]["pgpoolc"][0];
        assert_eq!(item["POOL_NUMBER"], serde_yaml::Value::from("0"));
        assert_eq!(item["PERMS_OVERRIDE"], serde_yaml::Value::from("false"));
        assert_eq!(item["HA_PGPOOL_HEARTBEAT_PORT"], serde_yaml::Value::from(""));
        assert_eq!(item["PCP_PORT"], serde_yaml::Value::from("5440"));
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    }

    #[test]
    fn missing_patch_anchor_becomes_warning() {
        let fixture = Fixture::new();
        write(&fixture.output, "vars.yml", "VERIFY_DEPLOYMENT: true\n");
        let mut request = fixture.request();
        request.patches = PatchSet { perms_override: true, ..PatchSet::default() };
        request.anchor_policy = AnchorPolicy::Silent;

        let outcome = run(&request);

        assert!(!outcome.failed);
        assert_eq!(outcome.warnings, vec!["perms_override: anchor line not found: PGPOOL_PORT"]);
    }

    #[test]
    fn comment_on_replaced_host_line_is_reported() {
        let fixture = Fixture::new();
        write(
            &fixture.output,
            "inventory.ini",
            "# Generated hosts\ndeployTarget ansible_host=127.0.0.1\n\n[workers]\ndeployTarget\n",
        );

        let outcome = run(&fixture.request());

        assert!(!outcome.failed);
        assert_eq!(
            outcome.warnings,
            vec!["comments: anchor line not found: deployTarget ansible_host=127.0.0.1"]
        );
        assert!(!fixture.read("inventory.ini").contains("# Generated hosts"));
    }

    #[test]
    fn tenant_vars_are_merged_independently() {
        let fixture = Fixture::new();
        write(&fixture.current, "acme_vars.yml", "TENANT_PORT: 8080\nsas_users: [a]\n");
        write(&fixture.output, "acme_vars.yml", "TENANT_PORT: 80\nTENANT_NEW: x\n");
        write(&fixture.current, "globex_vars.yml", "TENANT_PORT: 9090\n");
        write(&fixture.output, "globex_vars.yml", "TENANT_PORT: 90\n");
        let mut request = fixture.request();
        request.tenants = vec!["acme".to_string(), " globex ".to_string(), String::new()];

        let outcome = run(&request);

        assert!(!outcome.failed, "{:?}", outcome.messages);
        assert_eq!(outcome.tenants.len(), 2);
        assert_eq!(outcome.tenants[0].tenant, "acme");
        assert_eq!(outcome.tenants[0].vars.get("TENANT_PORT"), Some(ActionTag::Merge));
        assert_eq!(outcome.tenants[0].vars.get("TENANT_NEW"), Some(ActionTag::New));
        assert!(outcome.tenants[0].vars.get("sas_users").is_none());

        let globex: serde_yaml::Value =
            serde_yaml::from_str(&fixture.read("globex_vars.yml")).expect("yaml");
        assert_eq!(globex["TENANT_PORT"], serde_yaml::Value::from(9090));
        assert!(outcome.messages.iter().any(|m| m.starts_with("merge_globex_vars=")));
    }

    #[test]
    fn missing_tenant_file_fails() {
        let fixture = Fixture::new();
        let mut request = fixture.request();
        request.tenants = vec!["acme".to_string()];

        let outcome = run(&request);

        assert!(outcome.failed);
        assert!(outcome.messages[0].starts_with("current_tenant_vars_yml is not a valid file"));
        assert_eq!(fixture.read("inventory.ini"), NEW_INVENTORY);
        assert_eq!(fixture.read("vars.yml"), NEW_VARS);
        assert_eq!(fixture.read("ansible.cfg"), "[defaults]\nforks = 5\n\n[ssh_connection]\npipelining = True\n");
        assert!(!fixture.output.join("inventory.ini.default").exists());
    }

    #[test]
    fn missing_new_tenant_file_fails_before_any_write() {
        let fixture = Fixture::new();
        write(&fixture.current, "acme_vars.yml", "TENANT_PORT: 8080\n");
        let mut request = fixture.request();
        request.tenants = vec!["acme".to_string()];

        let outcome = run(&request);

        assert!(outcome.failed);
        assert!(outcome.messages[0].starts_with("new_tenant_vars_yml is not a valid file"));
        assert_eq!(outcome.failed_path, Some(fixture.output.join("acme_vars.yml")));
        assert_eq!(fixture.read("inventory.ini"), NEW_INVENTORY);
        assert!(!fixture.output.join("inventory.ini.default").exists());
    }

    #[test]
    fn unparseable_tenant_file_fails_before_any_write() {
        let fixture = Fixture::new();
        write(&fixture.current, "acme_vars.yml", "TENANT_PORT: 8080\n");
        write(&fixture.output, "acme_vars.yml", "- not\n- a mapping\n");
        let mut request = fixture.request();
        request.tenants = vec!["acme".to_string()];

        let outcome = run(&request);

        assert!(outcome.failed);
        assert_eq!(outcome.failed_path, Some(fixture.output.join("acme_vars.yml")));
        assert_eq!(fixture.read("vars.yml"), NEW_VARS);
        assert!(!fixture.output.join("inventory.ini.default").exists());
    }

    #[test]
    fn unwritable_output_is_reported_as_write_failure() {
        let fixture = Fixture::new();
        fs::create_dir(fixture.output.join("inventory.ini.default")).expect("mkdir backup");

        let outcome = run(&fixture.request());

        assert!(outcome.failed);
        assert!(outcome.messages[0].starts_with("Failed writing "), "{:?}", outcome.messages);
        assert_eq!(outcome.failed_path, Some(fixture.output.join("inventory.ini.default")));
        assert_eq!(fixture.read("inventory.ini"), NEW_INVENTORY);
        assert_eq!(fixture.read("vars.yml"), NEW_VARS);
    }
}
