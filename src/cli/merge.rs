//! Merge command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::utils::parse_tenant_ids;
use deploy_merge::config::{load_settings, merge_cli_with_settings, CliOverrides};
use deploy_merge::render::write_report;
use deploy_merge::{pipeline, AnchorPolicy};

#[derive(Args)]
pub struct MergeArgs {
    /// Inventory file of the deployment being upgraded
    #[arg(long, value_name = "FILE")]
    pub current_inventory: PathBuf,

    /// Directory holding the current ansible.cfg, vars.yml and <tenant>_vars.yml files
    #[arg(long, value_name = "DIR")]
    pub current_dir: PathBuf,

    /// Directory holding the newly generated files; they are overwritten in place
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Host written into inventory groups that only exist in the new inventory
    #[arg(long, value_name = "HOST")]
    pub default_host: Option<String>,

    /// Tenant ids whose <tenant>_vars.yml files are merged too (comma-separated)
    #[arg(long, value_name = "IDS")]
    pub tenants: Option<String>,

    /// Add the Postgres HA keys next to every PCP_PORT in vars.yml
    #[arg(long)]
    pub add_ha_properties: bool,

    /// Add PERMS_OVERRIDE next to every PGPOOL_PORT in vars.yml
    #[arg(long)]
    pub add_perms_override: bool,

    /// Add HA_PGPOOL_HEARTBEAT_PORT next to every POOL_NUMBER in vars.yml
    #[arg(long)]
    pub add_pgpool_heartbeat: bool,

    /// How to report comments or patches whose anchor line is missing: silent, warn
    #[arg(long, value_name = "POLICY")]
    pub anchor_policy: Option<AnchorPolicy>,

    /// Settings file (TOML or YAML); defaults to deploy-merge.{toml,yml,yaml} in the output dir
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON report of every merge decision to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Omit the generation timestamp from the report
    #[arg(long)]
    pub no_timestamp: bool,
}

pub fn run(args: MergeArgs) -> Result<()> {
    if !args.output_dir.is_dir() {
        anyhow::bail!("Output directory does not exist: {}", args.output_dir.display());
    }

    let tenants = parse_tenant_ids(args.tenants.as_deref())?;
    let settings = load_settings(&args.output_dir, args.config.as_deref())?;
    let request = merge_cli_with_settings(
        settings,
        CliOverrides {
            current_inventory: args.current_inventory,
            current_dir: args.current_dir,
            output_dir: args.output_dir,
            default_host: args.default_host,
            tenants,
            anchor_policy: args.anchor_policy,
            add_ha_properties: args.add_ha_properties,
            add_perms_override: args.add_perms_override,
            add_pgpool_heartbeat: args.add_pgpool_heartbeat,
        },
    );

    let outcome = pipeline::run(&request);

    if let Some(report_path) = &args.report {
        write_report(report_path, &request, &outcome, !args.no_timestamp)?;
        tracing::info!("Report written to {}", report_path.display());
    }

    if outcome.failed {
        anyhow::bail!("{}", outcome.messages.join("\n"));
    }

    for message in &outcome.messages {
        println!("{message}");
    }
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}
