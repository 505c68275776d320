//! deploy-merge: carry site customizations into a newly generated deployment
//!
//! Merges the current `ansible.cfg`, `inventory.ini` and `vars.yml` of a
//! deployed environment into the files generated for an upgrade.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
