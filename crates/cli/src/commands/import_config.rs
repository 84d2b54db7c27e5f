//! Credentials file import from rc files

use anyhow::{Context, Result};
use kos_lib::config::import_rc_dir;
use kos_lib::AppConfig;
use std::path::Path;

use crate::output::{print_info, print_success, print_warning};

/// Import every rc file in `from_dir` into `target`, returning the cloud names
pub fn import(from_dir: &Path, target: &Path) -> Result<Vec<String>> {
    let clouds = import_rc_dir(from_dir)
        .with_context(|| format!("Failed to import rc files from {}", from_dir.display()))?;
    clouds
        .write(target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(clouds.clouds.keys().cloned().collect())
}

pub fn run(from_dir: &str) -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    let target = config
        .openstack_config_file
        .context("OPENSTACK_CONFIG_FILE must be set to import a config")?;

    let names = import(Path::new(from_dir), &target)?;
    if names.is_empty() {
        print_warning(&format!("No *.creds files found in {from_dir}"));
    }
    for name in &names {
        print_info(&format!("Imported cloud {name}"));
    }
    print_success(&format!("Wrote {}", target.display()));

    Ok(())
}
