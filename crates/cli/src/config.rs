//! Kubeconfig location

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Kubeconfig to load: the flag, otherwise `~/.kube/config` when
/// `KUBECONFIG` is unset. `None` leaves `KUBECONFIG` (possibly a list of
/// files) to kube's own loader.
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(PathBuf::from(path)));
    }

    if std::env::var_os("KUBECONFIG").is_some_and(|v| !v.is_empty()) {
        return Ok(None);
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(Some(home.join(".kube").join("config")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let path = kubeconfig_path(Some("/tmp/kubeconfig")).unwrap();
        assert_eq!(path, Some(PathBuf::from("/tmp/kubeconfig")));
    }
}
