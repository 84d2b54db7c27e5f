//! Subcommand implementations

pub mod import_config;
pub mod report;
pub mod volumes_fix;

use anyhow::{bail, Context, Result};
use kos_lib::{ContextSelection, KubeContexts};

use crate::config::kubeconfig_path;
use crate::output::print_warning;

/// Kubeconfig and context selector given on the command line
pub struct Target<'a> {
    pub kubeconfig: Option<&'a str>,
    pub selector: &'a str,
}

impl Target<'_> {
    pub fn contexts(&self) -> Result<KubeContexts> {
        let path = kubeconfig_path(self.kubeconfig)?;
        KubeContexts::load(path.as_deref()).context("Failed to read kubeconfig")
    }

    /// Resolve the selector. A non-empty selector matching nothing is an
    /// error; an empty one is left to the caller.
    pub fn select(&self, contexts: &KubeContexts) -> Result<ContextSelection> {
        let selection = contexts.select(self.selector);
        for pattern in &selection.invalid_patterns {
            print_warning(&format!("Ignoring invalid context pattern {pattern:?}"));
        }
        if selection.is_empty() && !self.selector.trim().is_empty() {
            bail!("No context matches {:?}", self.selector);
        }
        Ok(selection)
    }
}
