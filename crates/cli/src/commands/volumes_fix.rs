//! Volume attachment repair

use anyhow::{Context, Result};
use kos_lib::{
    repair_volumes, tenant_of, AppConfig, ContextSelection, Error, OpenStackClient, RepairPlan,
    RepairStep,
};

use super::Target;
use crate::output::{print_info, print_success};

/// The one context a repair may run against
pub fn single_context(selection: &ContextSelection) -> kos_lib::Result<&str> {
    match selection.contexts.as_slice() {
        [] => Err(Error::NoContext),
        [only] => Ok(only.as_str()),
        many => Err(Error::AmbiguousContext(many.to_vec())),
    }
}

/// Print every call that went through with its API response
fn print_steps(steps: &[RepairStep]) {
    for step in steps {
        match &step.server_id {
            Some(server) => print_success(&format!("{} {} on {}", step.action, step.volume_id, server)),
            None => print_success(&format!("{} {}", step.action, step.volume_id)),
        }
        if !step.response.trim().is_empty() {
            print_info(step.response.trim());
        }
    }
}

pub async fn run(target: &Target<'_>, volumes: &[String], plan: &RepairPlan) -> Result<()> {
    plan.validate()?;

    let contexts = target.contexts()?;
    let selection = target.select(&contexts)?;
    let context = single_context(&selection)?;
    let tenant = tenant_of(context);

    let config = AppConfig::load().context("Failed to load configuration")?;
    let credentials = config
        .credentials_for(tenant)
        .with_context(|| format!("No OpenStack credentials for tenant {tenant}"))?;
    let client = OpenStackClient::connect(&credentials)
        .await
        .with_context(|| format!("Failed to connect to OpenStack for tenant {tenant}"))?;

    let outcome = repair_volumes(&client, &client, volumes, plan).await?;
    print_steps(&outcome.steps);

    if let Some(error) = outcome.error {
        return Err(error).with_context(|| {
            format!("Repair aborted after {} completed step(s)", outcome.steps.len())
        });
    }

    Ok(())
}
