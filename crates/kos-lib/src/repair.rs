//! Explicit attach/detach repair actions
//!
//! Volumes and servers may be named by id or by name. The steps run in a
//! fixed order per volume and the first failing call aborts the run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::inventory::{index_by, CloudActions, CloudSource};
use crate::models::{CloudServer, CloudVolume};

/// Length of an OpenStack UUID, identifiers of this length are used as ids
const ID_LENGTH: usize = 36;

fn looks_like_id(value: &str) -> bool {
    value.len() == ID_LENGTH
}

/// Resolve a volume id or name
pub fn resolve_volume(volumes: &BTreeMap<String, CloudVolume>, id_or_name: &str) -> Result<String> {
    if looks_like_id(id_or_name) {
        if !volumes.contains_key(id_or_name) {
            warn!(volume = %id_or_name, "Volume id not in listing, using it as given");
        }
        return Ok(id_or_name.to_string());
    }
    volumes
        .values()
        .find(|v| v.name == id_or_name)
        .map(|v| v.id.clone())
        .ok_or_else(|| Error::NotFound {
            kind: "volume",
            name: id_or_name.to_string(),
        })
}

/// Resolve a server id or name
pub fn resolve_server(servers: &BTreeMap<String, CloudServer>, id_or_name: &str) -> Result<String> {
    if looks_like_id(id_or_name) {
        return Ok(id_or_name.to_string());
    }
    servers
        .values()
        .find(|s| s.name == id_or_name)
        .map(|s| s.id.clone())
        .ok_or_else(|| Error::NotFound {
            kind: "server",
            name: id_or_name.to_string(),
        })
}

/// What to do with every requested volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    /// Server id or name to attach to through cinder
    pub attach_cinder: Option<String>,
    pub attach_cinder_mountpoint: Option<String>,
    /// Server id or name to attach to through nova
    pub attach_nova: Option<String>,
    pub detach_cinder: bool,
    /// Use `os-force_detach` for the cinder detach
    pub force: bool,
    pub detach_nova: bool,
}

impl RepairPlan {
    pub fn validate(&self) -> Result<()> {
        if self.attach_cinder.is_some() && self.attach_cinder_mountpoint.is_none() {
            return Err(Error::config("--attach-cinder requires --attach-cinder-mountpoint"));
        }
        if self.attach_cinder.is_none()
            && self.attach_nova.is_none()
            && !self.detach_cinder
            && !self.detach_nova
        {
            return Err(Error::config("no repair action requested"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    AttachCinder,
    AttachNova,
    DetachCinder,
    ForceDetachCinder,
    DetachNova,
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairAction::AttachCinder => "cinder attach",
            RepairAction::AttachNova => "nova attach",
            RepairAction::DetachCinder => "cinder detach",
            RepairAction::ForceDetachCinder => "cinder force-detach",
            RepairAction::DetachNova => "nova detach",
        };
        f.write_str(name)
    }
}

/// A call that went through, with the API's response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairStep {
    pub action: RepairAction,
    pub volume_id: String,
    pub server_id: Option<String>,
    pub response: String,
}

/// Calls made by a repair run. A failing call stops the run and is kept
/// in `error`; the steps before it stay in `steps`.
#[derive(Debug, Default)]
pub struct RepairOutcome {
    pub steps: Vec<RepairStep>,
    pub error: Option<Error>,
}

impl RepairOutcome {
    pub fn into_result(self) -> Result<Vec<RepairStep>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.steps),
        }
    }
}

/// Run `plan` for every volume in `targets`.
///
/// Every target and server is resolved before the first call is sent, so
/// an unknown name changes nothing.
pub async fn repair_volumes(
    cloud: &dyn CloudSource,
    actions: &dyn CloudActions,
    targets: &[String],
    plan: &RepairPlan,
) -> Result<RepairOutcome> {
    plan.validate()?;

    let volumes = index_by(cloud.list_volumes().await?, |v| v.id.clone());
    let servers = index_by(cloud.list_servers().await?, |s| s.id.clone());

    let attach_cinder = plan
        .attach_cinder
        .as_deref()
        .map(|s| resolve_server(&servers, s))
        .transpose()?;
    let attach_nova = plan
        .attach_nova
        .as_deref()
        .map(|s| resolve_server(&servers, s))
        .transpose()?;
    let volume_ids = targets
        .iter()
        .map(|t| resolve_volume(&volumes, t))
        .collect::<Result<Vec<_>>>()?;

    let run = RepairRun {
        actions,
        plan,
        volumes: &volumes,
        servers: &servers,
        attach_cinder: attach_cinder.as_deref(),
        attach_nova: attach_nova.as_deref(),
    };

    let mut outcome = RepairOutcome::default();
    for volume_id in &volume_ids {
        if let Err(e) = run.repair(volume_id, &mut outcome.steps).await {
            warn!(volume = %volume_id, error = %e, completed = outcome.steps.len(), "Repair aborted");
            outcome.error = Some(e);
            break;
        }
    }
    Ok(outcome)
}

struct RepairRun<'a> {
    actions: &'a dyn CloudActions,
    plan: &'a RepairPlan,
    volumes: &'a BTreeMap<String, CloudVolume>,
    servers: &'a BTreeMap<String, CloudServer>,
    attach_cinder: Option<&'a str>,
    attach_nova: Option<&'a str>,
}

impl RepairRun<'_> {
    fn record(steps: &mut Vec<RepairStep>, action: RepairAction, volume_id: &str, server_id: Option<&str>, response: String) {
        info!(
            action = %action,
            volume = %volume_id,
            server = server_id.unwrap_or("-"),
            response = %response,
            "Repair step done"
        );
        steps.push(RepairStep {
            action,
            volume_id: volume_id.to_string(),
            server_id: server_id.map(str::to_string),
            response,
        });
    }

    async fn repair(&self, volume_id: &str, steps: &mut Vec<RepairStep>) -> Result<()> {
        let plan = self.plan;
        info!(volume = %volume_id, "Repairing volume");

        if let (Some(server_id), Some(mountpoint)) =
            (self.attach_cinder, plan.attach_cinder_mountpoint.as_deref())
        {
            let response = self.actions.attach_volume_cinder(volume_id, server_id, mountpoint).await?;
            Self::record(steps, RepairAction::AttachCinder, volume_id, Some(server_id), response);
        }

        if let Some(server_id) = self.attach_nova {
            let response = self.actions.attach_volume_nova(volume_id, server_id).await?;
            Self::record(steps, RepairAction::AttachNova, volume_id, Some(server_id), response);
        }

        if plan.detach_cinder {
            let action = if plan.force {
                RepairAction::ForceDetachCinder
            } else {
                RepairAction::DetachCinder
            };
            let attachments: Vec<(Option<&str>, &str)> = self
                .volumes
                .get(volume_id)
                .map(|v| {
                    v.attachments
                        .iter()
                        .map(|a| (a.attachment_id.as_deref(), a.server_id.as_str()))
                        .collect()
                })
                .unwrap_or_default();

            if attachments.is_empty() {
                let response = self.actions.detach_volume_cinder(volume_id, None, plan.force).await?;
                Self::record(steps, action, volume_id, None, response);
            }
            for (attachment_id, server_id) in attachments {
                let response = self
                    .actions
                    .detach_volume_cinder(volume_id, attachment_id, plan.force)
                    .await?;
                Self::record(steps, action, volume_id, Some(server_id), response);
            }
        }

        if plan.detach_nova {
            let holders: BTreeSet<&str> = self
                .servers
                .values()
                .filter(|s| s.has_volume(volume_id))
                .map(|s| s.id.as_str())
                .collect();
            if holders.is_empty() {
                warn!(volume = %volume_id, "No server lists the volume, nothing to detach in nova");
            }
            for server_id in holders {
                let response = self.actions.detach_volume_nova(volume_id, server_id).await?;
                Self::record(steps, RepairAction::DetachNova, volume_id, Some(server_id), response);
            }
        }

        Ok(())
    }
}
