use std::collections::BTreeSet;

use crate::inventory::VolumeInventory;
use crate::models::{ClaimRef, CloudVolume, Pod, PodStatus, DYNAMIC_PVC_PREFIX, PLACEHOLDER};
use crate::table::Column;

use super::{join_or_placeholder, notes_cell, or_placeholder, Anomaly, Notes, ReportRow};

/// Server named by a cinder attachment record
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedServer {
    pub id: String,
    /// `None` when the server is missing from the nova listing
    pub name: Option<String>,
}

impl AttachedServer {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("not found")
    }
}

/// One server in nova's view of a volume
#[derive(Debug, Clone, PartialEq)]
pub struct NovaServerAttachment {
    pub server_id: String,
    pub server_name: String,
    pub count: usize,
    pub devices: Vec<String>,
}

impl NovaServerAttachment {
    /// `<count>x <server>:[<devices>]`
    pub fn summary(&self) -> String {
        format!("{}x {}:[{}]", self.count, self.server_name, self.devices.join(" "))
    }
}

/// The pod a row reports on
#[derive(Debug, Clone, PartialEq)]
pub struct PodRef {
    pub name: String,
    pub node: Option<String>,
    pub status: PodStatus,
}

impl From<&Pod> for PodRef {
    fn from(pod: &Pod) -> Self {
        Self {
            name: pod.name.clone(),
            node: pod.node_name.clone(),
            status: pod.status,
        }
    }
}

/// Reconciled view of one cinder volume and, when several pods mount it,
/// one of those pods
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRow {
    pub cluster: String,
    pub claim: Option<ClaimRef>,
    pub pv_name: Option<String>,
    pub pod: Option<PodRef>,
    /// Evicted pods still referencing the claim
    pub stale_pods: Vec<String>,
    pub volume_id: String,
    pub volume_name: String,
    pub size: u64,
    pub status: String,
    pub cinder_servers: Vec<AttachedServer>,
    pub nova_servers: Vec<NovaServerAttachment>,
    pub notes: Notes,
}

/// Reconcile every cinder volume of one context
pub fn reconcile_volumes(cluster: &str, inventory: &VolumeInventory) -> Vec<VolumeRow> {
    let mut rows = Vec::new();

    for volume in inventory.volumes.values() {
        let cinder_servers = cinder_view(volume, inventory);
        let nova_servers = nova_view(&volume.id, inventory);

        let pv = inventory.persistent_volumes.get(&volume.id);
        let claim = pv.and_then(|pv| pv.claim.clone());
        let pods = claim
            .as_ref()
            .and_then(|c| inventory.pods_by_claim.get(&c.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let (stale, current): (Vec<&Pod>, Vec<&Pod>) =
            pods.iter().partition(|p| p.status == PodStatus::Evicted);
        let stale_pods: Vec<String> = stale.iter().map(|p| p.name.clone()).collect();

        let mut pod_refs: Vec<Option<PodRef>> = current.into_iter().map(|p| Some(p.into())).collect();
        if pod_refs.is_empty() {
            pod_refs.push(None);
        }

        for pod in pod_refs {
            let notes = volume_notes(
                volume,
                pod.as_ref(),
                &cinder_servers,
                &nova_servers,
                pv.is_some() || claim.is_some(),
            );
            rows.push(VolumeRow {
                cluster: cluster.to_string(),
                claim: claim.clone(),
                pv_name: pv.map(|pv| pv.name.clone()),
                pod,
                stale_pods: stale_pods.clone(),
                volume_id: volume.id.clone(),
                volume_name: volume.name.clone(),
                size: volume.size,
                status: volume.status.clone(),
                cinder_servers: cinder_servers.clone(),
                nova_servers: nova_servers.clone(),
                notes,
            });
        }
    }

    rows
}

fn cinder_view(volume: &CloudVolume, inventory: &VolumeInventory) -> Vec<AttachedServer> {
    volume
        .attachments
        .iter()
        .map(|a| AttachedServer {
            id: a.server_id.clone(),
            name: inventory.servers.get(&a.server_id).map(|s| s.name.clone()),
        })
        .collect()
}

fn nova_view(volume_id: &str, inventory: &VolumeInventory) -> Vec<NovaServerAttachment> {
    inventory
        .nova_attachments
        .iter()
        .filter_map(|(server_id, attachments)| {
            let matching: Vec<_> = attachments.iter().filter(|a| a.volume_id == volume_id).collect();
            if matching.is_empty() {
                return None;
            }
            Some(NovaServerAttachment {
                server_id: server_id.clone(),
                server_name: inventory
                    .servers
                    .get(server_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| server_id.clone()),
                count: matching.len(),
                devices: matching.iter().filter_map(|a| a.device.clone()).collect(),
            })
        })
        .collect()
}

fn volume_notes(
    volume: &CloudVolume,
    pod: Option<&PodRef>,
    cinder: &[AttachedServer],
    nova: &[NovaServerAttachment],
    bound: bool,
) -> Notes {
    let mut notes = Notes::default();

    let nova_count: usize = nova.iter().map(|n| n.count).sum();
    if nova_count >= 2 {
        notes.push(Anomaly::MultipleAttachments);
    }

    let active_pod = pod.filter(|p| p.status != PodStatus::Completed);
    if let Some(node) = active_pod.and_then(|p| p.node.as_deref()) {
        if !cinder.iter().any(|s| s.name.as_deref() == Some(node)) {
            notes.push(Anomaly::PodNotOnCinderServer);
        }
        if !nova.iter().any(|s| s.server_name == node) {
            notes.push(Anomaly::PodNotOnNovaServer);
        }
    }

    let cinder_ids: BTreeSet<&str> = cinder.iter().map(|s| s.id.as_str()).collect();
    let nova_ids: BTreeSet<&str> = nova.iter().map(|s| s.server_id.as_str()).collect();
    if !nova_ids.is_superset(&cinder_ids) {
        notes.push(Anomaly::NovaCinderMismatch);
    }

    match volume.status.as_str() {
        "available" => {
            if !cinder.is_empty() || !nova.is_empty() {
                notes.push(Anomaly::AvailableButAttached);
            }
            if let Some(pod) = active_pod {
                notes.push(Anomaly::AvailableButPod(pod.status));
            }
        }
        "in-use" if cinder.is_empty() => notes.push(Anomaly::InUseButNotAttached),
        _ => {}
    }

    if cinder.iter().any(|s| s.name.is_none()) {
        notes.push(Anomaly::AttachedServerNotFound);
    }

    if !bound && pod.is_none() && volume.name.starts_with(DYNAMIC_PVC_PREFIX) {
        notes.push(Anomaly::OrphanedKubernetesDisk);
    }

    notes
}

impl ReportRow for VolumeRow {
    fn value(&self, column: Column) -> Option<String> {
        let value = match column {
            Column::Cluster => self.cluster.clone(),
            Column::Pvc => self
                .claim
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            Column::Pv => or_placeholder(self.pv_name.clone().unwrap_or_default()),
            Column::Pod => or_placeholder(self.pod.as_ref().map(|p| p.name.clone()).unwrap_or_default()),
            Column::PodNode => or_placeholder(
                self.pod
                    .as_ref()
                    .and_then(|p| p.node.clone())
                    .unwrap_or_default(),
            ),
            Column::PodStatus => self
                .pod
                .as_ref()
                .map(|p| p.status.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            Column::StalePods => join_or_placeholder(&self.stale_pods),
            Column::CinderName => or_placeholder(self.volume_name.clone()),
            Column::Size => self.size.to_string(),
            Column::CinderId => self.volume_id.clone(),
            Column::CinderServer => {
                join_or_placeholder(self.cinder_servers.iter().map(AttachedServer::display_name))
            }
            Column::CinderServerId => join_or_placeholder(self.cinder_servers.iter().map(|s| &s.id)),
            Column::CinderStatus => or_placeholder(self.status.clone()),
            Column::NovaServer => join_or_placeholder(self.nova_servers.iter().map(|s| &s.server_name)),
            Column::NovaServerId => join_or_placeholder(self.nova_servers.iter().map(|s| &s.server_id)),
            Column::NovaAttachments => {
                join_or_placeholder(self.nova_servers.iter().map(NovaServerAttachment::summary))
            }
            Column::Note => notes_cell(&self.notes),
            _ => return None,
        };
        Some(value)
    }

    fn state(&self) -> &str {
        &self.status
    }

    fn namespace(&self) -> Option<&str> {
        self.claim.as_ref().map(|c| c.namespace.as_str())
    }

    fn notes(&self) -> &Notes {
        &self.notes
    }
}
