use std::collections::BTreeMap;

use crate::inventory::ServerInventory;
use crate::models::{CloudServer, Node, PLACEHOLDER};
use crate::table::Column;

use super::{join_or_placeholder, notes_cell, or_placeholder, Anomaly, Notes, ReportRow};

/// Reconciled view of one nova server and the node running on it
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRow {
    pub cluster: String,
    pub server_id: String,
    pub server_name: String,
    pub server_status: String,
    pub node: Option<Node>,
    /// Attachment stubs per distinct volume id
    pub volumes: BTreeMap<String, usize>,
    pub notes: Notes,
}

pub fn reconcile_servers(cluster: &str, inventory: &ServerInventory) -> Vec<ServerRow> {
    inventory
        .servers
        .values()
        .map(|server| server_row(cluster, server, inventory.nodes.get(&server.id)))
        .collect()
}

fn server_row(cluster: &str, server: &CloudServer, node: Option<&Node>) -> ServerRow {
    let mut volumes: BTreeMap<String, usize> = BTreeMap::new();
    for stub in &server.attached_volumes {
        *volumes.entry(stub.id.clone()).or_default() += 1;
    }

    let mut notes = Notes::default();
    if server.attached_volumes.len() > volumes.len() {
        notes.push(Anomaly::MultipleAttachments);
    }

    ServerRow {
        cluster: cluster.to_string(),
        server_id: server.id.clone(),
        server_name: server.name.clone(),
        server_status: server.status.clone(),
        node: node.cloned(),
        volumes,
        notes,
    }
}

impl ServerRow {
    fn node_field(&self, field: impl Fn(&Node) -> Option<String>) -> String {
        or_placeholder(self.node.as_ref().and_then(field).unwrap_or_default())
    }
}

impl ReportRow for ServerRow {
    fn value(&self, column: Column) -> Option<String> {
        let value = match column {
            Column::Cluster => self.cluster.clone(),
            Column::NodeName => self.node_field(|n| Some(n.name.clone())),
            Column::Status => match &self.node {
                Some(node) if node.ready => "Ready".to_string(),
                Some(_) => "NotReady".to_string(),
                None => PLACEHOLDER.to_string(),
            },
            Column::KubeletVersion => self.node_field(|n| Some(n.kubelet_version.clone())),
            Column::KubeproxyVersion => self.node_field(|n| Some(n.kube_proxy_version.clone())),
            Column::RuntimeVersion => self.node_field(|n| Some(n.container_runtime_version.clone())),
            Column::NodeVersion => self.node_field(|n| n.version_label.clone()),
            Column::ServerName => or_placeholder(self.server_name.clone()),
            Column::ServerId => self.server_id.clone(),
            Column::Volumes => join_or_placeholder(
                self.volumes
                    .iter()
                    .map(|(id, count)| format!("{count}x {id}")),
            ),
            Column::State => or_placeholder(self.server_status.clone()),
            Column::Cpu => self.node_field(|n| n.cpu.clone()),
            Column::Ram => self.node_field(|n| n.memory_mb.map(|mb| format!("{mb}MB"))),
            Column::Ip => self.node_field(|n| n.internal_ip.clone()),
            Column::Note => notes_cell(&self.notes),
            _ => return None,
        };
        Some(value)
    }

    fn state(&self) -> &str {
        &self.server_status
    }

    fn notes(&self) -> &Notes {
        &self.notes
    }
}
