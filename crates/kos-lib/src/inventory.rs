//! Listing adapters and the per-context inventory snapshots they fill
//!
//! The traits are the seam between the reconciliation engine and the two
//! APIs. Each report kind fetches only the listings it joins.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    CloudServer, CloudVolume, FloatingIp, Listener, LoadBalancer, Member, Monitor, Node,
    NovaVolumeAttachment, PersistentVolume, Pod, Pool, Service,
};

/// Read-only listings from a Kubernetes cluster
#[async_trait]
pub trait KubernetesSource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_services(&self) -> Result<Vec<Service>>;

    /// Cinder-backed persistent volumes only
    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>>;

    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

/// Read-only listings from an OpenStack project, pagination already flattened
#[async_trait]
pub trait CloudSource: Send + Sync {
    async fn list_volumes(&self) -> Result<Vec<CloudVolume>>;

    async fn list_servers(&self) -> Result<Vec<CloudServer>>;

    /// Nova's own view of the volumes attached to one server
    async fn list_volume_attachments(&self, server_id: &str) -> Result<Vec<NovaVolumeAttachment>>;

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>>;

    async fn list_listeners(&self) -> Result<Vec<Listener>>;

    async fn list_pools(&self) -> Result<Vec<Pool>>;

    /// Members of one pool, with `pool_id` set
    async fn list_pool_members(&self, pool_id: &str) -> Result<Vec<Member>>;

    async fn list_monitors(&self) -> Result<Vec<Monitor>>;

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>>;
}

/// Mutating calls used by the repair command. Each returns the raw response
/// body so the operator can see what the API said.
#[async_trait]
pub trait CloudActions: Send + Sync {
    async fn attach_volume_cinder(
        &self,
        volume_id: &str,
        server_id: &str,
        mountpoint: &str,
    ) -> Result<String>;

    async fn detach_volume_cinder(
        &self,
        volume_id: &str,
        attachment_id: Option<&str>,
        force: bool,
    ) -> Result<String>;

    async fn attach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String>;

    async fn detach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String>;
}

/// Key a listing by an identifier, later entries win
pub fn index_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> BTreeMap<K, T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.into_iter().map(|item| (key(&item), item)).collect()
}

/// Nodes keyed by OpenStack instance id
pub fn index_nodes(nodes: Vec<Node>) -> BTreeMap<String, Node> {
    index_by(nodes, |n| n.instance_id.clone())
}

/// Services keyed by each of their node ports
pub fn index_services(services: Vec<Service>) -> BTreeMap<u16, Service> {
    let mut by_port = BTreeMap::new();
    for service in services {
        for port in &service.node_ports {
            by_port.insert(*port, service.clone());
        }
    }
    by_port
}

/// Persistent volumes keyed by backing cinder volume id
pub fn index_persistent_volumes(pvs: Vec<PersistentVolume>) -> BTreeMap<String, PersistentVolume> {
    index_by(pvs, |pv| pv.volume_id.clone())
}

/// Pods keyed by every `namespace/claim` they mount. A claim may map to
/// several pods, e.g. a running pod and its evicted predecessor.
pub fn index_pods_by_claim(pods: Vec<Pod>) -> BTreeMap<String, Vec<Pod>> {
    let mut by_claim: BTreeMap<String, Vec<Pod>> = BTreeMap::new();
    for pod in pods {
        for claim in &pod.claims {
            by_claim.entry(claim.clone()).or_default().push(pod.clone());
        }
    }
    for pods in by_claim.values_mut() {
        pods.sort_by(|a, b| a.name.cmp(&b.name));
    }
    by_claim
}

/// Everything the volume report joins
#[derive(Debug, Clone, Default)]
pub struct VolumeInventory {
    pub persistent_volumes: BTreeMap<String, PersistentVolume>,
    pub pods_by_claim: BTreeMap<String, Vec<Pod>>,
    pub volumes: BTreeMap<String, CloudVolume>,
    pub servers: BTreeMap<String, CloudServer>,
    /// Nova attachments keyed by server id
    pub nova_attachments: BTreeMap<String, Vec<NovaVolumeAttachment>>,
}

impl VolumeInventory {
    pub async fn fetch(kube: &dyn KubernetesSource, cloud: &dyn CloudSource) -> Result<Self> {
        let persistent_volumes = index_persistent_volumes(kube.list_persistent_volumes().await?);
        let pods_by_claim = index_pods_by_claim(kube.list_pods().await?);
        let volumes = index_by(cloud.list_volumes().await?, |v| v.id.clone());
        let servers = index_by(cloud.list_servers().await?, |s| s.id.clone());

        let mut nova_attachments = BTreeMap::new();
        for server_id in servers.keys() {
            let attachments = cloud.list_volume_attachments(server_id).await?;
            nova_attachments.insert(server_id.clone(), attachments);
        }

        debug!(
            persistent_volumes = persistent_volumes.len(),
            volumes = volumes.len(),
            servers = servers.len(),
            "Fetched volume inventory"
        );

        Ok(Self {
            persistent_volumes,
            pods_by_claim,
            volumes,
            servers,
            nova_attachments,
        })
    }
}

/// Everything the server report joins
#[derive(Debug, Clone, Default)]
pub struct ServerInventory {
    pub nodes: BTreeMap<String, Node>,
    pub servers: BTreeMap<String, CloudServer>,
}

impl ServerInventory {
    pub async fn fetch(kube: &dyn KubernetesSource, cloud: &dyn CloudSource) -> Result<Self> {
        let nodes = index_nodes(kube.list_nodes().await?);
        let servers = index_by(cloud.list_servers().await?, |s| s.id.clone());

        debug!(nodes = nodes.len(), servers = servers.len(), "Fetched server inventory");

        Ok(Self { nodes, servers })
    }
}

/// Everything the load balancer report joins
#[derive(Debug, Clone, Default)]
pub struct LoadBalancerInventory {
    pub services: BTreeMap<u16, Service>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    pub listeners: BTreeMap<String, Listener>,
    pub pools: BTreeMap<String, Pool>,
    pub members: BTreeMap<String, Member>,
    pub monitors: BTreeMap<String, Monitor>,
    pub floating_ips: BTreeMap<String, FloatingIp>,
}

impl LoadBalancerInventory {
    pub async fn fetch(kube: &dyn KubernetesSource, cloud: &dyn CloudSource) -> Result<Self> {
        let services = index_services(kube.list_services().await?);
        let load_balancers = index_by(cloud.list_load_balancers().await?, |lb| lb.id.clone());
        let listeners = index_by(cloud.list_listeners().await?, |l| l.id.clone());
        let pools = index_by(cloud.list_pools().await?, |p| p.id.clone());

        let mut members = BTreeMap::new();
        for pool_id in pools.keys() {
            for mut member in cloud.list_pool_members(pool_id).await? {
                member.pool_id = pool_id.clone();
                members.insert(member.id.clone(), member);
            }
        }

        let monitors = index_by(cloud.list_monitors().await?, |m| m.id.clone());
        let floating_ips = index_by(cloud.list_floating_ips().await?, |f| f.id.clone());

        debug!(
            load_balancers = load_balancers.len(),
            listeners = listeners.len(),
            pools = pools.len(),
            members = members.len(),
            "Fetched load balancer inventory"
        );

        Ok(Self {
            services,
            load_balancers,
            listeners,
            pools,
            members,
            monitors,
            floating_ips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PodStatus;

    fn pod(name: &str, claims: &[&str]) -> Pod {
        Pod {
            namespace: "ns".to_string(),
            name: name.to_string(),
            node_name: Some("node-a".to_string()),
            status: PodStatus::Running,
            claims: claims.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_pods_by_claim_is_one_to_many() {
        let index = index_pods_by_claim(vec![
            pod("web-1", &["ns/data"]),
            pod("web-0", &["ns/data", "ns/logs"]),
        ]);

        let names: Vec<_> = index["ns/data"].iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["web-0", "web-1"]);
        assert_eq!(index["ns/logs"].len(), 1);
    }

    #[test]
    fn test_service_occupies_every_node_port() {
        let index = index_services(vec![Service {
            namespace: "ingress".to_string(),
            name: "nginx".to_string(),
            node_ports: vec![30080, 30443],
        }]);

        assert_eq!(index.len(), 2);
        assert_eq!(index[&30443].qualified_name(), "ingress/nginx");
    }

    #[test]
    fn test_nodes_keyed_by_instance_id() {
        let index = index_nodes(vec![Node {
            name: "node-a".to_string(),
            instance_id: "SRV1".to_string(),
            ..Default::default()
        }]);

        assert_eq!(index["SRV1"].name, "node-a");
    }
}
