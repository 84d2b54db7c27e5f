//! Kubernetes listing adapter
//!
//! Reads kubeconfig contexts, builds a client per context and converts the
//! `k8s-openapi` objects into the snapshot models the engine joins.

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as core;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::{debug, info};

use crate::context::{resolve_contexts, ContextSelection};
use crate::error::Result;
use crate::inventory::KubernetesSource;
use crate::models::{
    ClaimRef, Node, PersistentVolume, Pod, PodStatus, Service, CINDER_CSI_DRIVER,
    NODE_VERSION_LABEL, PROVIDER_ID_PREFIX,
};

/// Contexts known to a kubeconfig
#[derive(Debug, Clone)]
pub struct KubeContexts {
    kubeconfig: Kubeconfig,
}

impl KubeContexts {
    /// Load from `path`, or from `KUBECONFIG` / the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let kubeconfig = match path {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        Ok(Self { kubeconfig })
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    pub fn current(&self) -> Option<&str> {
        self.kubeconfig.current_context.as_deref()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kubeconfig.contexts.iter().map(|c| c.name.as_str())
    }

    /// Resolve a context selector against this kubeconfig
    pub fn select(&self, selector: &str) -> ContextSelection {
        resolve_contexts(selector, self.current(), self.names())
    }

    /// Client bound to one context
    pub async fn client(&self, context: &str) -> Result<KubeClusterClient> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(self.kubeconfig.clone(), &options).await?;
        info!(context = %context, cluster_url = %config.cluster_url, "Connecting to cluster");
        Ok(KubeClusterClient {
            client: Client::try_from(config)?,
        })
    }
}

/// Lists the objects of one cluster
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

#[async_trait]
impl KubernetesSource for KubeClusterClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = Api::<core::Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(nodes.items.iter().map(node_from).collect())
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let services = Api::<core::Service>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(services.items.iter().map(service_from).collect())
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>> {
        let pvs = Api::<core::PersistentVolume>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(pvs.items.iter().filter_map(persistent_volume_from).collect())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let pods = Api::<core::Pod>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(pods.items.iter().map(pod_from).collect())
    }
}

pub fn node_from(node: &core::Node) -> Node {
    let name = node.metadata.name.clone().unwrap_or_default();
    let provider_id = node
        .spec
        .as_ref()
        .and_then(|s| s.provider_id.as_deref())
        .unwrap_or_default();
    let instance_id = provider_id
        .strip_prefix(PROVIDER_ID_PREFIX)
        .unwrap_or(provider_id)
        .to_string();

    let mut converted = Node {
        name,
        instance_id,
        version_label: node
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(NODE_VERSION_LABEL).cloned()),
        ..Default::default()
    };

    if let Some(status) = &node.status {
        converted.ready = status
            .conditions
            .iter()
            .flatten()
            .any(|c| c.type_ == "Ready" && c.status == "True");

        if let Some(info) = &status.node_info {
            converted.kubelet_version = info.kubelet_version.clone();
            converted.kube_proxy_version = info.kube_proxy_version.clone();
            converted.container_runtime_version = info.container_runtime_version.clone();
        }

        if let Some(capacity) = &status.capacity {
            converted.cpu = capacity.get("cpu").map(|q| q.0.clone());
            converted.memory_mb = capacity.get("memory").and_then(|q| memory_mb(&q.0));
        }

        converted.internal_ip = status
            .addresses
            .iter()
            .flatten()
            .find(|a| a.type_ == "InternalIP")
            .map(|a| a.address.clone());
    }

    converted
}

pub fn service_from(service: &core::Service) -> Service {
    Service {
        namespace: service.metadata.namespace.clone().unwrap_or_default(),
        name: service.metadata.name.clone().unwrap_or_default(),
        node_ports: service
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|p| p.node_port)
            .filter_map(|p| u16::try_from(p).ok())
            .collect(),
    }
}

/// Convert a cinder-backed persistent volume, in-tree or CSI. Anything else
/// is skipped.
pub fn persistent_volume_from(pv: &core::PersistentVolume) -> Option<PersistentVolume> {
    let name = pv.metadata.name.clone().unwrap_or_default();
    let spec = pv.spec.as_ref()?;

    let volume_id = match (&spec.cinder, &spec.csi) {
        (Some(cinder), _) => cinder.volume_id.clone(),
        (None, Some(csi)) if csi.driver == CINDER_CSI_DRIVER => csi.volume_handle.clone(),
        _ => {
            debug!(pv = %name, "Skipping persistent volume without cinder backing");
            return None;
        }
    };

    let claim = spec.claim_ref.as_ref().map(|c| {
        ClaimRef::new(
            c.namespace.clone().unwrap_or_default(),
            c.name.clone().unwrap_or_default(),
        )
    });

    Some(PersistentVolume {
        name,
        claim,
        volume_id,
    })
}

pub fn pod_from(pod: &core::Pod) -> Pod {
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let claims = pod
        .spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|v| v.persistent_volume_claim.as_ref())
        .map(|c| ClaimRef::new(namespace.clone(), c.claim_name.clone()).to_string())
        .collect();

    Pod {
        name: pod.metadata.name.clone().unwrap_or_default(),
        node_name: pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .filter(|n| !n.is_empty()),
        status: pod_status(pod),
        claims,
        namespace,
    }
}

/// Reduce a pod's status to what `kubectl get pods` would show for the
/// states the volume checks care about
pub fn pod_status(pod: &core::Pod) -> PodStatus {
    let Some(status) = &pod.status else {
        return PodStatus::Unknown;
    };

    if status.phase.as_deref() == Some("Failed") && status.reason.as_deref() == Some("Evicted") {
        return PodStatus::Evicted;
    }

    for condition in status.conditions.iter().flatten() {
        if condition.type_ != "Ready" {
            continue;
        }
        match (condition.status.as_str(), condition.reason.as_deref()) {
            ("True", _) => return PodStatus::Running,
            ("False", Some("PodCompleted")) => return PodStatus::Completed,
            ("False", Some("ContainersNotReady")) => {
                let waiting = status
                    .container_statuses
                    .iter()
                    .flatten()
                    .filter_map(|cs| cs.state.as_ref()?.waiting.as_ref()?.reason.as_deref())
                    .find_map(PodStatus::from_waiting_reason);
                if let Some(waiting) = waiting {
                    return waiting;
                }
            }
            _ => {}
        }
    }

    PodStatus::Unknown
}

/// Parse a memory quantity into megabytes (10^6 bytes), rounded up
pub fn memory_mb(quantity: &str) -> Option<u64> {
    let bytes = quantity_value(quantity)?;
    Some((bytes / 1_000_000.0).ceil() as u64)
}

fn quantity_value(quantity: &str) -> Option<f64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let quantity = quantity.trim();
    for (suffix, factor) in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * factor);
        }
    }
    quantity.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_conversion() {
        let node: core::Node = serde_json::from_value(json!({
            "metadata": {"name": "node-a", "labels": {"dhc-version": "1.4.2"}},
            "spec": {"providerID": "openstack:///SRV1"},
            "status": {
                "conditions": [
                    {"type": "MemoryPressure", "status": "False"},
                    {"type": "Ready", "status": "True"}
                ],
                "nodeInfo": {
                    "architecture": "amd64", "bootID": "", "containerRuntimeVersion": "containerd://1.7.2",
                    "kernelVersion": "", "kubeProxyVersion": "v1.28.3", "kubeletVersion": "v1.28.3",
                    "machineID": "", "operatingSystem": "linux", "osImage": "", "systemUUID": ""
                },
                "capacity": {"cpu": "4", "memory": "8144368Ki"},
                "addresses": [
                    {"type": "Hostname", "address": "node-a"},
                    {"type": "InternalIP", "address": "10.0.0.5"}
                ]
            }
        }))
        .unwrap();

        let converted = node_from(&node);

        assert_eq!(converted.instance_id, "SRV1");
        assert!(converted.ready);
        assert_eq!(converted.kubelet_version, "v1.28.3");
        assert_eq!(converted.version_label.as_deref(), Some("1.4.2"));
        assert_eq!(converted.cpu.as_deref(), Some("4"));
        assert_eq!(converted.memory_mb, Some(8340));
        assert_eq!(converted.internal_ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_node_not_ready() {
        let node: core::Node = serde_json::from_value(json!({
            "metadata": {"name": "node-b"},
            "status": {"conditions": [{"type": "Ready", "status": "Unknown"}]}
        }))
        .unwrap();

        let converted = node_from(&node);
        assert!(!converted.ready);
        assert_eq!(converted.instance_id, "");
    }

    #[test]
    fn test_service_node_ports() {
        let service: core::Service = serde_json::from_value(json!({
            "metadata": {"name": "nginx", "namespace": "ingress"},
            "spec": {"ports": [
                {"port": 80, "nodePort": 30080},
                {"port": 8080}
            ]}
        }))
        .unwrap();

        assert_eq!(service_from(&service).node_ports, vec![30080]);
    }

    #[test]
    fn test_persistent_volume_backends() {
        let in_tree: core::PersistentVolume = serde_json::from_value(json!({
            "metadata": {"name": "pv1"},
            "spec": {
                "cinder": {"volumeID": "VOL1"},
                "claimRef": {"namespace": "ns", "name": "pvc1"}
            }
        }))
        .unwrap();
        let csi: core::PersistentVolume = serde_json::from_value(json!({
            "metadata": {"name": "pv2"},
            "spec": {"csi": {"driver": "cinder.csi.openstack.org", "volumeHandle": "VOL2"}}
        }))
        .unwrap();
        let nfs: core::PersistentVolume = serde_json::from_value(json!({
            "metadata": {"name": "pv3"},
            "spec": {"nfs": {"server": "nfs", "path": "/export"}}
        }))
        .unwrap();

        let pv1 = persistent_volume_from(&in_tree).unwrap();
        assert_eq!(pv1.volume_id, "VOL1");
        assert_eq!(pv1.claim.unwrap().to_string(), "ns/pvc1");
        assert_eq!(persistent_volume_from(&csi).unwrap().volume_id, "VOL2");
        assert!(persistent_volume_from(&nfs).is_none());
    }

    fn pod_with_status(status: serde_json::Value) -> core::Pod {
        serde_json::from_value(json!({
            "metadata": {"name": "web-0", "namespace": "ns"},
            "spec": {
                "nodeName": "node-a",
                "containers": [{"name": "web"}],
                "volumes": [
                    {"name": "data", "persistentVolumeClaim": {"claimName": "pvc1"}},
                    {"name": "tmp", "emptyDir": {}}
                ]
            },
            "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_pod_claims_and_node() {
        let pod = pod_from(&pod_with_status(json!({
            "conditions": [{"type": "Ready", "status": "True"}]
        })));

        assert_eq!(pod.claims, vec!["ns/pvc1"]);
        assert_eq!(pod.node_name.as_deref(), Some("node-a"));
        assert_eq!(pod.status, PodStatus::Running);
    }

    #[test]
    fn test_pod_status_derivation() {
        let evicted = pod_with_status(json!({"phase": "Failed", "reason": "Evicted"}));
        let completed = pod_with_status(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "PodCompleted"}]
        }));
        let pulling = pod_with_status(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
            "containerStatuses": [{
                "name": "web", "image": "web", "imageID": "", "ready": false, "restartCount": 0,
                "state": {"waiting": {"reason": "ImagePullBackOff"}}
            }]
        }));
        let crashing = pod_with_status(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
            "containerStatuses": [{
                "name": "web", "image": "web", "imageID": "", "ready": false, "restartCount": 3,
                "state": {"waiting": {"reason": "CrashLoopBackOff"}}
            }]
        }));

        assert_eq!(pod_status(&evicted), PodStatus::Evicted);
        assert_eq!(pod_status(&completed), PodStatus::Completed);
        assert_eq!(pod_status(&pulling), PodStatus::ImagePullBackOff);
        assert_eq!(pod_status(&crashing), PodStatus::Unknown);
    }

    #[test]
    fn test_memory_quantities() {
        assert_eq!(memory_mb("8144368Ki"), Some(8340));
        assert_eq!(memory_mb("2Gi"), Some(2148));
        assert_eq!(memory_mb("500M"), Some(500));
        assert_eq!(memory_mb("1000000"), Some(1));
        assert_eq!(memory_mb("lots"), None);
    }

    #[test]
    fn test_contexts_from_kubeconfig() {
        let kubeconfig = Kubeconfig::from_yaml(
            r#"
apiVersion: v1
kind: Config
current-context: p1-dev
contexts:
- name: p1-dev
  context: {cluster: dev, user: admin}
- name: p1-prod
  context: {cluster: prod, user: admin}
clusters: []
users: []
"#,
        )
        .unwrap();
        let contexts = KubeContexts::from_kubeconfig(kubeconfig);

        assert_eq!(contexts.current(), Some("p1-dev"));
        assert_eq!(contexts.select("").contexts, vec!["p1-dev"]);
        assert_eq!(contexts.select("prod$").contexts, vec!["p1-prod"]);
    }
}
