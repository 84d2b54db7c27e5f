//! Snapshot models for both inventories
//!
//! Kubernetes objects are converted from `k8s-openapi` types by the listing
//! adapter; OpenStack objects are deserialized straight from the API bodies.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// Prefix of `spec.providerID` on nodes created by the OpenStack cloud provider
pub const PROVIDER_ID_PREFIX: &str = "openstack:///";

/// Node label carrying the custom node image version
pub const NODE_VERSION_LABEL: &str = "dhc-version";

/// Name prefix of volumes created by the in-tree dynamic provisioner
pub const DYNAMIC_PVC_PREFIX: &str = "kubernetes-dynamic-pvc";

/// CSI driver name of the cinder CSI plugin
pub const CINDER_CSI_DRIVER: &str = "cinder.csi.openstack.org";

/// Value shown for fields that could not be joined
pub const PLACEHOLDER: &str = "-";

// ---------------------------------------------------------------------------
// Kubernetes
// ---------------------------------------------------------------------------

/// Kubernetes node, keyed by the OpenStack instance id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    /// `spec.providerID` without [`PROVIDER_ID_PREFIX`]
    pub instance_id: String,
    pub ready: bool,
    pub kubelet_version: String,
    pub kube_proxy_version: String,
    pub container_runtime_version: String,
    pub version_label: Option<String>,
    pub cpu: Option<String>,
    pub memory_mb: Option<u64>,
    pub internal_ip: Option<String>,
}

/// Kubernetes service exposing node ports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub namespace: String,
    pub name: String,
    pub node_ports: Vec<u16>,
}

impl Service {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Reference from a persistent volume to its claim
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimRef {
    pub namespace: String,
    pub name: String,
}

impl ClaimRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ClaimRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cinder-backed persistent volume
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistentVolume {
    pub name: String,
    pub claim: Option<ClaimRef>,
    /// Backing cinder volume id
    pub volume_id: String,
}

/// Status of a pod as shown by `kubectl get pods`, reduced to the states the
/// volume checks care about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PodStatus {
    Running,
    Completed,
    Evicted,
    ImagePullBackOff,
    ContainerCreating,
    CreateContainerConfigError,
    #[default]
    Unknown,
}

impl PodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodStatus::Running => "Running",
            PodStatus::Completed => "Completed",
            PodStatus::Evicted => "Evicted",
            PodStatus::ImagePullBackOff => "ImagePullBackOff",
            PodStatus::ContainerCreating => "ContainerCreating",
            PodStatus::CreateContainerConfigError => "CreateContainerConfigError",
            PodStatus::Unknown => "Unknown",
        }
    }

    /// Waiting reasons that are reported verbatim
    pub fn from_waiting_reason(reason: &str) -> Option<Self> {
        match reason {
            "ImagePullBackOff" => Some(PodStatus::ImagePullBackOff),
            "ContainerCreating" => Some(PodStatus::ContainerCreating),
            "CreateContainerConfigError" => Some(PodStatus::CreateContainerConfigError),
            _ => None,
        }
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pod with the claims it mounts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub node_name: Option<String>,
    pub status: PodStatus,
    /// Mounted claims as `namespace/claim`
    pub claims: Vec<String>,
}

// ---------------------------------------------------------------------------
// OpenStack
// ---------------------------------------------------------------------------

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cinder volume
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CloudVolume {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,
}

/// Attachment record in cinder's view of a volume
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VolumeAttachment {
    pub server_id: String,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

/// Nova server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CloudServer {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "os-extended-volumes:volumes_attached", default)]
    pub attached_volumes: Vec<AttachedVolume>,
}

impl CloudServer {
    /// Whether any attachment stub on this server names the volume
    pub fn has_volume(&self, volume_id: &str) -> bool {
        self.attached_volumes.iter().any(|a| a.id == volume_id)
    }
}

/// Volume stub embedded in a nova server listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttachedVolume {
    pub id: String,
}

/// Attachment record from nova's `os-volume_attachments` view
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NovaVolumeAttachment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(rename = "volumeId")]
    pub volume_id: String,
}

/// `{"id": ...}` back-reference used by the lbaas resources
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub vip_address: String,
    #[serde(default)]
    pub vip_port_id: String,
    #[serde(default)]
    pub provisioning_status: String,
    #[serde(default)]
    pub operating_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Listener {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    pub protocol_port: u16,
    #[serde(default)]
    pub loadbalancers: Vec<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Pool {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub listeners: Vec<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Member {
    pub id: String,
    pub address: String,
    pub protocol_port: u16,
    /// Filled in by the adapter, the members endpoint is scoped to one pool
    #[serde(default)]
    pub pool_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Monitor {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub delay: u32,
    #[serde(default)]
    pub pools: Vec<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub floating_ip_address: String,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub fixed_ip_address: Option<String>,
}
