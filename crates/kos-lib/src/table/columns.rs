//! Column vocabulary shared by all report kinds

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

macro_rules! columns {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Every column any report can show
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Column {
            $($variant),*
        }

        impl Column {
            pub const ALL: &'static [Column] = &[$(Column::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Column::$variant => $name),*
                }
            }
        }
    };
}

columns! {
    Cluster => "CLUSTER",
    // volumes
    Pvc => "PVC",
    Pv => "PV",
    Pod => "POD",
    PodNode => "POD_NODE",
    PodStatus => "POD_STATUS",
    CinderName => "CINDER_NAME",
    Size => "SIZE",
    CinderId => "CINDER_ID",
    CinderServer => "CINDER_SERVER",
    CinderServerId => "CINDER_SERVER_ID",
    CinderStatus => "CINDER_STATUS",
    NovaServer => "NOVA_SERVER",
    NovaServerId => "NOVA_SERVER_ID",
    NovaAttachments => "NOVA_ATTACHMENTS",
    StalePods => "STALE_PODS",
    // servers
    NodeName => "NODE_NAME",
    Status => "STATUS",
    KubeletVersion => "KUBELET_VERSION",
    KubeproxyVersion => "KUBEPROXY_VERSION",
    RuntimeVersion => "RUNTIME_VERSION",
    NodeVersion => "DHC_VERSION",
    ServerName => "SERVER_NAME",
    ServerId => "SERVER_ID",
    Volumes => "VOLUMES",
    State => "STATE",
    Cpu => "CPU",
    Ram => "RAM",
    Ip => "IP",
    // load balancers
    Name => "NAME",
    LbId => "LB_ID",
    FloatingIps => "FLOATING_IPS",
    VipAddress => "VIP_ADDRESS",
    Ports => "PORTS",
    Services => "SERVICES",
    Monitors => "MONITORS",
    Note => "NOTE",
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownColumn {
                column: s.to_string(),
                available: join_columns(Column::ALL),
            })
    }
}

/// Render a column list the way `--columns` expects it
pub fn join_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(Column::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// The three reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Volume,
    Server,
    LoadBalancer,
}

/// Preset selected by `--columns DEBUG`
pub const DEBUG_PRESET: &str = "DEBUG";

impl ResourceKind {
    /// Heading used when a report is sent to chat
    pub fn title(&self) -> &'static str {
        match self {
            ResourceKind::Volume => "Volumes",
            ResourceKind::Server => "Server",
            ResourceKind::LoadBalancer => "LBaaS",
        }
    }

    /// Every column a row of this kind fills
    pub fn columns(&self) -> &'static [Column] {
        use Column::*;
        match self {
            ResourceKind::Volume => &[
                Cluster, Pvc, Pv, Pod, PodNode, PodStatus, CinderName, Size, CinderId,
                CinderServer, CinderServerId, CinderStatus, NovaServer, NovaServerId,
                NovaAttachments, StalePods, Note,
            ],
            ResourceKind::Server => &[
                Cluster, NodeName, Status, KubeletVersion, KubeproxyVersion, RuntimeVersion,
                NodeVersion, ServerName, ServerId, Volumes, State, Cpu, Ram, Ip, Note,
            ],
            ResourceKind::LoadBalancer => &[
                Cluster, Name, LbId, Status, FloatingIps, VipAddress, Ports,
                Services, Monitors, Note,
            ],
        }
    }

    pub fn default_columns(&self) -> &'static [Column] {
        use Column::*;
        match self {
            ResourceKind::Volume => &[
                Cluster, Pvc, Pod, PodNode, PodStatus, CinderName, Size, CinderId,
                CinderServer, CinderServerId, CinderStatus, Note,
            ],
            ResourceKind::Server => &[
                Cluster, NodeName, Status, KubeletVersion, KubeproxyVersion, RuntimeVersion,
                NodeVersion, ServerName, ServerId, State, Cpu, Ram, Ip, Note,
            ],
            ResourceKind::LoadBalancer => {
                &[Cluster, Name, FloatingIps, VipAddress, Ports, Services, Note]
            }
        }
    }

    pub fn debug_columns(&self) -> &'static [Column] {
        use Column::*;
        match self {
            ResourceKind::Volume => &[
                Cluster, Pvc, Pv, Pod, PodNode, PodStatus, StalePods, CinderName, CinderId,
                CinderServer, CinderStatus, NovaServer, NovaAttachments, Note,
            ],
            ResourceKind::Server => &[
                Cluster, NodeName, Status, KubeletVersion, KubeproxyVersion, RuntimeVersion,
                NodeVersion, ServerName, ServerId, Volumes, State, Cpu, Ram, Ip, Note,
            ],
            ResourceKind::LoadBalancer => self.columns(),
        }
    }

    /// Indices (into the default column set) used to sort rows: cluster
    /// first, then the entity name
    pub fn sort_indices(&self) -> &'static [usize] {
        match self {
            ResourceKind::Volume => &[0, 1, 2],
            ResourceKind::Server | ResourceKind::LoadBalancer => &[0, 1],
        }
    }

    /// Parse a `--columns` value. Empty selects the defaults, `DEBUG` the
    /// debug preset; anything else must come from the shared vocabulary.
    pub fn parse_columns(&self, value: &str) -> Result<Vec<Column>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self.default_columns().to_vec());
        }
        if value == DEBUG_PRESET {
            return Ok(self.debug_columns().to_vec());
        }
        value.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| {
                c.parse::<Column>().map_err(|_| Error::UnknownColumn {
                    column: c.to_string(),
                    available: join_columns(self.columns()),
                })
            })
            .collect()
    }
}
