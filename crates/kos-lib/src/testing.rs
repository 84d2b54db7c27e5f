//! In-memory sources and recording actions for tests

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::inventory::{CloudActions, CloudSource, KubernetesSource};
use crate::models::{
    CloudServer, CloudVolume, FloatingIp, Listener, LoadBalancer, Member, Monitor, Node,
    NovaVolumeAttachment, PersistentVolume, Pod, Pool, Service,
};

fn unavailable(what: &str) -> Error {
    Error::Api {
        status: StatusCode::SERVICE_UNAVAILABLE,
        url: format!("fake://{what}"),
        body: "unavailable".to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticKube {
    pub nodes: Vec<Node>,
    pub services: Vec<Service>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub pods: Vec<Pod>,
    pub unavailable: bool,
}

impl StaticKube {
    fn check(&self, what: &str) -> Result<()> {
        if self.unavailable {
            return Err(unavailable(what));
        }
        Ok(())
    }
}

#[async_trait]
impl KubernetesSource for StaticKube {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check("nodes")?;
        Ok(self.nodes.clone())
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        self.check("services")?;
        Ok(self.services.clone())
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>> {
        self.check("persistentvolumes")?;
        Ok(self.persistent_volumes.clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.check("pods")?;
        Ok(self.pods.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCloud {
    pub volumes: Vec<CloudVolume>,
    pub servers: Vec<CloudServer>,
    pub nova_attachments: BTreeMap<String, Vec<NovaVolumeAttachment>>,
    pub load_balancers: Vec<LoadBalancer>,
    pub listeners: Vec<Listener>,
    pub pools: Vec<Pool>,
    pub members: BTreeMap<String, Vec<Member>>,
    pub monitors: Vec<Monitor>,
    pub floating_ips: Vec<FloatingIp>,
}

#[async_trait]
impl CloudSource for StaticCloud {
    async fn list_volumes(&self) -> Result<Vec<CloudVolume>> {
        Ok(self.volumes.clone())
    }

    async fn list_servers(&self) -> Result<Vec<CloudServer>> {
        Ok(self.servers.clone())
    }

    async fn list_volume_attachments(&self, server_id: &str) -> Result<Vec<NovaVolumeAttachment>> {
        Ok(self.nova_attachments.get(server_id).cloned().unwrap_or_default())
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        Ok(self.load_balancers.clone())
    }

    async fn list_listeners(&self) -> Result<Vec<Listener>> {
        Ok(self.listeners.clone())
    }

    async fn list_pools(&self) -> Result<Vec<Pool>> {
        Ok(self.pools.clone())
    }

    async fn list_pool_members(&self, pool_id: &str) -> Result<Vec<Member>> {
        Ok(self.members.get(pool_id).cloned().unwrap_or_default())
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.monitors.clone())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        Ok(self.floating_ips.clone())
    }
}

/// Records every call; fails (after recording) the first call whose
/// description starts with `fail_on`
#[derive(Debug, Default)]
pub struct FakeActions {
    pub fail_on: Option<String>,
    pub log: Mutex<Vec<String>>,
}

impl FakeActions {
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<String> {
        let fail = self.fail_on.as_deref().is_some_and(|p| call.starts_with(p));
        if let Ok(mut log) = self.log.lock() {
            log.push(call.clone());
        }
        if fail {
            return Err(unavailable(&call));
        }
        Ok(format!("ok: {call}"))
    }
}

#[async_trait]
impl CloudActions for FakeActions {
    async fn attach_volume_cinder(&self, volume_id: &str, server_id: &str, mountpoint: &str) -> Result<String> {
        self.record(format!("cinder-attach {volume_id} {server_id} {mountpoint}"))
    }

    async fn detach_volume_cinder(&self, volume_id: &str, attachment_id: Option<&str>, force: bool) -> Result<String> {
        let force = if force { " force" } else { "" };
        self.record(format!(
            "cinder-detach {volume_id} {}{force}",
            attachment_id.unwrap_or("-")
        ))
    }

    async fn attach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String> {
        self.record(format!("nova-attach {volume_id} {server_id}"))
    }

    async fn detach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String> {
        self.record(format!("nova-detach {volume_id} {server_id}"))
    }
}
