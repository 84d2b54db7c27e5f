use std::collections::{BTreeMap, BTreeSet};

use crate::inventory::LoadBalancerInventory;
use crate::models::{FloatingIp, Listener, LoadBalancer, Member, Monitor, Pool};
use crate::table::Column;

use super::{join_or_placeholder, notes_cell, or_placeholder, Anomaly, Notes, ReportRow};

/// Listeners of one load balancer, ordered by port
pub fn listeners_for<'a>(lb_id: &str, listeners: &'a BTreeMap<String, Listener>) -> Vec<&'a Listener> {
    let mut found: Vec<&Listener> = listeners
        .values()
        .filter(|l| l.loadbalancers.iter().any(|r| r.id == lb_id))
        .collect();
    found.sort_by(|a, b| a.protocol_port.cmp(&b.protocol_port).then_with(|| a.id.cmp(&b.id)));
    found
}

/// Invert each pool's listener list into listener id -> pools
pub fn pools_per_listener(pools: &BTreeMap<String, Pool>) -> BTreeMap<&str, Vec<&Pool>> {
    let mut per_listener: BTreeMap<&str, Vec<&Pool>> = BTreeMap::new();
    for pool in pools.values() {
        for listener in &pool.listeners {
            per_listener.entry(listener.id.as_str()).or_default().push(pool);
        }
    }
    per_listener
}

pub fn members_for_pool<'a>(pool_id: &str, members: &'a BTreeMap<String, Member>) -> Vec<&'a Member> {
    members.values().filter(|m| m.pool_id == pool_id).collect()
}

pub fn monitors_for_pool<'a>(pool_id: &str, monitors: &'a BTreeMap<String, Monitor>) -> Vec<&'a Monitor> {
    monitors
        .values()
        .filter(|m| m.pools.iter().any(|p| p.id == pool_id))
        .collect()
}

/// Floating IPs bound to the load balancer's VIP port
pub fn floating_ips_for<'a>(
    lb: &LoadBalancer,
    floating_ips: &'a BTreeMap<String, FloatingIp>,
) -> Vec<&'a FloatingIp> {
    floating_ips
        .values()
        .filter(|f| !lb.vip_port_id.is_empty() && f.port_id.as_deref() == Some(lb.vip_port_id.as_str()))
        .collect()
}

/// One listener of one load balancer
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerRow {
    pub cluster: String,
    pub lb_id: String,
    pub name: String,
    pub provisioning_status: String,
    pub vip_address: String,
    pub floating_ips: Vec<String>,
    pub listener_port: u16,
    /// Member protocol port -> `address:port` backends
    pub targets: BTreeMap<u16, Vec<String>>,
    /// `namespace/name` of the services owning the member ports
    pub services: Vec<String>,
    pub monitors: Vec<String>,
    pub notes: Notes,
}

impl LoadBalancerRow {
    /// `<listener port> => <address:port>,...`
    pub fn ports(&self) -> String {
        let backends: Vec<&str> = self.targets.values().flatten().map(String::as_str).collect();
        format!("{} => {}", self.listener_port, join_or_placeholder(backends))
    }
}

pub fn reconcile_load_balancers(cluster: &str, inventory: &LoadBalancerInventory) -> Vec<LoadBalancerRow> {
    let pools_by_listener = pools_per_listener(&inventory.pools);
    let mut rows = Vec::new();

    for lb in inventory.load_balancers.values() {
        let floating_ips: Vec<String> = floating_ips_for(lb, &inventory.floating_ips)
            .into_iter()
            .map(|f| f.floating_ip_address.clone())
            .collect();

        for listener in listeners_for(&lb.id, &inventory.listeners) {
            let pools = pools_by_listener
                .get(listener.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut targets: BTreeMap<u16, Vec<String>> = BTreeMap::new();
            let mut monitors = Vec::new();
            for pool in pools {
                for member in members_for_pool(&pool.id, &inventory.members) {
                    targets
                        .entry(member.protocol_port)
                        .or_default()
                        .push(format!("{}:{}", member.address, member.protocol_port));
                }
                for monitor in monitors_for_pool(&pool.id, &inventory.monitors) {
                    monitors.push(format!("{}/{}s", monitor.kind, monitor.delay));
                }
            }
            for backends in targets.values_mut() {
                backends.sort();
                backends.dedup();
            }

            let mut notes = Notes::default();
            if targets.is_empty() {
                notes.push(Anomaly::ListenerWithoutMembers);
            }

            let mut services = BTreeSet::new();
            for port in targets.keys() {
                match inventory.services.get(port) {
                    Some(service) => {
                        services.insert(service.qualified_name());
                    }
                    None => notes.push(Anomaly::NoServiceForPort(*port)),
                }
            }

            rows.push(LoadBalancerRow {
                cluster: cluster.to_string(),
                lb_id: lb.id.clone(),
                name: lb.name.clone(),
                provisioning_status: lb.provisioning_status.clone(),
                vip_address: lb.vip_address.clone(),
                floating_ips: floating_ips.clone(),
                listener_port: listener.protocol_port,
                targets,
                services: services.into_iter().collect(),
                monitors,
                notes,
            });
        }
    }

    rows
}

impl ReportRow for LoadBalancerRow {
    fn value(&self, column: Column) -> Option<String> {
        let value = match column {
            Column::Cluster => self.cluster.clone(),
            Column::Name => or_placeholder(self.name.clone()),
            Column::LbId => self.lb_id.clone(),
            Column::Status => or_placeholder(self.provisioning_status.clone()),
            Column::FloatingIps => join_or_placeholder(&self.floating_ips),
            Column::VipAddress => or_placeholder(self.vip_address.clone()),
            Column::Ports => self.ports(),
            Column::Services => join_or_placeholder(&self.services),
            Column::Monitors => join_or_placeholder(&self.monitors),
            Column::Note => notes_cell(&self.notes),
            _ => return None,
        };
        Some(value)
    }

    fn state(&self) -> &str {
        &self.provisioning_status
    }

    fn notes(&self) -> &Notes {
        &self.notes
    }
}
