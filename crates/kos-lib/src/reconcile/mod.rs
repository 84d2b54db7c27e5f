//! Reconciliation engine
//!
//! Joins a Kubernetes inventory with an OpenStack inventory and produces one
//! typed row per reported entity:
//! - Volumes: cinder volume x persistent volume x pod x nova attachments
//! - Servers: nova server x Kubernetes node
//! - Load balancers: octavia listener x pool members x node-port services
//!
//! Rows carry the anomalies found while joining as [`Notes`]. The engine never
//! fails on inconsistent data, it only annotates it.

mod anomaly;
mod loadbalancer;
mod server;
mod volume;


pub use anomaly::{Anomaly, Notes};
pub use loadbalancer::{
    floating_ips_for, listeners_for, members_for_pool, monitors_for_pool, pools_per_listener,
    reconcile_load_balancers, LoadBalancerRow,
};
pub use server::{reconcile_servers, ServerRow};
pub use volume::{reconcile_volumes, AttachedServer, NovaServerAttachment, PodRef, VolumeRow};

use crate::models::PLACEHOLDER;
use crate::table::Column;

/// A reconciled row the projector can turn into table cells
pub trait ReportRow {
    /// Cell value for `column`, `None` when the column does not apply to
    /// this kind of row
    fn value(&self, column: Column) -> Option<String>;

    /// Status matched by `--states`
    fn state(&self) -> &str;

    /// Namespace matched by `--namespaces`, `None` when the row has none
    fn namespace(&self) -> Option<&str> {
        None
    }

    fn notes(&self) -> &Notes;

    fn is_broken(&self) -> bool {
        !self.notes().is_empty()
    }
}

/// Join display values with `,`, or the placeholder when there are none
pub(crate) fn join_or_placeholder<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = values
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    or_placeholder(joined)
}

pub(crate) fn or_placeholder(value: impl Into<String>) -> String {
    let value = value.into();
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value
    }
}

pub(crate) fn notes_cell(notes: &Notes) -> String {
    or_placeholder(notes.to_string())
}
