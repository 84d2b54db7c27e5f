//! Reconciliation of Kubernetes and OpenStack inventories
//!
//! This crate provides the core functionality for:
//! - Selecting kubeconfig contexts and mapping them to OpenStack tenants
//! - Listing nodes, services, volumes and pods from Kubernetes
//! - Listing volumes, servers and load balancers from OpenStack
//! - Joining both views and flagging inconsistencies
//! - Rendering, filtering and exporting the resulting tables
//! - Attach/detach repair actions on volumes

pub mod config;
pub mod context;
pub mod error;
pub mod inventory;
pub mod kubernetes;
pub mod models;
pub mod openstack;
pub mod publish;
pub mod reconcile;
pub mod repair;
pub mod report;
pub mod table;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, CloudsFile, MattermostConfig, OpenStackCredentials};
pub use context::{resolve_contexts, tenant_of, ContextSelection};
pub use error::{Error, Result};
pub use inventory::{CloudActions, CloudSource, KubernetesSource};
pub use kubernetes::{KubeClusterClient, KubeContexts};
pub use openstack::OpenStackClient;
pub use publish::{parse_exporters, Exporter, FanOut, Publisher, Report};
pub use repair::{repair_volumes, RepairAction, RepairOutcome, RepairPlan, RepairStep};
pub use report::{run_report, Connection, Connector, ReportOptions, RunSummary};
pub use table::{Column, OutputFormat, ResourceKind, RowFilter};
