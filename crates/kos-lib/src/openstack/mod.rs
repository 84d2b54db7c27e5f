//! OpenStack listing adapter and repair actions over the REST APIs
//!
//! Authenticates with keystone v3, then talks to cinder, nova and the
//! neutron lbaas v2 endpoints found in the service catalog.

mod auth;
mod client;

pub use auth::{authenticate, token_url, CatalogEntry, Endpoint, ServiceCatalog, Session};
pub use client::{service_url, OpenStackClient};
