//! Keystone v3 password authentication and service catalog lookup

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::OpenStackCredentials;
use crate::error::{error_body, Error, Result};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const DEFAULT_DOMAIN: &str = "Default";
const PUBLIC_INTERFACE: &str = "public";

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

/// Service catalog of an issued token
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Public endpoint of the first service type present, optionally
    /// restricted to a region
    pub fn endpoint(&self, service_types: &[&str], region: Option<&str>) -> Result<Url> {
        for service_type in service_types {
            let found = self
                .entries
                .iter()
                .filter(|e| e.service_type == *service_type)
                .flat_map(|e| e.endpoints.iter())
                .find(|e| {
                    e.interface == PUBLIC_INTERFACE
                        && region.map_or(true, |r| e.region.as_deref() == Some(r))
                });
            if let Some(endpoint) = found {
                return Ok(Url::parse(&endpoint.url)?);
            }
        }
        Err(Error::MissingEndpoint(service_types.join("|")))
    }
}

/// Authenticated token plus catalog
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub catalog: ServiceCatalog,
}

/// `<auth_url>/v3/auth/tokens`, tolerating auth URLs with or without a
/// version suffix
pub fn token_url(auth_url: &str) -> Result<Url> {
    let base = auth_url.trim_end_matches('/');
    let base = base.strip_suffix("/v2.0").unwrap_or(base);
    let base = if base.ends_with("/v3") {
        base.to_string()
    } else {
        format!("{base}/v3")
    };
    Ok(Url::parse(&format!("{base}/auth/tokens"))?)
}

fn auth_body(credentials: &OpenStackCredentials) -> serde_json::Value {
    let user_domain = credentials.user_domain_name.as_deref().unwrap_or(DEFAULT_DOMAIN);
    let project_domain = credentials
        .project_domain_name
        .as_deref()
        .unwrap_or(user_domain);

    let project = match &credentials.project_id {
        Some(id) => json!({ "id": id }),
        None => json!({
            "name": credentials.project_name,
            "domain": { "name": project_domain }
        }),
    };

    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": credentials.username,
                        "domain": { "name": user_domain },
                        "password": credentials.password
                    }
                }
            },
            "scope": { "project": project }
        }
    })
}

/// Request a project scoped token
pub async fn authenticate(http: &Client, credentials: &OpenStackCredentials) -> Result<Session> {
    let url = token_url(&credentials.auth_url)?;
    debug!(url = %url, user = %credentials.username, "Requesting keystone token");

    let response = http.post(url.clone()).json(&auth_body(credentials)).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = error_body(response.text().await, url.as_str());
        return Err(Error::Auth(format!("{status} from {url}: {body}")));
    }

    let token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::Auth(format!("no {SUBJECT_TOKEN_HEADER} header in response")))?;
    let body: TokenResponse = response.json().await?;

    info!(catalog_entries = body.token.catalog.len(), "Authenticated against keystone");

    Ok(Session {
        token,
        catalog: ServiceCatalog::new(body.token.catalog),
    })
}
