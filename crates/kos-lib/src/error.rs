//! Error types shared by the listing adapters, the renderer and the repair actions

use reqwest::StatusCode;
use tracing::warn;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the library.
///
/// Data-shape problems found while joining inventories are never errors; they
/// become row notes in [`crate::reconcile`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load configuration: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("kubernetes API error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("no context is currently set, use \"kubectl config use-context <context>\" to select one")]
    NoContext,

    #[error("openstack authentication failed: {0}")]
    Auth(String),

    #[error("no {0} endpoint in the openstack service catalog")]
    MissingEndpoint(String),

    #[error("openstack API error ({status}) on {url}: {body}")]
    Api {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown column {column:?}, available columns: {available}")]
    UnknownColumn { column: String, available: String },

    #[error("unknown output: {0}")]
    UnknownOutputFormat(String),

    #[error("unknown exporter: {0}")]
    UnknownExporter(String),

    #[error("could not find {kind} with id or name: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("found multiple contexts: {0:?}")]
    AmbiguousContext(Vec<String>),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Body of a failed HTTP call. A body that cannot be read is logged and
/// replaced by the read error.
pub(crate) fn error_body<E: std::fmt::Display>(body: std::result::Result<String, E>, url: &str) -> String {
    body.unwrap_or_else(|e| {
        warn!(url = %url, error = %e, "Failed to read error response body");
        format!("<unreadable response body: {e}>")
    })
}
