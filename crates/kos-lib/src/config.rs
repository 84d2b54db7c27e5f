//! Configuration
//!
//! Everything is read once at startup into an [`AppConfig`] and passed down
//! explicitly:
//! - `OPENSTACK_CONFIG_FILE`: path of a `clouds.yaml` style credentials file
//! - `OS_*`: credentials used when no credentials file is configured
//! - `KUBECTL_OS_MATTERMOST_*`: chat exporter settings

use config::{Config, Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Suffix of the shell rc files `import-config` reads
pub const RC_FILE_SUFFIX: &str = ".creds";

/// Resolved credentials for one tenant
#[derive(Clone, Default, PartialEq)]
pub struct OpenStackCredentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub region: Option<String>,
}

impl fmt::Debug for OpenStackCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenStackCredentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("project_name", &self.project_name)
            .field("project_id", &self.project_id)
            .field("user_domain_name", &self.user_domain_name)
            .field("region", &self.region)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl OpenStackCredentials {
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::config("missing required username"));
        }
        if self.password.is_empty() {
            return Err(Error::config("missing required password"));
        }
        if self.auth_url.is_empty() {
            return Err(Error::config("missing required auth url"));
        }
        if self.project_name.is_none() && self.project_id.is_none() {
            return Err(Error::config("missing required project name or project id"));
        }
        Ok(())
    }
}

/// `clouds.yaml` layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: BTreeMap<String, CloudEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudEntry {
    pub auth: CloudAuth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudAuth {
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_domain_name: Option<String>,
}

impl CloudsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml).required(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Look a cloud up by name, falling back to a case-insensitive match
    pub fn cloud(&self, name: &str) -> Option<&CloudEntry> {
        self.clouds.get(name).or_else(|| {
            self.clouds
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

impl From<&CloudEntry> for OpenStackCredentials {
    fn from(entry: &CloudEntry) -> Self {
        let auth = &entry.auth;
        let domain = non_empty(auth.domain_name.clone());
        Self {
            auth_url: auth.auth_url.clone(),
            username: auth.username.clone(),
            password: auth.password.clone(),
            project_name: non_empty(auth.project_name.clone()),
            project_id: non_empty(auth.project_id.clone()),
            user_domain_name: non_empty(auth.user_domain_name.clone()).or_else(|| domain.clone()),
            project_domain_name: non_empty(auth.project_domain_name.clone()).or(domain),
            region: non_empty(entry.region_name.clone()),
        }
    }
}

/// `OS_*` variables, as an `openrc` file exports them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvCredentials {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub project_name: Option<String>,
    pub tenant_name: Option<String>,
    pub project_id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub domain_name: Option<String>,
    pub region_name: Option<String>,
}

impl From<&EnvCredentials> for OpenStackCredentials {
    fn from(env: &EnvCredentials) -> Self {
        let domain = non_empty(env.domain_name.clone());
        Self {
            auth_url: env.auth_url.clone().unwrap_or_default(),
            username: env.username.clone().unwrap_or_default(),
            password: env.password.clone().unwrap_or_default(),
            project_name: non_empty(env.project_name.clone()).or_else(|| non_empty(env.tenant_name.clone())),
            project_id: non_empty(env.project_id.clone()).or_else(|| non_empty(env.tenant_id.clone())),
            user_domain_name: non_empty(env.user_domain_name.clone()).or_else(|| domain.clone()),
            project_domain_name: non_empty(env.project_domain_name.clone()).or(domain),
            region: non_empty(env.region_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OpenStackSettings {
    config_file: Option<PathBuf>,
}

/// `KUBECTL_OS_MATTERMOST_*` variables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MattermostSettings {
    pub mattermost_url: Option<String>,
    pub mattermost_channel: Option<String>,
    pub mattermost_username: Option<String>,
    pub mattermost_icon_url: Option<String>,
}

/// Settings of the Mattermost exporter
#[derive(Debug, Clone, PartialEq)]
pub struct MattermostConfig {
    pub url: String,
    pub channel: String,
    pub username: String,
    pub icon_url: Option<String>,
}

/// Configuration read from the environment at startup
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub openstack_config_file: Option<PathBuf>,
    pub env_credentials: EnvCredentials,
    pub mattermost: MattermostSettings,
}

impl AppConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_source(None)
    }

    /// Load from `vars` instead of the process environment when given
    pub fn from_source(vars: Option<config::Map<String, String>>) -> Result<Self> {
        fn read<T: serde::de::DeserializeOwned>(
            prefix: &str,
            vars: &Option<config::Map<String, String>>,
        ) -> Result<T> {
            let settings = Config::builder()
                .add_source(Environment::with_prefix(prefix).source(vars.clone()))
                .build()?;
            Ok(settings.try_deserialize()?)
        }

        let openstack: OpenStackSettings = read("OPENSTACK", &vars)?;
        let config = Self {
            openstack_config_file: openstack
                .config_file
                .filter(|p| !p.as_os_str().is_empty()),
            env_credentials: read("OS", &vars)?,
            mattermost: read("KUBECTL_OS", &vars)?,
        };
        debug!(
            credentials_file = ?config.openstack_config_file,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Credentials for `tenant`: from the credentials file when one is
    /// configured, otherwise from the `OS_*` variables
    pub fn credentials_for(&self, tenant: &str) -> Result<OpenStackCredentials> {
        let credentials = match &self.openstack_config_file {
            Some(path) => {
                let clouds = CloudsFile::load(path)?;
                let entry = clouds.cloud(tenant).ok_or_else(|| {
                    Error::config(format!("no cloud {tenant:?} in {}", path.display()))
                })?;
                OpenStackCredentials::from(entry)
            }
            None => OpenStackCredentials::from(&self.env_credentials),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Settings for the `mm` exporter
    pub fn mattermost(&self) -> Result<MattermostConfig> {
        let settings = &self.mattermost;
        let required = |value: &Option<String>, var: &str| {
            non_empty(value.clone())
                .ok_or_else(|| Error::config(format!("env var {var} must be set for the mm exporter")))
        };
        Ok(MattermostConfig {
            url: required(&settings.mattermost_url, "KUBECTL_OS_MATTERMOST_URL")?,
            channel: required(&settings.mattermost_channel, "KUBECTL_OS_MATTERMOST_CHANNEL")?,
            username: required(&settings.mattermost_username, "KUBECTL_OS_MATTERMOST_USERNAME")?,
            icon_url: non_empty(settings.mattermost_icon_url.clone()),
        })
    }
}

struct RcPatterns {
    username: Regex,
    password: Regex,
    tenant_name: Regex,
    auth_url: Regex,
}

impl RcPatterns {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::config(format!("invalid pattern {pattern}: {e}")))
        };
        Ok(Self {
            username: compile(r#"OS_USERNAME=['"]([^'"\n]*)['"]"#)?,
            password: compile(r#"OS_PASSWORD=['"]([^'"\n]*)['"]"#)?,
            tenant_name: compile(r#"OS_TENANT_NAME=['"]([^'"\n]*)['"]"#)?,
            auth_url: compile(r#"OS_AUTH_URL=['"]([^'"\n]*)['"]"#)?,
        })
    }

    fn capture(regex: &Regex, content: &str, what: &str, file: &Path) -> Result<String> {
        regex
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::config(format!("no {what} found in {}", file.display())))
    }
}

/// Build a credentials file from every `*.creds` rc file in `dir`. Clouds
/// are named after the tenant.
pub fn import_rc_dir(dir: &Path) -> Result<CloudsFile> {
    let patterns = RcPatterns::new()?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(RC_FILE_SUFFIX))
        })
        .collect();
    files.sort();

    let mut clouds = CloudsFile::default();
    for file in files {
        info!(file = %file.display(), "Importing config");
        let content = std::fs::read_to_string(&file)?;

        let tenant = RcPatterns::capture(&patterns.tenant_name, &content, "OS_TENANT_NAME", &file)?;
        let auth = CloudAuth {
            auth_url: RcPatterns::capture(&patterns.auth_url, &content, "OS_AUTH_URL", &file)?,
            username: RcPatterns::capture(&patterns.username, &content, "OS_USERNAME", &file)?,
            password: RcPatterns::capture(&patterns.password, &content, "OS_PASSWORD", &file)?,
            project_name: Some(tenant.clone()),
            ..Default::default()
        };
        clouds.clouds.insert(
            tenant,
            CloudEntry {
                auth,
                region_name: None,
            },
        );
    }

    Ok(clouds)
}
