//! Report exporters
//!
//! A rendered report is handed to every configured [`Publisher`]: stdout
//! and/or a Mattermost incoming webhook.

use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use tracing::{error, info};

use crate::config::MattermostConfig;
use crate::error::{error_body, Error, Result};
use crate::table::{OutputFormat, ResourceKind};

/// Exporter names accepted by `--exporter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exporter {
    Stdout,
    Mattermost,
}

impl FromStr for Exporter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "stdout" => Ok(Exporter::Stdout),
            "mm" => Ok(Exporter::Mattermost),
            other => Err(Error::UnknownExporter(other.to_string())),
        }
    }
}

/// Parse a comma-separated exporter list, keeping order and dropping repeats
pub fn parse_exporters(list: &str) -> Result<Vec<Exporter>> {
    let mut exporters = Vec::new();
    for name in list.split(',').filter(|s| !s.trim().is_empty()) {
        let exporter = name.parse()?;
        if !exporters.contains(&exporter) {
            exporters.push(exporter);
        }
    }
    if exporters.is_empty() {
        exporters.push(Exporter::Stdout);
    }
    Ok(exporters)
}

/// One rendered table for one context
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ResourceKind,
    pub context: String,
    pub tenant: String,
    pub format: OutputFormat,
    pub body: String,
}

/// Text posted to chat: a heading naming the tenant, then the table. Raw
/// tables are fenced so the alignment survives.
pub fn chat_message(report: &Report) -> String {
    let heading = format!("{} for {}:", report.kind.title(), report.tenant);
    match report.format {
        OutputFormat::Raw => format!("{heading}\n\n````\n{}````\n\n", report.body),
        OutputFormat::Markdown => format!("{heading}\n\n{}\n\n", report.body),
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Table header printed once before multi-context output
    async fn publish_header(&self, _header: &str) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, report: &Report) -> Result<()>;
}

/// Writes reports to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPublisher;

impl StdoutPublisher {
    fn write(text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish_header(&self, header: &str) -> Result<()> {
        Self::write(header)
    }

    async fn publish(&self, report: &Report) -> Result<()> {
        Self::write(&report.body)
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    text: &'a str,
}

/// Posts reports to a Mattermost incoming webhook
#[derive(Debug, Clone)]
pub struct MattermostPublisher {
    http: reqwest::Client,
    config: MattermostConfig,
}

impl MattermostPublisher {
    pub fn new(config: MattermostConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let payload = WebhookPayload {
            channel: &self.config.channel,
            username: &self.config.username,
            icon_url: self.config.icon_url.as_deref(),
            text,
        };

        let response = self.http.post(&self.config.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status,
                url: self.config.url.clone(),
                body: error_body(response.text().await, &self.config.url),
            });
        }

        info!(
            channel = %self.config.channel,
            sent_at = %chrono::Utc::now().to_rfc3339(),
            "Message sent to mattermost"
        );
        Ok(())
    }
}

#[async_trait]
impl Publisher for MattermostPublisher {
    async fn publish(&self, report: &Report) -> Result<()> {
        self.send(&chat_message(report)).await
    }
}

/// Hands every report to all its publishers. A failing publisher is logged
/// and does not stop the others.
#[derive(Default)]
pub struct FanOut {
    publishers: Vec<Box<dyn Publisher>>,
}

impl FanOut {
    pub fn new(publishers: Vec<Box<dyn Publisher>>) -> Self {
        Self { publishers }
    }

    /// Build the publishers named by `exporters`
    pub fn from_exporters(exporters: &[Exporter], mattermost: impl FnOnce() -> Result<MattermostConfig>) -> Result<Self> {
        let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
        let mut mattermost = Some(mattermost);
        for exporter in exporters {
            match exporter {
                Exporter::Stdout => publishers.push(Box::new(StdoutPublisher)),
                Exporter::Mattermost => {
                    if let Some(load) = mattermost.take() {
                        publishers.push(Box::new(MattermostPublisher::new(load()?)));
                    }
                }
            }
        }
        Ok(Self::new(publishers))
    }
}

#[async_trait]
impl Publisher for FanOut {
    async fn publish_header(&self, header: &str) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish_header(header).await?;
        }
        Ok(())
    }

    async fn publish(&self, report: &Report) -> Result<()> {
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(report).await {
                error!(context = %report.context, error = %e, "Failed to export report");
            }
        }
        Ok(())
    }
}
