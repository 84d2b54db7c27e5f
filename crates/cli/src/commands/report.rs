//! Volume, server and load balancer reports

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use kos_lib::table::DEBUG_PRESET;
use kos_lib::{
    parse_exporters, run_report, tenant_of, AppConfig, Connection, Connector, FanOut,
    KubeContexts, OpenStackClient, ReportOptions, ResourceKind, RowFilter,
};
use tracing::info;

use super::Target;
use crate::ReportArgs;

/// Opens a Kubernetes client for the context and an OpenStack session for
/// its tenant
struct CliConnector<'a> {
    contexts: &'a KubeContexts,
    config: &'a AppConfig,
}

#[async_trait]
impl<'a> Connector for CliConnector<'a> {
    async fn connect(&self, context: &str) -> kos_lib::Result<Connection> {
        let tenant = tenant_of(context).to_string();
        info!(context = %context, tenant = %tenant, "Connecting");

        let kubernetes = self.contexts.client(context).await?;
        let credentials = self.config.credentials_for(&tenant)?;
        let cloud = OpenStackClient::connect(&credentials).await?;

        Ok(Connection {
            tenant,
            kubernetes: Box::new(kubernetes),
            cloud: Box::new(cloud),
        })
    }
}

/// Turn the command-line flags into report options
pub fn report_options(kind: ResourceKind, args: &ReportArgs, namespaces: &str) -> Result<ReportOptions> {
    let columns = if args.debug {
        kind.parse_columns(DEBUG_PRESET)?
    } else {
        kind.parse_columns(&args.columns)?
    };

    Ok(ReportOptions {
        kind,
        columns,
        filter: RowFilter::new(&args.states, namespaces, args.only_broken),
        format: args.output,
        no_headers: args.no_headers,
    })
}

pub async fn run(target: &Target<'_>, kind: ResourceKind, args: &ReportArgs, namespaces: &str) -> Result<()> {
    let options = report_options(kind, args, namespaces)?;
    let exporters = parse_exporters(&args.exporter)?;
    let config = AppConfig::load().context("Failed to load configuration")?;
    let publisher = FanOut::from_exporters(&exporters, || config.mattermost())?;

    let contexts = target.contexts()?;
    let selection = target.select(&contexts)?;
    let connector = CliConnector {
        contexts: &contexts,
        config: &config,
    };

    let summary = run_report(&selection, &connector, &publisher, &options).await?;

    if args.fail_on_context_error && summary.has_failures() {
        let failed: Vec<&str> = summary.failed().map(|o| o.context.as_str()).collect();
        bail!("Failed to process contexts: {}", failed.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kos_lib::{Column, OutputFormat};

    fn args() -> ReportArgs {
        ReportArgs {
            states: String::new(),
            columns: String::new(),
            debug: false,
            only_broken: false,
            no_headers: false,
            output: OutputFormat::Markdown,
            exporter: "stdout".to_string(),
            fail_on_context_error: false,
        }
    }

    #[test]
    fn test_default_columns() {
        let options = report_options(ResourceKind::Server, &args(), "").unwrap();
        assert_eq!(options.columns, ResourceKind::Server.default_columns());
    }

    #[test]
    fn test_debug_flag_selects_debug_columns() {
        let args = ReportArgs {
            debug: true,
            columns: "CLUSTER".to_string(),
            ..args()
        };
        let options = report_options(ResourceKind::Volume, &args, "").unwrap();
        assert_eq!(options.columns, ResourceKind::Volume.debug_columns());
    }

    #[test]
    fn test_explicit_columns() {
        let args = ReportArgs {
            columns: "CLUSTER,NOTE".to_string(),
            ..args()
        };
        let options = report_options(ResourceKind::LoadBalancer, &args, "").unwrap();
        assert_eq!(options.columns, vec![Column::Cluster, Column::Note]);
    }

    #[test]
    fn test_unknown_column() {
        let args = ReportArgs {
            columns: "CLUSTER,COLOR".to_string(),
            ..args()
        };
        let err = report_options(ResourceKind::Server, &args, "").unwrap_err();
        assert!(err.to_string().contains("COLOR"));
    }
}
