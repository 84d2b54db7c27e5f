//! Report runner
//!
//! Drives one report kind over the selected contexts: connect, fetch,
//! reconcile, filter, render and publish. With a single context any failure
//! is fatal. With several, each context gets its own outcome and the run
//! continues past failures.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::context::{tenant_of, ContextSelection};
use crate::error::{Error, Result};
use crate::inventory::{
    CloudSource, KubernetesSource, LoadBalancerInventory, ServerInventory, VolumeInventory,
};
use crate::publish::{Publisher, Report};
use crate::reconcile::{reconcile_load_balancers, reconcile_servers, reconcile_volumes};
use crate::table::{header, project, Column, OutputFormat, ResourceKind, RowFilter, Table};

/// Listing sources of one context
pub struct Connection {
    pub tenant: String,
    pub kubernetes: Box<dyn KubernetesSource>,
    pub cloud: Box<dyn CloudSource>,
}

/// Opens the sources of a context
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, context: &str) -> Result<Connection>;
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub kind: ResourceKind,
    pub columns: Vec<Column>,
    pub filter: RowFilter,
    pub format: OutputFormat,
    pub no_headers: bool,
}

impl ReportOptions {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            columns: kind.default_columns().to_vec(),
            filter: RowFilter::default(),
            format: OutputFormat::default(),
            no_headers: false,
        }
    }

    /// The header alone, rendered in the report format
    pub fn header_table(&self) -> String {
        Table::new(Some(header(&self.columns)), Vec::new(), self.format).render()
    }
}

/// Result of processing one context
#[derive(Debug)]
pub struct ContextOutcome {
    pub context: String,
    /// Whether a non-empty report was published
    pub result: Result<bool>,
}

impl ContextOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<ContextOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &ContextOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Fetch, reconcile and render one context. `None` when no row survives the
/// filters.
pub async fn build_report(
    context: &str,
    connection: &Connection,
    options: &ReportOptions,
    with_header: bool,
) -> Result<Option<Report>> {
    let kube = connection.kubernetes.as_ref();
    let cloud = connection.cloud.as_ref();

    let lines = match options.kind {
        ResourceKind::Volume => {
            let inventory = VolumeInventory::fetch(kube, cloud).await?;
            project(&reconcile_volumes(context, &inventory), &options.columns, &options.filter)
        }
        ResourceKind::Server => {
            let inventory = ServerInventory::fetch(kube, cloud).await?;
            project(&reconcile_servers(context, &inventory), &options.columns, &options.filter)
        }
        ResourceKind::LoadBalancer => {
            let inventory = LoadBalancerInventory::fetch(kube, cloud).await?;
            project(
                &reconcile_load_balancers(context, &inventory),
                &options.columns,
                &options.filter,
            )
        }
    };

    if lines.is_empty() {
        info!(context = %context, "No rows to report");
        return Ok(None);
    }

    let header_line = with_header.then(|| header(&options.columns));
    let body = Table::new(header_line, lines, options.format)
        .sorted_by(options.kind.sort_indices())
        .render();

    Ok(Some(Report {
        kind: options.kind,
        context: context.to_string(),
        tenant: connection.tenant.clone(),
        format: options.format,
        body,
    }))
}

async fn process_context(
    context: &str,
    connector: &dyn Connector,
    publisher: &dyn Publisher,
    options: &ReportOptions,
    with_header: bool,
) -> Result<bool> {
    let connection = connector.connect(context).await?;
    match build_report(context, &connection, options, with_header).await? {
        Some(report) => {
            publisher.publish(&report).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Run the report over every selected context
pub async fn run_report(
    selection: &ContextSelection,
    connector: &dyn Connector,
    publisher: &dyn Publisher,
    options: &ReportOptions,
) -> Result<RunSummary> {
    if let Some(context) = selection.single() {
        let result = process_context(context, connector, publisher, options, !options.no_headers).await?;
        return Ok(RunSummary {
            outcomes: vec![ContextOutcome {
                context: context.to_string(),
                result: Ok(result),
            }],
        });
    }

    if selection.is_empty() {
        return Err(Error::NoContext);
    }

    if !options.no_headers {
        publisher.publish_header(&options.header_table()).await?;
    }

    let mut summary = RunSummary::default();
    for context in &selection.contexts {
        let result = process_context(context, connector, publisher, options, false).await;
        if let Err(e) = &result {
            error!(context = %context, tenant = %tenant_of(context), error = %e, "Failed to process context");
        }
        summary.outcomes.push(ContextOutcome {
            context: context.clone(),
            result,
        });
    }

    let failed = summary.failed().count();
    if failed > 0 {
        warn!(failed, total = summary.outcomes.len(), "Some contexts failed");
    } else {
        info!(total = summary.outcomes.len(), "All contexts processed");
    }

    Ok(summary)
}
