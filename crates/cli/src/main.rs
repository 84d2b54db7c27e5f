//! kubectl-os
//!
//! A kubectl plugin comparing what Kubernetes believes about nodes, volumes
//! and load balancers with what OpenStack reports, and offering explicit
//! repair actions for volume attachments.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use kos_lib::table::join_columns;
use kos_lib::{OutputFormat, RepairPlan, ResourceKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{import_config, report, volumes_fix, Target};

/// Compare Kubernetes and OpenStack state
#[derive(Parser)]
#[command(name = "kubectl-os")]
#[command(author, version, about = "Compare Kubernetes and OpenStack state", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (KUBECONFIG or ~/.kube/config if not specified)
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Comma-separated regular expressions matched against context names
    /// (current context if empty)
    #[arg(long, short = 'c', default_value = "", global = true)]
    pub context: String,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare PersistentVolumes with cinder volumes and nova attachments
    #[command(visible_alias = "vs")]
    Volumes {
        /// Comma-separated namespaces to keep (empty keeps all)
        #[arg(long, short = 'n', default_value = "")]
        namespaces: String,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Compare nodes with nova servers
    #[command(visible_alias = "srv")]
    Server {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Compare LoadBalancer services with octavia load balancers
    Lb {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Attach or detach volumes through cinder and nova
    #[command(name = "volumes-fix", visible_alias = "vsf")]
    VolumesFix {
        /// Volume ids or names
        #[arg(required = true)]
        volumes: Vec<String>,

        /// Attach through cinder to this server (id or name)
        #[arg(long)]
        attach_cinder: Option<String>,

        /// Mountpoint for --attach-cinder
        #[arg(long)]
        attach_cinder_mountpoint: Option<String>,

        /// Attach through nova to this server (id or name)
        #[arg(long)]
        attach_nova: Option<String>,

        /// Detach through cinder
        #[arg(long)]
        detach_cinder: bool,

        /// Use force-detach for --detach-cinder
        #[arg(long, short)]
        force: bool,

        /// Detach through nova from every server listing the volume
        #[arg(long)]
        detach_nova: bool,
    },

    /// Write the credentials file from a directory of *.creds rc files
    #[command(name = "import-config", visible_alias = "rc")]
    ImportConfig {
        /// Directory holding the rc files
        #[arg(long, default_value = ".")]
        from_dir: String,
    },
}

/// Flags shared by the report commands
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Comma-separated states to keep (empty keeps all)
    #[arg(long, short = 's', default_value = "")]
    pub states: String,

    /// Comma-separated columns, or DEBUG
    #[arg(long, default_value = "")]
    pub columns: String,

    /// Show the debug column set
    #[arg(long)]
    pub debug: bool,

    /// Only rows with notes
    #[arg(long)]
    pub only_broken: bool,

    /// Do not print the table header
    #[arg(long)]
    pub no_headers: bool,

    /// Output format: raw or markdown
    #[arg(long, short = 'o', default_value = "markdown", value_parser = parse_output)]
    pub output: OutputFormat,

    /// Comma-separated exporters: stdout, mm
    #[arg(long, short = 'e', default_value = "stdout")]
    pub exporter: String,

    /// Exit non-zero when any matched context failed
    #[arg(long)]
    pub fail_on_context_error: bool,
}

fn parse_output(value: &str) -> std::result::Result<OutputFormat, String> {
    value.parse().map_err(|e: kos_lib::Error| e.to_string())
}

/// Lists the column vocabulary of each report command in its help
fn command() -> clap::Command {
    let columns_help = |kind: ResourceKind| {
        format!(
            "Available columns: {}\nDefault columns: {}",
            join_columns(kind.columns()),
            join_columns(kind.default_columns())
        )
    };
    Cli::command()
        .mut_subcommand("volumes", |c| c.after_help(columns_help(ResourceKind::Volume)))
        .mut_subcommand("server", |c| c.after_help(columns_help(ResourceKind::Server)))
        .mut_subcommand("lb", |c| c.after_help(columns_help(ResourceKind::LoadBalancer)))
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let layer = fmt::layer().with_writer(std::io::stderr);
    let layer = if json { layer.json().boxed() } else { layer.boxed() };

    tracing_subscriber::registry().with(filter).with(layer).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_arg_matches(&command().get_matches()).unwrap_or_else(|e| e.exit());
    init_tracing(cli.verbose, cli.log_json);

    let target = Target {
        kubeconfig: cli.kubeconfig.as_deref(),
        selector: &cli.context,
    };

    match cli.command {
        Commands::Volumes { namespaces, report } => {
            report::run(&target, ResourceKind::Volume, &report, &namespaces).await?;
        }
        Commands::Server { report } => {
            report::run(&target, ResourceKind::Server, &report, "").await?;
        }
        Commands::Lb { report } => {
            report::run(&target, ResourceKind::LoadBalancer, &report, "").await?;
        }
        Commands::VolumesFix {
            volumes,
            attach_cinder,
            attach_cinder_mountpoint,
            attach_nova,
            detach_cinder,
            force,
            detach_nova,
        } => {
            let plan = RepairPlan {
                attach_cinder,
                attach_cinder_mountpoint,
                attach_nova,
                detach_cinder,
                force,
                detach_nova,
            };
            volumes_fix::run(&target, &volumes, &plan).await?;
        }
        Commands::ImportConfig { from_dir } => {
            import_config::run(&from_dir)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::from_arg_matches(&command().get_matches_from(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn test_report_defaults() {
        let cli = parse(&["kubectl-os", "vs"]);
        match cli.command {
            Commands::Volumes { namespaces, report } => {
                assert!(namespaces.is_empty());
                assert_eq!(report.output, OutputFormat::Markdown);
                assert_eq!(report.exporter, "stdout");
                assert!(!report.fail_on_context_error);
            }
            _ => panic!("expected volumes"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["kubectl-os", "lb", "-o", "raw", "--context", "p1-.*", "-v"]);
        assert_eq!(cli.context, "p1-.*");
        assert!(cli.verbose);
        match cli.command {
            Commands::Lb { report } => assert_eq!(report.output, OutputFormat::Raw),
            _ => panic!("expected lb"),
        }
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let result = command().try_get_matches_from(["kubectl-os", "srv", "-o", "json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_volumes_fix_flags() {
        let cli = parse(&[
            "kubectl-os",
            "vsf",
            "data",
            "--detach-cinder",
            "-f",
            "--detach-nova",
        ]);
        match cli.command {
            Commands::VolumesFix {
                volumes,
                detach_cinder,
                force,
                detach_nova,
                attach_cinder,
                ..
            } => {
                assert_eq!(volumes, vec!["data".to_string()]);
                assert!(detach_cinder && force && detach_nova);
                assert!(attach_cinder.is_none());
            }
            _ => panic!("expected volumes-fix"),
        }
    }
}
