//! `ovirtctl` entry point.
//!
//! Connection settings come from an optional TOML file (`--config`) and
//! `OVIRT_*` environment variables. Results are printed to stdout as JSON,
//! logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ovirt_client::{
    Client, ClientConfig, RetryStrategy, VmId, VmSearchParams, VmStatus,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ovirtctl", version, about = "Manage oVirt VMs, templates and tags")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(long, env = "OVIRT_CONFIG")]
    config: Option<PathBuf>,

    /// Give up on each call after this many seconds instead of the configured budget.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Virtual machine operations.
    #[command(subcommand)]
    Vm(VmCommand),
    /// Template operations.
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Tag operations.
    #[command(subcommand)]
    Tag(TagCommand),
}

#[derive(Subcommand, Debug)]
enum VmCommand {
    /// List VMs, optionally filtered.
    List {
        /// Exact VM name.
        #[arg(long)]
        name: Option<String>,
        /// Name of a tag the VM carries.
        #[arg(long)]
        tag: Option<String>,
        /// Only VMs in this status. May be repeated.
        #[arg(long)]
        status: Vec<VmStatus>,
        /// Skip VMs in this status. May be repeated.
        #[arg(long)]
        not_status: Vec<VmStatus>,
    },
    /// Show one VM.
    Get { id: String },
    /// Start a VM.
    Start {
        id: String,
        /// Wait until the VM is up.
        #[arg(long)]
        wait: bool,
    },
    /// Power off a VM.
    Stop {
        id: String,
        #[arg(long)]
        force: bool,
        /// Wait until the VM is down.
        #[arg(long)]
        wait: bool,
    },
    /// Shut down the guest OS.
    Shutdown {
        id: String,
        #[arg(long)]
        force: bool,
        /// Wait until the VM is down.
        #[arg(long)]
        wait: bool,
    },
    /// Remove a VM. Removing a VM that does not exist is not an error.
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// List templates.
    List,
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    /// List tags.
    List,
}

#[derive(Serialize)]
struct ActionResult<'a> {
    id: &'a str,
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<VmStatus>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_vm(
    client: &Client,
    retries: &[RetryStrategy],
    command: VmCommand,
) -> anyhow::Result<()> {
    match command {
        VmCommand::List {
            name,
            tag,
            status,
            not_status,
        } => {
            let params = VmSearchParams::new();
            if let Some(name) = name {
                params.with_name(name);
            }
            if let Some(tag) = tag {
                params.with_tag(tag);
            }
            if !status.is_empty() {
                params.with_statuses(&status);
            }
            if !not_status.is_empty() {
                params.with_not_statuses(&not_status);
            }
            let vms = client.search_vms(&params, retries).await?;
            print_json(&vms)
        }
        VmCommand::Get { id } => {
            let vm = client.get_vm(&VmId::from(id), retries).await?;
            print_json(&vm)
        }
        VmCommand::Start { id, wait } => {
            let vm_id = VmId::from(id.as_str());
            client.start_vm(&vm_id, retries).await?;
            let status = if wait {
                let vm = client.wait_for_vm_status(&vm_id, VmStatus::Up, retries).await?;
                Some(vm.status())
            } else {
                None
            };
            print_json(&ActionResult { id: &id, action: "start", status })
        }
        VmCommand::Stop { id, force, wait } => {
            let vm_id = VmId::from(id.as_str());
            client.stop_vm(&vm_id, force, retries).await?;
            let status = if wait {
                let vm = client.wait_for_vm_status(&vm_id, VmStatus::Down, retries).await?;
                Some(vm.status())
            } else {
                None
            };
            print_json(&ActionResult { id: &id, action: "stop", status })
        }
        VmCommand::Shutdown { id, force, wait } => {
            let vm_id = VmId::from(id.as_str());
            client.shutdown_vm(&vm_id, force, retries).await?;
            let status = if wait {
                let vm = client.wait_for_vm_status(&vm_id, VmStatus::Down, retries).await?;
                Some(vm.status())
            } else {
                None
            };
            print_json(&ActionResult { id: &id, action: "shutdown", status })
        }
        VmCommand::Remove { id } => {
            let vm_id = VmId::from(id.as_str());
            match client.remove_vm(&vm_id, retries).await {
                Err(e) if e.is_not_found() => {
                    tracing::warn!(vm_id = %vm_id, "VM does not exist");
                }
                other => other?,
            }
            print_json(&ActionResult {
                id: &id,
                action: "remove",
                status: None,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the JSON output
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("ovirt_client=info".parse()?)
                .add_directive("ovirtctl=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config =
        ClientConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let client = Client::connect(&config).context("Failed to create client")?;

    let mut retries = Vec::new();
    if let Some(secs) = args.timeout_secs {
        retries.push(RetryStrategy::Timeout(Duration::from_secs(secs)));
    }

    match args.command {
        Command::Vm(command) => run_vm(&client, &retries, command).await,
        Command::Template(TemplateCommand::List) => {
            let templates = client.list_templates(&retries).await?;
            print_json(&templates)
        }
        Command::Tag(TagCommand::List) => {
            let tags = client.list_tags(&retries).await?;
            print_json(&tags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_vm_list_filters() {
        let args = Args::parse_from([
            "ovirtctl", "vm", "list", "--tag", "web", "--status", "up", "--status", "paused",
        ]);
        match args.command {
            Command::Vm(VmCommand::List { tag, status, .. }) => {
                assert_eq!(tag.as_deref(), Some("web"));
                assert_eq!(status, [VmStatus::Up, VmStatus::Paused]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_status_rejected() {
        let result = Args::try_parse_from(["ovirtctl", "vm", "list", "--status", "running"]);
        assert!(result.is_err());
    }
}
