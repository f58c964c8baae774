//! workerimg - worker image provisioner.
//!
//! Builds a container image for the headless-browser data worker:
//! - OS packages from a pinned mirror
//! - Oracle Instant Client and OceanBase client, plus the cx_Oracle adapter
//! - Vendored Chrome and ChromeDriver behind stable aliases
//! - Pinned Python requirements
//!
//! The same binary runs on the host (`export`), inside the image build
//! (`provision`) and inside the running container (`health`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use workerimg::commands::{self, ProvisionArgs};
use workerimg::config::Config;

#[derive(Parser)]
#[command(name = "workerimg")]
#[command(about = "Worker image provisioner")]
#[command(
    after_help = "QUICK START:\n  workerimg preflight  Check artifacts and container engine\n  workerimg            Build and export the image\n  workerimg show steps Show the provisioning plan"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image and save it as a single file (default)
    Export {
        /// Provisioner binary to copy into the image (default: this binary)
        #[arg(long)]
        binary: Option<PathBuf>,
    },

    /// Run the provisioning pipeline (inside the image build)
    Provision {
        /// Provisioning root (default: /)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Directory holding the vendored archives
        #[arg(long)]
        vendor_dir: Option<PathBuf>,
        /// Pinned Python requirements file
        #[arg(long)]
        requirements: Option<PathBuf>,
    },

    /// Run preflight checks (artifacts and container engine)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Probe a running container (exit 1 when unhealthy)
    Health {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the generated Dockerfile
    Dockerfile,
    /// Show the exported environment
    Env,
    /// Show the provisioning steps
    Steps,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let base_dir = std::env::current_dir().context("Failed to read current directory")?;
    let config = Config::load(&base_dir);

    match cli.command.unwrap_or(Commands::Export { binary: None }) {
        Commands::Export { binary } => {
            let code = commands::cmd_export(&config, binary)?;
            std::process::exit(code);
        }

        Commands::Provision {
            root,
            vendor_dir,
            requirements,
        } => {
            commands::cmd_provision(
                &config,
                ProvisionArgs {
                    root,
                    vendor_dir,
                    requirements,
                },
            )?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Health { json } => {
            let code = commands::cmd_health(&config, json)?;
            std::process::exit(code);
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Dockerfile => commands::show::ShowTarget::Dockerfile,
                ShowTarget::Env => commands::show::ShowTarget::Env,
                ShowTarget::Steps => commands::show::ShowTarget::Steps,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
