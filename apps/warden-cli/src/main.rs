//! # warden-cli
//!
//! Command-line interface for Warden.
//!
//! - `warden run` — run an agent's intended action through governance
//! - `warden review list/show/approve/reject/cancel` — resolve gated actions
//! - `warden audit verify/tail` — inspect the tamper-evident audit trail

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use warden_gateway::{GatewayState, WardenConfig};

/// Warden CLI — govern what agents may do.
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent's intended action.
    Run(commands::run::RunArgs),
    /// Inspect and resolve review requests.
    Review {
        #[command(subcommand)]
        command: commands::review::ReviewCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("warden_orchestrator=info".parse()?)
                .add_directive("warden_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = WardenConfig::load(&project_root)?;

    match &cli.command {
        Commands::Audit { command } => commands::audit::execute(command, &config),
        Commands::Run(args) => {
            let state = GatewayState::new(config)?;
            commands::run::execute(args, &state)
        }
        Commands::Review { command } => {
            let state = GatewayState::new(config)?;
            commands::review::execute(command, &state)
        }
    }
}
