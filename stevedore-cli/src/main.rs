//! Stevedore — container-backed service supervision CLI.
//!
//! # Usage
//!
//! ```text
//! stevedore install <service>
//! stevedore start <service>
//! stevedore stop <service>
//! stevedore load <service>
//! stevedore list [--json]
//! stevedore logs <service> [--lines N]
//! stevedore daemon start
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, list::ListArgs, logs::LogsArgs, service::ServiceArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stevedore",
    version,
    about = "Supervise container-backed services through the stevedore daemon",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a service and start it for the first time.
    Install(ServiceArgs),

    /// Start an installed service.
    Start(ServiceArgs),

    /// Stop a running service.
    Stop(ServiceArgs),

    /// Load a service definition into the running daemon.
    Load(ServiceArgs),

    /// List loaded services with status and resource usage.
    List(ListArgs),

    /// Print recent log output captured from a service's procedures.
    Logs(LogsArgs),

    /// Manage the stevedore background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Install(args) => commands::service::install(args),
        Commands::Start(args) => commands::service::start(args),
        Commands::Stop(args) => commands::service::stop(args),
        Commands::Load(args) => commands::service::load(args),
        Commands::List(args) => args.run(),
        Commands::Logs(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
