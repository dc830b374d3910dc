//! `stevedore daemon` — foreground daemon lifecycle.
//!
//! The daemon shuts down on SIGTERM or ctrl-c, so there is no stop verb here;
//! process supervision (systemd or an interactive terminal) owns that side.

use anyhow::{Context, Result};
use clap::Subcommand;

use stevedore_daemon::start_blocking;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (engine supervisor + control socket).
    Start,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start => start_blocking().context("daemon exited with error"),
    }
}
