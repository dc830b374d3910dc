//! `stevedore install|start|stop|load` — single-service lifecycle verbs.
//!
//! Each verb is a thin wrapper over one control-protocol command: serialize,
//! send over the daemon socket, then print the daemon's reply. The daemon does
//! all validation; the CLI only relays its verdict.

use anyhow::{bail, Context, Result};
use clap::Args;

use stevedore_core::ServiceId;
use stevedore_daemon::paths::control_socket;
use stevedore_daemon::{send_command, Command, Reply};

/// Shared positional argument for the lifecycle verbs.
#[derive(Args, Debug)]
pub struct ServiceArgs {
    /// Service identifier (the name of its directory under the services root).
    pub service: String,
}

impl ServiceArgs {
    fn service_id(&self) -> ServiceId {
        ServiceId::from(self.service.as_str())
    }
}

pub fn install(args: ServiceArgs) -> Result<()> {
    roundtrip(Command::Install {
        service: args.service_id(),
    })
}

pub fn start(args: ServiceArgs) -> Result<()> {
    roundtrip(Command::Start {
        service: args.service_id(),
    })
}

pub fn stop(args: ServiceArgs) -> Result<()> {
    roundtrip(Command::Stop {
        service: args.service_id(),
    })
}

pub fn load(args: ServiceArgs) -> Result<()> {
    roundtrip(Command::Load {
        service: args.service_id(),
    })
}

/// Send one command and translate the reply envelope into process output.
fn roundtrip(command: Command) -> Result<()> {
    let socket = control_socket();
    let reply =
        send_command(&socket, &command).context("failed to reach the stevedore daemon")?;

    match reply {
        Reply::Info { info } => {
            println!("{info}");
            Ok(())
        }
        Reply::Error { error } => bail!(error),
        Reply::Services(_) => bail!("unexpected reply from daemon"),
    }
}
