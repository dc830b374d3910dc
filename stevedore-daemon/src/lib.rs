//! The stevedore daemon: registry runtime plus the control socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{send_command, Command, Reply};
pub use runtime::{run, start_blocking};
