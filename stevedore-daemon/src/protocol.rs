use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use serde::{Deserialize, Serialize};

use stevedore_core::ServiceId;
use stevedore_supervisor::ServiceSnapshot;

use crate::error::{io_err, DaemonError};

/// JSON newline-delimited request. One object per line, e.g.
/// `{"command":"start","service":"web"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Start { service: ServiceId },
    Stop { service: ServiceId },
    Install { service: ServiceId },
    Load { service: ServiceId },
    List,
}

/// JSON newline-delimited response: an `{info}` or `{error}` envelope, or
/// the service array answering `list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Info { info: String },
    Error { error: String },
    Services(Vec<ServiceSnapshot>),
}

impl Reply {
    pub fn info(message: impl Into<String>) -> Self {
        Reply::Info {
            info: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            error: message.into(),
        }
    }
}

/// Send one command to the daemon's control socket and return one reply.
pub fn send_command(socket: &Path, command: &Command) -> Result<Reply, DaemonError> {
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning {
            socket: socket.to_path_buf(),
        });
    }

    let mut stream = UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })?;

    let payload = serde_json::to_string(command)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let reply: Reply = serde_json::from_str(line.trim_end())?;
    Ok(reply)
}
