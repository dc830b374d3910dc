//! Error types for stevedore-engine.

use std::path::PathBuf;

use thiserror::Error;

/// Transport and decode failures against the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Socket connect/read/write failure (engine socket absent, engine down).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP-level failure (handshake, request, body collection).
    #[error("engine transport error: {0}")]
    Transport(#[from] hyper::Error),

    /// The request itself could not be built.
    #[error("invalid engine request: {0}")]
    Request(#[from] hyper::http::Error),

    /// The engine's response body was not the JSON shape we expected.
    #[error("failed to decode engine response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Exec-start did not switch protocols; there is no stream to attach to.
    #[error("engine refused exec stream upgrade (HTTP {status})")]
    UpgradeRefused { status: u16 },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
