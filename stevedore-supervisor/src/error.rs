//! Error types for stevedore-supervisor.

use std::path::PathBuf;

use thiserror::Error;

use stevedore_core::ManifestError;
use stevedore_engine::EngineError;

/// Everything that can go wrong while driving a service through its
/// lifecycle. The daemon serializes these into error replies verbatim, so
/// the messages are written for operators, not for logs.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested id matches no loaded service.
    #[error("no service named '{id}'")]
    NotFound { id: String },

    #[error("service '{id}' is already running")]
    AlreadyRunning { id: String },

    #[error("service '{id}' is not running")]
    NotRunning { id: String },

    #[error("service '{id}' is already installed")]
    AlreadyInstalled { id: String },

    #[error("service '{id}' is not installed")]
    NotInstalled { id: String },

    /// A lifecycle step referenced a procedure the manifest does not define.
    #[error("service '{id}' has no procedure named '{name}'")]
    ProcedureNotFound { id: String, name: String },

    /// The engine answered the create request without a container id.
    #[error("engine refused to create container for '{id}': {message}")]
    CreateFailed { id: String, message: String },

    /// The freshly created container never reached the running state.
    #[error("container for '{id}' did not reach running state within {waited}s")]
    InstallTimeout { id: String, waited: u64 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServiceError {
    ServiceError::Io {
        path: path.into(),
        source,
    }
}
