//! Error types for stevedore-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reading or persisting service definitions.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with the offending file path attached.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON serialization error (variable-overrides write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The manifest file did not exist at the expected path.
    #[error("manifest not found at {path}")]
    ManifestNotFound { path: PathBuf },
}
