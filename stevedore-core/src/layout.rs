//! Per-service on-disk layout.
//!
//! ```text
//! <services root>/
//!   <id>/
//!     service.yaml     (manifest)
//!     variables.json   (persisted variable overrides)
//!     .installed       (zero-byte install marker)
//!     stdout.log       (append-only sanitized log)
//!     content/         (host side of rendered volume binds)
//! ```
//!
//! All functions are pure path builders over a passed-in services root; the
//! daemon supplies the deployment root, tests supply a `TempDir`.

use std::path::{Path, PathBuf};

use crate::types::ServiceId;

pub const MANIFEST_FILE: &str = "service.yaml";
pub const VARIABLES_FILE: &str = "variables.json";
pub const MARKER_FILE: &str = ".installed";
pub const LOG_FILE: &str = "stdout.log";
pub const CONTENT_DIR: &str = "content";

/// `<root>/<id>/`
pub fn service_dir(root: &Path, id: &ServiceId) -> PathBuf {
    root.join(&id.0)
}

/// `<root>/<id>/service.yaml`
pub fn manifest_path(root: &Path, id: &ServiceId) -> PathBuf {
    service_dir(root, id).join(MANIFEST_FILE)
}

/// `<root>/<id>/variables.json`
pub fn variables_path(root: &Path, id: &ServiceId) -> PathBuf {
    service_dir(root, id).join(VARIABLES_FILE)
}

/// `<root>/<id>/.installed`
pub fn marker_path(root: &Path, id: &ServiceId) -> PathBuf {
    service_dir(root, id).join(MARKER_FILE)
}

/// `<root>/<id>/stdout.log`
pub fn log_path(root: &Path, id: &ServiceId) -> PathBuf {
    service_dir(root, id).join(LOG_FILE)
}

/// `<root>/<id>/content` — host prefix prepended to every volume bind.
pub fn content_root(root: &Path, id: &ServiceId) -> PathBuf {
    service_dir(root, id).join(CONTENT_DIR)
}
