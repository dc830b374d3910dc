//! Service supervision for stevedore.
//!
//! Public API surface:
//! - [`service`] — the per-service lifecycle state machine and snapshots
//! - [`registry`] — single owner of the loaded set, dispatch, background poller
//! - [`logs`] — exec output sanitization and the per-service log sink
//! - [`error`] — [`ServiceError`]

pub mod error;
pub mod logs;
pub mod registry;
pub mod service;

pub use error::ServiceError;
pub use registry::Registry;
pub use service::{Service, ServiceSnapshot};
