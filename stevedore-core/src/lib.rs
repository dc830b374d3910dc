//! Stevedore core library — service data model, manifest decode, on-disk layout.
//!
//! Public API surface:
//! - [`types`] — the service id newtype and manifest/runtime domain structs
//! - [`error`] — [`ManifestError`]
//! - [`layout`] — per-service directory and file path helpers
//! - [`manifest`] — manifest decode and service discovery
//! - [`vars`] — the persisted variable-override store
//! - [`render`] — placeholder substitution into manifest fields

pub mod error;
pub mod layout;
pub mod manifest;
pub mod render;
pub mod types;
pub mod vars;

pub use error::ManifestError;
pub use render::Rendered;
pub use types::{ContainerSpec, Manifest, Port, Procedure, ServiceId, Stats, Status, Variable};
