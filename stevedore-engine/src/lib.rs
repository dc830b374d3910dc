//! Container-engine client: raw HTTP/1.1 over the engine's Unix socket.
//!
//! Public API surface:
//! - [`client`] — [`EngineClient`] (request/response and exec-attach streams)
//! - [`wire`] — serde types for the engine's create/inspect/stats/exec payloads
//! - [`error`] — [`EngineError`]

pub mod client;
pub mod error;
pub mod wire;

pub use client::{EngineClient, ExecStream};
pub use error::EngineError;
pub use wire::{
    ContainerState, CpuStats, CpuUsage, CreateContainer, CreatedContainer, HostConfig,
    InspectedContainer, MemoryStats, PortBinding, StatsSnapshot,
};
