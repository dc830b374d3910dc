//! Serde types for the engine's wire payloads.
//!
//! Field names mirror the engine API exactly (PascalCase on the container
//! endpoints, snake_case on the stats endpoint), so every struct carries
//! explicit renames rather than a blanket `rename_all`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Container create
// ---------------------------------------------------------------------------

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContainer {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "HostConfig")]
    pub host_config: HostConfig,
    #[serde(rename = "Env")]
    pub env: Vec<String>,
    #[serde(rename = "AttachStdout")]
    pub attach_stdout: bool,
    #[serde(rename = "AttachStderr")]
    pub attach_stderr: bool,
    #[serde(rename = "AttachStdin")]
    pub attach_stdin: bool,
    #[serde(rename = "Tty")]
    pub tty: bool,
    #[serde(rename = "OpenStdin")]
    pub open_stdin: bool,
    #[serde(rename = "StdinOnce")]
    pub stdin_once: bool,
    #[serde(rename = "StopSignal")]
    pub stop_signal: String,
    #[serde(rename = "StopTimeout")]
    pub stop_timeout: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// `"<containerPort>/<protocol>"` → host port list. A `BTreeMap` keeps
    /// serialization order deterministic.
    #[serde(rename = "PortBindings")]
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    #[serde(rename = "Binds")]
    pub binds: Vec<String>,
    #[serde(rename = "Privileged")]
    pub privileged: bool,
    #[serde(rename = "AutoRemove")]
    pub auto_remove: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

/// Reply of `POST /containers/create`. Decoded leniently: a failed creation
/// carries no `Id`, only the engine's `message` text, and it is the caller's
/// job to inspect which one is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedContainer {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

/// Reply of `GET /containers/{id}/json`, reduced to the state flag we use.
/// Decoded strictly: an error body without `State` is a decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct InspectedContainer {
    #[serde(rename = "State")]
    pub state: ContainerState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerState {
    #[serde(rename = "Running")]
    pub running: bool,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// One snapshot from `GET /containers/{id}/stats?stream=false`. Counters the
/// engine omits (e.g. `system_cpu_usage` on a cgroup the kernel has torn
/// down) default to zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsSnapshot {
    #[serde(rename = "cpu_stats", default)]
    pub cpu: CpuStats,
    #[serde(rename = "memory_stats", default)]
    pub memory: MemoryStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuStats {
    #[serde(rename = "cpu_usage", default)]
    pub usage: CpuUsage,
    #[serde(rename = "system_cpu_usage", default)]
    pub system: u64,
    #[serde(rename = "online_cpus")]
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuUsage {
    #[serde(rename = "total_usage", default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: u64,
}

// ---------------------------------------------------------------------------
// Exec
// ---------------------------------------------------------------------------

/// Body of `POST /containers/{id}/exec`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecCreate {
    #[serde(rename = "Cmd")]
    pub cmd: Vec<String>,
    #[serde(rename = "AttachStdout")]
    pub attach_stdout: bool,
    #[serde(rename = "AttachStderr")]
    pub attach_stderr: bool,
    #[serde(rename = "AttachStdin")]
    pub attach_stdin: bool,
    #[serde(rename = "Tty")]
    pub tty: bool,
}

/// Reply of `POST /containers/{id}/exec`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedExec {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Body of `POST /exec/{id}/start`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecStart {
    #[serde(rename = "Detach")]
    pub detach: bool,
    #[serde(rename = "Tty")]
    pub tty: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
