//! Domain types for stevedore services.
//!
//! A service definition lives in `<services root>/<id>/service.yaml`; the `id`
//! field is always injected from the directory name, never read from the file.
//! All types are serializable/deserializable via serde.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed service identifier (the service's directory name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle state of a service. There are no intermediate states; transitions
/// are calls that either complete or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Stopped => write!(f, "stopped"),
            Status::Running => write!(f, "running"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A named placeholder with a default value, textually substituted into
/// manifest fields at render time. Plain substring replacement, never
/// pattern/regex semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub placeholder: String,
    #[serde(rename = "default")]
    pub value: String,
}

/// A port mapping. All three fields are strings because any of them may carry
/// a variable placeholder until render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub protocol: String,
    pub host_port: String,
    pub container_port: String,
}

/// An ordered list of argument-vector commands executed inside the running
/// container for a named lifecycle event (install/start/stop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub script: Vec<Vec<String>>,
}

/// The `container:` block of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub environment: Vec<String>,
}

/// The declarative definition of a service.
///
/// `id` is not part of the YAML file; [`crate::manifest::load_manifest_at`]
/// fills it in from the directory name after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub container: ContainerSpec,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

impl Manifest {
    /// The named procedure, if the manifest declares one.
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}

/// One resource snapshot for a running container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub cpu_usage_percent: f64,
    pub memory_usage_mb: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
