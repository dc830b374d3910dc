use std::path::PathBuf;

pub const SERVICES_ROOT: &str = "/etc/stevedore/services";
pub const CONTROL_SOCKET: &str = "/run/stevedore.sock";
pub const ENGINE_SOCKET: &str = "/var/run/docker.sock";

/// Root directory holding one subdirectory per service.
/// Overridable with `STEVEDORE_ROOT`.
pub fn services_root() -> PathBuf {
    std::env::var_os("STEVEDORE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SERVICES_ROOT))
}

/// The daemon's control socket. Overridable with `STEVEDORE_SOCKET`.
pub fn control_socket() -> PathBuf {
    std::env::var_os("STEVEDORE_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONTROL_SOCKET))
}

/// The container engine's socket. Overridable with `STEVEDORE_ENGINE_SOCKET`.
pub fn engine_socket() -> PathBuf {
    std::env::var_os("STEVEDORE_ENGINE_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(ENGINE_SOCKET))
}
