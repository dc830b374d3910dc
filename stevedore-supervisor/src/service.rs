//! A single supervised service.
//!
//! Each [`Service`] pairs a loaded manifest with the runtime state of its
//! container: the lifecycle status, the container id while running, and the
//! latest resource stats. Lifecycle operations talk to the engine directly;
//! durable facts (the install marker, variable overrides) live on disk under
//! the service's directory and survive restarts, while runtime state resets
//! to stopped on every boot and is resynced by the poller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use stevedore_core::{layout, render, vars, Manifest, Rendered, ServiceId, Stats, Status};
use stevedore_engine::{CreateContainer, EngineClient, HostConfig, PortBinding, StatsSnapshot};

use crate::error::{io_err, ServiceError};
use crate::logs::{sanitize, LogSink};

/// How many one-second polls `install` gives the fresh container to report
/// running before giving up.
const INSTALL_WAIT_ATTEMPTS: u64 = 60;
const INSTALL_WAIT_STEP: Duration = Duration::from_secs(1);

const EXEC_READ_BUF: usize = 4096;

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Mutable per-service state. Held behind a lock with short critical
/// sections; never held across an await.
#[derive(Debug, Default)]
struct RuntimeState {
    status: Status,
    container_id: Option<String>,
    stats: Stats,
}

/// Point-in-time view of one service, as serialized to control clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    #[serde(flatten)]
    pub manifest: Manifest,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub stats: Stats,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Service {
    manifest: Manifest,
    root: PathBuf,
    engine: EngineClient,
    state: RwLock<RuntimeState>,
    log: LogSink,
}

impl Service {
    /// Builds a service from its loaded manifest and opens its log sink,
    /// which stays open for the service's entire in-process lifetime.
    pub fn new(
        manifest: Manifest,
        root: &Path,
        engine: EngineClient,
    ) -> Result<Self, ServiceError> {
        let log_path = layout::log_path(root, &manifest.id);
        let log = LogSink::open(&log_path).map_err(|e| io_err(&log_path, e))?;
        Ok(Self {
            manifest,
            root: root.to_path_buf(),
            engine,
            state: RwLock::new(RuntimeState::default()),
            log,
        })
    }

    pub fn id(&self) -> &ServiceId {
        &self.manifest.id
    }

    pub fn status(&self) -> Status {
        self.read_state().status
    }

    /// The durable install marker is the source of truth for install state,
    /// independent of in-memory status.
    pub fn is_installed(&self) -> bool {
        layout::marker_path(&self.root, &self.manifest.id).exists()
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        let state = self.read_state();
        ServiceSnapshot {
            manifest: self.manifest.clone(),
            status: state.status,
            container_id: state.container_id.clone(),
            stats: state.stats,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Installs the service: writes the durable marker, then runs the full
    /// start path with the install procedure included.
    pub async fn install(self: Arc<Self>) -> Result<(), ServiceError> {
        if self.is_installed() {
            return Err(ServiceError::AlreadyInstalled {
                id: self.manifest.id.to_string(),
            });
        }
        let marker = layout::marker_path(&self.root, &self.manifest.id);
        std::fs::write(&marker, b"").map_err(|e| io_err(&marker, e))?;
        info!(service = %self.manifest.id, "install marker written");
        self.start(true).await
    }

    /// Creates and starts the service's container, then dispatches lifecycle
    /// procedures.
    ///
    /// With `run_install` set, the call waits for the container to report
    /// running and executes the install procedure to completion first. The
    /// start procedure is always dispatched fire-and-forget: its outcome
    /// lands in the service log, not in this result.
    pub async fn start(self: Arc<Self>, run_install: bool) -> Result<(), ServiceError> {
        let id = self.manifest.id.to_string();
        if !self.is_installed() {
            return Err(ServiceError::NotInstalled { id });
        }
        if self.status() == Status::Running {
            return Err(ServiceError::AlreadyRunning { id });
        }

        let variables =
            vars::load_merged_at(&self.root, &self.manifest.id, &self.manifest.variables)?;
        let rendered = render::render(&self.manifest, &variables);
        let spec = build_create_spec(&rendered);

        // The container name is the service id, so a leftover from a
        // previous run would collide with the create. Clear it if present.
        if let Err(err) = self.engine.remove_container(&id).await {
            debug!(service = %id, error = %err, "no leftover container removed");
        }

        let created = self.engine.create_container(&id, &spec).await?;
        let container_id = created.id.ok_or_else(|| ServiceError::CreateFailed {
            id: id.clone(),
            message: created
                .message
                .unwrap_or_else(|| "engine returned no container id".to_string()),
        })?;
        self.engine.start_container(&container_id).await?;

        {
            let mut state = self.write_state();
            state.status = Status::Running;
            state.container_id = Some(container_id.clone());
        }
        info!(service = %id, container = %container_id, "container started");

        if run_install {
            self.wait_until_running(&container_id).await?;
            self.run_procedure("install").await?;
        }

        let service = Arc::clone(&self);
        tokio::spawn(async move {
            if let Err(err) = service.run_procedure("start").await {
                warn!(service = %service.manifest.id, error = %err, "start procedure failed");
            }
        });
        Ok(())
    }

    /// Stops the service: runs the stop procedure, then asks the engine to
    /// stop the container. The engine call may fail (the container can
    /// already be gone); the service is marked stopped regardless.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let id = self.manifest.id.to_string();
        {
            let state = self.read_state();
            if state.status != Status::Running {
                return Err(ServiceError::NotRunning { id });
            }
        }

        self.run_procedure("stop").await?;

        let container_id = self.read_state().container_id.clone();
        if let Some(container_id) = container_id {
            if let Err(err) = self.engine.stop_container(&container_id).await {
                warn!(service = %id, error = %err, "engine stop failed, marking service stopped anyway");
            }
        }

        {
            let mut state = self.write_state();
            state.status = Status::Stopped;
            state.container_id = None;
        }
        info!(service = %id, "service stopped");
        Ok(())
    }

    /// Runs the named procedure's steps strictly in declared order inside
    /// the live container. Each argument token goes through the same
    /// placeholder substitution as the render step; each step's output is
    /// sanitized and appended to the service log. A failing step aborts the
    /// remaining steps.
    pub async fn run_procedure(&self, name: &str) -> Result<(), ServiceError> {
        let id = self.manifest.id.to_string();
        let container_id = {
            let state = self.read_state();
            if state.status != Status::Running {
                return Err(ServiceError::NotRunning { id });
            }
            state.container_id.clone()
        };
        let Some(container_id) = container_id else {
            return Err(ServiceError::NotRunning { id });
        };
        let procedure =
            self.manifest
                .procedure(name)
                .ok_or_else(|| ServiceError::ProcedureNotFound {
                    id: id.clone(),
                    name: name.to_string(),
                })?;

        let variables =
            vars::load_merged_at(&self.root, &self.manifest.id, &self.manifest.variables)?;

        for step in &procedure.script {
            let argv: Vec<String> = step
                .iter()
                .map(|token| render::substitute(token, &variables))
                .collect();
            info!(service = %id, procedure = name, command = ?argv, "running procedure step");

            let mut stream = self.engine.exec(&container_id, argv).await?;
            let mut buf = [0u8; EXEC_READ_BUF];
            loop {
                let n = stream
                    .read(&mut buf)
                    .await
                    .map_err(|e| io_err("exec stream", e))?;
                if n == 0 {
                    break;
                }
                let text = sanitize(&buf[..n]);
                if !text.is_empty() {
                    let log_path = layout::log_path(&self.root, &self.manifest.id);
                    self.log.append(&text).map_err(|e| io_err(log_path, e))?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status probe
    // -----------------------------------------------------------------------

    /// One status/stats resync against the engine, used by the poller and
    /// safe for foreground callers.
    ///
    /// A stopped service short-circuits without contacting the engine. For
    /// a running one the container is inspected; if the engine reports it
    /// gone or not running, status self-heals to stopped. Probe failures
    /// are logged and degrade the service to stopped instead of propagating.
    pub async fn probe(&self) -> Status {
        let container_id = {
            let state = self.read_state();
            if state.status == Status::Stopped {
                return Status::Stopped;
            }
            state.container_id.clone()
        };
        let Some(container_id) = container_id else {
            return self.mark_stopped();
        };

        match self.probe_engine(&container_id).await {
            Ok(Some(stats)) => {
                let mut state = self.write_state();
                state.stats = stats;
                state.status
            }
            Ok(None) => {
                info!(service = %self.manifest.id, "container no longer running, marking service stopped");
                self.mark_stopped()
            }
            Err(err) => {
                warn!(service = %self.manifest.id, error = %err, "status probe failed, marking service stopped");
                self.mark_stopped()
            }
        }
    }

    async fn probe_engine(&self, container_id: &str) -> Result<Option<Stats>, ServiceError> {
        let inspected = self.engine.inspect_container(container_id).await?;
        if !inspected.state.running {
            return Ok(None);
        }
        let snapshot = self.engine.container_stats(container_id).await?;
        Ok(Some(compute_stats(&snapshot)))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Polls the engine until the container reports running. Bounded, so a
    /// container that never comes up fails the install instead of wedging it.
    async fn wait_until_running(&self, container_id: &str) -> Result<(), ServiceError> {
        for _ in 0..INSTALL_WAIT_ATTEMPTS {
            let inspected = self.engine.inspect_container(container_id).await?;
            if inspected.state.running {
                return Ok(());
            }
            tokio::time::sleep(INSTALL_WAIT_STEP).await;
        }
        Err(ServiceError::InstallTimeout {
            id: self.manifest.id.to_string(),
            waited: INSTALL_WAIT_ATTEMPTS,
        })
    }

    fn mark_stopped(&self) -> Status {
        let mut state = self.write_state();
        state.status = Status::Stopped;
        state.container_id = None;
        Status::Stopped
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RuntimeState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RuntimeState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Create spec and stats
// ---------------------------------------------------------------------------

/// Assembles the engine create body from rendered manifest fields. The
/// container runs tty-attached with combined stdout/stderr, is never
/// auto-removed, and is told to come down with SIGTERM and a 10s grace
/// window.
fn build_create_spec(rendered: &Rendered) -> CreateContainer {
    let mut port_bindings: BTreeMap<String, Vec<PortBinding>> = BTreeMap::new();
    for port in &rendered.ports {
        port_bindings
            .entry(format!("{}/{}", port.container_port, port.protocol))
            .or_default()
            .push(PortBinding {
                host_port: port.host_port.clone(),
            });
    }
    CreateContainer {
        image: rendered.image.clone(),
        host_config: HostConfig {
            port_bindings,
            binds: rendered.volumes.clone(),
            privileged: false,
            auto_remove: false,
        },
        env: rendered.environment.clone(),
        attach_stdout: true,
        attach_stderr: true,
        attach_stdin: false,
        tty: true,
        open_stdin: false,
        stdin_once: false,
        stop_signal: "SIGTERM".to_string(),
        stop_timeout: 10,
    }
}

/// Derives user-facing stats from one engine snapshot.
///
/// A single snapshot has no previous sample to diff against, so the
/// cumulative counters are used directly: container CPU time over system
/// CPU time, scaled by core count. A snapshot without a system counter
/// reads as 0%.
fn compute_stats(snapshot: &StatsSnapshot) -> Stats {
    let cores = snapshot.cpu.online_cpus.map(u64::from).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get() as u64)
            .unwrap_or(1)
    });
    let cpu_usage_percent = if snapshot.cpu.system > 0 {
        let ratio = snapshot.cpu.usage.total as f64 / snapshot.cpu.system as f64;
        round2(ratio * cores as f64 * 100.0)
    } else {
        0.0
    };
    Stats {
        cpu_usage_percent,
        memory_usage_mb: (snapshot.memory.usage as f64 / (1024.0 * 1024.0)).round() as u64,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
