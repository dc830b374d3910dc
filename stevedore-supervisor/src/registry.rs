//! The registry: single owner of the loaded service set.
//!
//! All control-protocol commands land here. Lifecycle dispatch validates
//! synchronously and then issues the underlying operation in the background;
//! the caller's reply means "accepted", and progress is observed through the
//! status fields on subsequent lists.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use stevedore_core::{manifest, ServiceId, Status};
use stevedore_engine::EngineClient;

use crate::error::ServiceError;
use crate::service::{Service, ServiceSnapshot};

/// Cadence of the background status resync.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry {
    root: PathBuf,
    engine: EngineClient,
    services: RwLock<Vec<Arc<Service>>>,
}

impl Registry {
    pub fn new(root: impl Into<PathBuf>, engine: EngineClient) -> Self {
        Self {
            root: root.into(),
            engine,
            services: RwLock::new(Vec::new()),
        }
    }

    /// Loads one service from `<root>/<id>/service.yaml` and registers it.
    ///
    /// Returns false without registering anything when the id is already
    /// loaded or when the manifest cannot be read; failures are logged here
    /// rather than propagated, so a broken directory never takes down a
    /// load-all pass.
    pub async fn load(&self, id: &ServiceId) -> bool {
        let mut services = self.services.write().await;
        if services.iter().any(|s| s.id() == id) {
            return false;
        }

        let manifest = match manifest::load_manifest_at(&self.root, id) {
            Ok(manifest) => manifest,
            Err(err) => {
                error!(service = %id, error = %err, "failed to load service manifest");
                return false;
            }
        };
        let service = match Service::new(manifest, &self.root, self.engine.clone()) {
            Ok(service) => service,
            Err(err) => {
                error!(service = %id, error = %err, "failed to initialize service");
                return false;
            }
        };

        services.push(Arc::new(service));
        info!(service = %id, "service loaded");
        true
    }

    /// Loads every service directory under the root, then starts the
    /// background poller. The poller runs until `shutdown` fires.
    pub async fn load_all(
        self: Arc<Self>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServiceError> {
        let ids = manifest::service_dirs_at(&self.root)?;
        let mut loaded = 0usize;
        for id in &ids {
            if self.load(id).await {
                loaded += 1;
            }
        }
        info!(root = %self.root.display(), loaded, "registry populated");

        tokio::spawn(poll_task(Arc::clone(&self), shutdown));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Issues a start for the service. Validation failures surface here; the
    /// container work itself proceeds in the background.
    pub async fn start(&self, id: &ServiceId) -> Result<(), ServiceError> {
        let service = self.find(id).await?;
        if !service.is_installed() {
            return Err(ServiceError::NotInstalled { id: id.to_string() });
        }
        if service.status() == Status::Running {
            return Err(ServiceError::AlreadyRunning { id: id.to_string() });
        }
        tokio::spawn(async move {
            if let Err(err) = Arc::clone(&service).start(false).await {
                error!(service = %service.id(), error = %err, "start failed");
            }
        });
        Ok(())
    }

    /// Issues a stop for the service.
    pub async fn stop(&self, id: &ServiceId) -> Result<(), ServiceError> {
        let service = self.find(id).await?;
        if service.status() != Status::Running {
            return Err(ServiceError::NotRunning { id: id.to_string() });
        }
        tokio::spawn(async move {
            if let Err(err) = service.stop().await {
                error!(service = %service.id(), error = %err, "stop failed");
            }
        });
        Ok(())
    }

    /// Issues an install for the service.
    pub async fn install(&self, id: &ServiceId) -> Result<(), ServiceError> {
        let service = self.find(id).await?;
        if service.is_installed() {
            return Err(ServiceError::AlreadyInstalled { id: id.to_string() });
        }
        tokio::spawn(async move {
            if let Err(err) = Arc::clone(&service).install().await {
                error!(service = %service.id(), error = %err, "install failed");
            }
        });
        Ok(())
    }

    /// Serializes the current in-memory state of every loaded service.
    pub async fn list(&self) -> Vec<ServiceSnapshot> {
        let services = self.services.read().await;
        services.iter().map(|s| s.snapshot()).collect()
    }

    /// Stops every running service in turn, awaiting each. Shutdown path:
    /// per-service failures are logged and the sweep continues.
    pub async fn stop_all(&self) {
        let services = self.services.read().await.clone();
        for service in services {
            if service.status() != Status::Running {
                continue;
            }
            if let Err(err) = service.stop().await {
                warn!(service = %service.id(), error = %err, "shutdown stop failed");
            }
        }
    }

    async fn find(&self, id: &ServiceId) -> Result<Arc<Service>, ServiceError> {
        let services = self.services.read().await;
        services
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound { id: id.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Fixed-interval status resync. Every tick launches one probe pass over the
/// registered services in registration order; a slow pass overlaps the next
/// tick instead of delaying it, and probe failures stay contained to the
/// service they hit.
async fn poll_task(registry: Arc<Registry>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let services = registry.services.read().await.clone();
                    for service in services {
                        service.probe().await;
                    }
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_manifest(root: &Path, id: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).expect("create service dir");
        fs::write(
            dir.join("service.yaml"),
            "name: Web\ncontainer:\n  image: nginx:latest\n",
        )
        .expect("write manifest");
    }

    fn registry_at(root: &Path) -> Registry {
        Registry::new(root, EngineClient::new(root.join("engine.sock")))
    }

    #[tokio::test]
    async fn load_registers_once_and_rejects_duplicates() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_manifest(dir.path(), "web");
        let registry = registry_at(dir.path());

        assert!(registry.load(&ServiceId::from("web")).await, "first load succeeds");
        assert!(
            !registry.load(&ServiceId::from("web")).await,
            "duplicate load must be a no-op"
        );
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn load_reports_false_for_a_broken_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("ghost")).expect("create empty dir");
        let registry = registry_at(dir.path());

        assert!(
            !registry.load(&ServiceId::from("ghost")).await,
            "missing manifest must not register"
        );
        assert!(registry.list().await.is_empty(), "no partial state after a failed load");
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_service() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let registry = registry_at(dir.path());

        let err = registry
            .start(&ServiceId::from("ghost"))
            .await
            .expect_err("unknown id must fail");
        assert!(matches!(err, ServiceError::NotFound { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn start_requires_the_install_marker() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_manifest(dir.path(), "web");
        let registry = registry_at(dir.path());
        registry.load(&ServiceId::from("web")).await;

        let err = registry
            .start(&ServiceId::from("web"))
            .await
            .expect_err("uninstalled service must not start");
        assert!(matches!(err, ServiceError::NotInstalled { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn stop_requires_a_running_service() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_manifest(dir.path(), "web");
        let registry = registry_at(dir.path());
        registry.load(&ServiceId::from("web")).await;

        let err = registry
            .stop(&ServiceId::from("web"))
            .await
            .expect_err("stopped service must not stop again");
        assert!(matches!(err, ServiceError::NotRunning { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn install_rejects_an_already_installed_service() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_manifest(dir.path(), "web");
        fs::write(dir.path().join("web").join(".installed"), b"").expect("write marker");
        let registry = registry_at(dir.path());
        registry.load(&ServiceId::from("web")).await;

        let err = registry
            .install(&ServiceId::from("web"))
            .await
            .expect_err("second install must fail");
        assert!(
            matches!(err, ServiceError::AlreadyInstalled { .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn load_all_skips_broken_directories_and_loads_the_rest() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_manifest(dir.path(), "api");
        write_manifest(dir.path(), "web");
        fs::create_dir_all(dir.path().join("ghost")).expect("create empty dir");
        let registry = Arc::new(registry_at(dir.path()));

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        Arc::clone(&registry)
            .load_all(shutdown_tx.subscribe())
            .await
            .expect("load all");

        let ids: Vec<String> = registry
            .list()
            .await
            .into_iter()
            .map(|s| s.manifest.id.to_string())
            .collect();
        assert_eq!(ids, vec!["api".to_string(), "web".to_string()]);
        let _ = shutdown_tx.send(());
    }
}
