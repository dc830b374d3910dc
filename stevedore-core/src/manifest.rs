//! Manifest decode and service discovery.

use std::path::Path;

use crate::error::ManifestError;
use crate::layout;
use crate::types::{Manifest, ServiceId};

/// Load the manifest for `id` from `<root>/<id>/service.yaml`.
///
/// The decoded manifest gets its `id` from the directory name, and every
/// volume bind is rooted under `<root>/<id>/content` on the host side (a
/// manifest declares binds relative to the service's own content tree, e.g.
/// `/data:/var/lib/data`).
///
/// Returns `ManifestError::ManifestNotFound` if absent,
/// `ManifestError::Parse` (with path + line context) if malformed YAML.
pub fn load_manifest_at(root: &Path, id: &ServiceId) -> Result<Manifest, ManifestError> {
    let path = layout::manifest_path(root, id);
    if !path.exists() {
        return Err(ManifestError::ManifestNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut manifest: Manifest =
        serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse { path, source: e })?;

    manifest.id = id.clone();
    let content = layout::content_root(root, id);
    for volume in &mut manifest.container.volumes {
        *volume = format!("{}{}", content.display(), volume);
    }
    Ok(manifest)
}

/// Lists the ids of all service directories under `root`, sorted by name.
///
/// Registration order everywhere downstream (poller, list output) follows
/// this sorted order, so discovery is deterministic.
pub fn service_dirs_at(root: &Path) -> Result<Vec<ServiceId>, ManifestError> {
    if !root.exists() {
        return Ok(vec![]);
    }
    let mut ids: Vec<ServiceId> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| ServiceId::from(e.file_name().to_string_lossy().into_owned()))
        .collect();
    ids.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
