//! The persisted variable-override store (`variables.json`).
//!
//! Operators edit this file to override manifest defaults; the daemon rewrites
//! it on every render so it always converges to the full current variable set.
//! Merge rules, by placeholder key:
//! - a file entry matching a manifest variable wins over the manifest default
//! - a manifest variable absent from the file keeps its manifest default
//! - a file entry whose placeholder is unknown to the manifest is preserved
//!   and appended, so hand-added entries survive the rewrite
//!
//! An unreadable or malformed file falls back to the manifest defaults and is
//! rewritten in place.

use std::path::Path;

use crate::error::ManifestError;
use crate::layout;
use crate::types::{ServiceId, Variable};

/// Load the merged variable set for a service and write it back to
/// `<root>/<id>/variables.json`.
pub fn load_merged_at(
    root: &Path,
    id: &ServiceId,
    manifest_vars: &[Variable],
) -> Result<Vec<Variable>, ManifestError> {
    let path = layout::variables_path(root, id);
    let mut merged: Vec<Variable> = manifest_vars.to_vec();

    if let Some(overrides) = read_overrides(&path) {
        for variable in &mut merged {
            if let Some(saved) = overrides.iter().find(|o| o.placeholder == variable.placeholder) {
                variable.value = saved.value.clone();
            }
        }
        for saved in overrides {
            if !merged.iter().any(|v| v.placeholder == saved.placeholder) {
                merged.push(saved);
            }
        }
    }

    save_at(root, id, &merged)?;
    Ok(merged)
}

/// Overwrite `<root>/<id>/variables.json` with `vars`.
///
/// Write flow: serialize → `.json.tmp` sibling → `rename`. The `.tmp` stays in
/// the same directory as the target so the rename never crosses filesystems.
pub fn save_at(root: &Path, id: &ServiceId, vars: &[Variable]) -> Result<(), ManifestError> {
    let dir = layout::service_dir(root, id);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    let path = layout::variables_path(root, id);
    let tmp_path = path.with_file_name(format!("{}.tmp", layout::VARIABLES_FILE));

    let json = serde_json::to_string_pretty(vars)?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

fn read_overrides(path: &Path) -> Option<Vec<Variable>> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn var(name: &str, placeholder: &str, value: &str) -> Variable {
        Variable {
            name: name.into(),
            placeholder: placeholder.into(),
            value: value.into(),
        }
    }

    fn web() -> ServiceId {
        ServiceId::from("web")
    }

    #[test]
    fn first_load_writes_manifest_defaults() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080")];

        let merged = load_merged_at(root.path(), &web(), &manifest_vars).expect("load");
        assert_eq!(merged, manifest_vars);

        let saved = std::fs::read_to_string(layout::variables_path(root.path(), &web()))
            .expect("variables.json written");
        let decoded: Vec<Variable> = serde_json::from_str(&saved).expect("decode");
        assert_eq!(decoded, manifest_vars);
    }

    #[test]
    fn file_value_wins_over_manifest_default() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080")];
        save_at(root.path(), &web(), &[var("Port", "{{PORT}}", "9999")]).expect("seed overrides");

        let merged = load_merged_at(root.path(), &web(), &manifest_vars).expect("load");
        assert_eq!(merged[0].value, "9999", "persisted value must override the manifest default");
    }

    #[test]
    fn unknown_placeholders_survive_a_rewrite() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080")];
        save_at(
            root.path(),
            &web(),
            &[var("Extra", "{{EXTRA}}", "kept"), var("Port", "{{PORT}}", "9000")],
        )
        .expect("seed overrides");

        let merged = load_merged_at(root.path(), &web(), &manifest_vars).expect("load");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, "9000");
        assert_eq!(merged[1].placeholder, "{{EXTRA}}");
        assert_eq!(merged[1].value, "kept");
    }

    #[test]
    fn edited_overrides_change_the_next_render() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080")];

        let first = load_merged_at(root.path(), &web(), &manifest_vars).expect("first load");
        assert_eq!(crate::render::substitute("{{PORT}}", &first), "8080");

        save_at(root.path(), &web(), &[var("Port", "{{PORT}}", "9090")]).expect("edit overrides");

        let second = load_merged_at(root.path(), &web(), &manifest_vars).expect("second load");
        assert_eq!(
            crate::render::substitute("{{PORT}}", &second),
            "9090",
            "a file edit must win on the next render"
        );
    }

    #[test]
    fn merge_is_stable_across_reloads() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080"), var("Host", "{{HOST}}", "0.0.0.0")];
        save_at(root.path(), &web(), &[var("Extra", "{{EXTRA}}", "kept")]).expect("seed overrides");

        let first = load_merged_at(root.path(), &web(), &manifest_vars).expect("first load");
        let second = load_merged_at(root.path(), &web(), &manifest_vars).expect("second load");
        assert_eq!(first, second, "reload + resave must not change the merged set");
    }

    #[test]
    fn malformed_file_falls_back_to_manifest_defaults() {
        let root = TempDir::new().expect("tempdir");
        let manifest_vars = vec![var("Port", "{{PORT}}", "8080")];
        let dir = layout::service_dir(root.path(), &web());
        std::fs::create_dir_all(&dir).expect("service dir");
        std::fs::write(layout::variables_path(root.path(), &web()), "{not json").expect("corrupt");

        let merged = load_merged_at(root.path(), &web(), &manifest_vars).expect("load");
        assert_eq!(merged, manifest_vars);

        let saved = std::fs::read_to_string(layout::variables_path(root.path(), &web()))
            .expect("variables.json rewritten");
        let decoded: Vec<Variable> = serde_json::from_str(&saved).expect("now valid JSON");
        assert_eq!(decoded, manifest_vars);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let root = TempDir::new().expect("tempdir");
        save_at(root.path(), &web(), &[var("Port", "{{PORT}}", "8080")]).expect("save");
        let tmp = layout::variables_path(root.path(), &web())
            .with_file_name("variables.json.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after a successful save");
    }
}
