//! Crash-safe artifact writes.
//!
//! Every artifact is written to a temporary sibling file and renamed into
//! place, so readers never observe a half-written file. Two concurrent
//! builds writing the same entity are not coordinated; the last rename
//! wins.

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::GeoError;

/// Rejects destinations containing a `..` component.
///
/// # Errors
///
/// Returns [`GeoError::PathTraversal`] if `path` has a parent-directory
/// component.
pub fn reject_traversal(path: &Path) -> Result<(), GeoError> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(GeoError::PathTraversal {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Writes `contents` to `path` atomically (temp file + rename).
///
/// The parent directory is created if missing. The temporary file lives
/// in the destination directory so the rename never crosses filesystems.
///
/// # Errors
///
/// Returns [`GeoError::PathTraversal`] before touching the filesystem if
/// `path` contains `..`, or [`GeoError::Io`] if any write step fails.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), GeoError> {
    reject_traversal(path)?;

    let file_name = path.file_name().ok_or_else(|| GeoError::Conversion {
        message: format!("Destination has no file name: {}", path.display()),
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();

    if let Err(e) = write_result {
        // Best effort.
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Serializes `value` as pretty JSON (with trailing newline) and writes it
/// atomically.
///
/// # Errors
///
/// Returns [`GeoError`] if serialization or the write fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), GeoError> {
    let mut contents = serde_json::to_string_pretty(value)?;
    contents.push('\n');
    atomic_write(path, contents.as_bytes())
}

/// Path of the per-entity artifact `<dir>/<entity_id>.json`.
///
/// # Errors
///
/// Returns [`GeoError::PathTraversal`] if the entity id would escape
/// `dir`.
pub fn entity_artifact_path(dir: &Path, entity_id: &str) -> Result<PathBuf, GeoError> {
    let path = dir.join(format!("{entity_id}.json"));
    reject_traversal(&path)?;
    if path.parent() != Some(dir) {
        return Err(GeoError::PathTraversal { path });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind");
    }

    #[test]
    fn rejects_traversal_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/../../escape.json");

        let err = atomic_write(&path, b"x").unwrap_err();
        assert!(matches!(err, GeoError::PathTraversal { .. }));
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn entity_path_rejects_escaping_ids() {
        let dir = Path::new("out");
        assert_eq!(
            entity_artifact_path(dir, "navajo").unwrap(),
            PathBuf::from("out/navajo.json")
        );
        assert!(entity_artifact_path(dir, "../etc/passwd").is_err());
        assert!(entity_artifact_path(dir, "a/b").is_err());
    }

    #[test]
    fn json_ends_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
    }
}
