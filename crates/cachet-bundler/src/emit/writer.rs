//! Atomic output writing.
//!
//! Every asset is written to `<file>.tmp` first. Only when all temp files
//! exist are they renamed into place, and the manifest is renamed last, so a
//! reader that trusts the manifest never sees a half-written build. If any
//! step fails every temp file is removed and the previous output stays as it
//! was. All paths are cleaned and must stay inside the output directory.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use super::OutputAsset;
use super::manifest::Manifest;
use crate::{Error, Result};

/// What [`write_outputs`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

/// Write `assets` and then the manifest into `dir`.
///
/// With `prune`, files listed by the previous manifest that are not part of
/// this output are deleted afterwards.
pub fn write_outputs(
    dir: &Path,
    assets: &[OutputAsset],
    manifest: &Manifest,
    manifest_filename: &str,
    public_path: &str,
    prune: bool,
) -> Result<WriteSummary> {
    let dir = validate_and_normalize_dir(dir)?;
    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "failed to create output directory '{}': {e}",
            dir.display()
        ))
    })?;

    let manifest_path = validate_output_path(&dir, manifest_filename)?;
    let previous = if prune {
        Manifest::read(&manifest_path)
    } else {
        None
    };

    let manifest_json = manifest.to_json()?;
    let mut operations: Vec<(PathBuf, &[u8])> = Vec::with_capacity(assets.len() + 1);
    for asset in assets {
        operations.push((validate_output_path(&dir, &asset.path)?, asset.bytes.as_ref()));
    }
    operations.push((manifest_path, manifest_json.as_bytes()));

    write_files_atomic(&operations)?;
    let written: Vec<PathBuf> = operations.into_iter().map(|(path, _)| path).collect();

    let pruned = match previous {
        Some(previous) => prune_stale(&dir, &previous, public_path, &written),
        None => Vec::new(),
    };

    Ok(WriteSummary { written, pruned })
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::InvalidOutputPath(format!("failed to get current directory: {e}")))?;
    Ok(cwd.join(&cleaned).clean())
}

/// Resolve `filename` under `base_dir`, rejecting anything that escapes it.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "filename contains null byte".to_string(),
        ));
    }

    #[cfg(target_os = "windows")]
    {
        let upper = filename.to_uppercase();
        let device_names = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        for device in &device_names {
            if upper == *device || upper.starts_with(&format!("{device}.")) {
                return Err(Error::InvalidOutputPath(format!(
                    "filename is a reserved device name: {filename}"
                )));
            }
        }
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "'{filename}' escapes output directory '{}' (resolved to '{}')",
            base_dir.display(),
            full_path.display()
        )));
    }
    Ok(full_path)
}

/// `app.1234.js` → `app.1234.js.tmp`; `with_extension` would collide for
/// files differing only in extension.
fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    target.with_file_name(name)
}

fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(operations.len());

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                Error::WriteFailure(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        let temp = temp_path(target_path);
        fs::write(&temp, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "failed to write temporary file '{}': {e}",
                temp.display()
            ))
        })?;
        temp_files.push((temp, target_path.clone()));
    }

    for (index, (temp, target)) in temp_files.iter().enumerate() {
        if let Err(e) = fs::rename(temp, target) {
            cleanup_temp_files(&temp_files[index..]);
            return Err(Error::WriteFailure(format!(
                "failed to rename '{}' to '{}': {e}",
                temp.display(),
                target.display()
            )));
        }
    }

    tracing::debug!(files = temp_files.len(), "output written");
    Ok(())
}

/// Best effort; we are already failing.
fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp, _) in temp_files {
        if temp.is_file() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(path = %temp.display(), error = %e, "failed to clean up temporary file");
            }
        }
    }
}

fn prune_stale(
    dir: &Path,
    previous: &Manifest,
    public_path: &str,
    written: &[PathBuf],
) -> Vec<PathBuf> {
    let keep: BTreeSet<&Path> = written.iter().map(PathBuf::as_path).collect();
    let mut pruned = Vec::new();

    for relative in previous.output_paths(public_path) {
        let Ok(path) = validate_output_path(dir, relative) else {
            continue;
        };
        if keep.contains(path.as_path()) || !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "pruned stale output");
                pruned.push(path);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to prune stale output"),
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn asset(logical: &str, path: &str, content: &str) -> OutputAsset {
        OutputAsset::new(logical, path, Arc::from(content.as_bytes()))
    }

    fn manifest_for(assets: &[OutputAsset]) -> Manifest {
        let mut manifest = Manifest::new();
        for asset in assets {
            manifest.insert(asset.logical_name.clone(), format!("/{}", asset.path));
        }
        manifest
    }

    #[test]
    fn validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        assert_eq!(
            validate_output_path(base, "assets/media/a.png").unwrap(),
            Path::new("/tmp/output/assets/media/a.png")
        );
        assert_eq!(
            validate_output_path(base, "./index.js").unwrap(),
            Path::new("/tmp/output/index.js")
        );
    }

    #[test]
    fn validate_output_path_rejects_traversal() {
        let base = Path::new("/tmp/output");
        for bad in ["../etc/passwd", "safe/../../../../etc/passwd", "file\0.js", "."] {
            assert!(
                matches!(validate_output_path(base, bad), Err(Error::InvalidOutputPath(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn temp_names_keep_extension() {
        assert_eq!(temp_path(Path::new("/o/app.js")), Path::new("/o/app.js.tmp"));
        assert_ne!(temp_path(Path::new("/o/app.js")), temp_path(Path::new("/o/app.css")));
    }

    #[test]
    fn writes_assets_and_manifest() {
        let dir = TempDir::new().unwrap();
        let assets = vec![
            asset("app.js", "app.1.js", "js"),
            asset("logo.png", "assets/media/logo.2.png", "png"),
        ];
        let summary = write_outputs(
            dir.path(),
            &assets,
            &manifest_for(&assets),
            "asset-manifest.json",
            "/",
            false,
        )
        .unwrap();

        assert_eq!(summary.written.len(), 3);
        assert_eq!(fs::read_to_string(dir.path().join("assets/media/logo.2.png")).unwrap(), "png");
        let manifest = Manifest::read(&dir.path().join("asset-manifest.json")).unwrap();
        assert_eq!(manifest.get("app.js"), Some("/app.1.js"));
        assert!(!dir.path().join("app.1.js.tmp").exists());
    }

    #[test]
    fn failed_write_keeps_previous_manifest() {
        let dir = TempDir::new().unwrap();
        let first = vec![asset("app.js", "app.1.js", "one")];
        write_outputs(dir.path(), &first, &manifest_for(&first), "asset-manifest.json", "/", false)
            .unwrap();
        let before = fs::read_to_string(dir.path().join("asset-manifest.json")).unwrap();

        // a directory where the manifest temp file should go
        fs::create_dir(dir.path().join("asset-manifest.json.tmp")).unwrap();
        let second = vec![asset("app.js", "app.2.js", "two")];
        let err = write_outputs(dir.path(), &second, &manifest_for(&second), "asset-manifest.json", "/", false)
            .unwrap_err();

        assert!(matches!(err, Error::WriteFailure(_)));
        assert_eq!(fs::read_to_string(dir.path().join("asset-manifest.json")).unwrap(), before);
        assert!(!dir.path().join("app.2.js").exists());
        assert!(!dir.path().join("app.2.js.tmp").exists());
    }

    #[test]
    fn prunes_files_from_previous_manifest() {
        let dir = TempDir::new().unwrap();
        let first = vec![asset("app.js", "app.1.js", "one"), asset("unrelated", "keep.txt", "")];
        write_outputs(dir.path(), &first, &manifest_for(&first), "asset-manifest.json", "/", true)
            .unwrap();
        fs::write(dir.path().join("user-file.txt"), "mine").unwrap();

        let second = vec![asset("app.js", "app.2.js", "two"), asset("unrelated", "keep.txt", "")];
        let summary = write_outputs(dir.path(), &second, &manifest_for(&second), "asset-manifest.json", "/", true)
            .unwrap();

        assert_eq!(summary.pruned.len(), 1);
        assert!(!dir.path().join("app.1.js").exists());
        assert!(dir.path().join("app.2.js").exists());
        assert!(dir.path().join("keep.txt").exists());
        assert!(dir.path().join("user-file.txt").exists());
    }
}
