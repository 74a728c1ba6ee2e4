//! In-place file rewriting
//!
//! Literal search/replace patches for third-party sources, closure-based
//! rewrites for build scripts, and the `.bak` backups that go with them.
//! A file is only written when its content actually changes.

use crate::error::{Error, ErrorCode, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One literal substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Text to look for
    pub search: String,
    /// Text to put in its place
    pub replace: String,
}

impl Replacement {
    /// Create a replacement
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// What happened when a patch was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The file changed
    Applied,
    /// The file exists but none of the search strings matched
    Unchanged,
    /// The file does not exist
    Missing,
}

/// Apply every replacement whose search text occurs in `content`
pub fn apply_replacements(content: &str, replacements: &[Replacement]) -> String {
    replacements
        .iter()
        .filter(|r| !r.search.is_empty())
        .fold(content.to_string(), |acc, r| {
            if acc.contains(&r.search) {
                acc.replace(&r.search, &r.replace)
            } else {
                acc
            }
        })
}

/// Path of the backup copy for `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to `path.bak` unless a backup already exists
///
/// The first backup is the pristine original, later runs never overwrite it.
pub fn backup_once(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path);
    if !backup.exists() {
        fs::copy(path, &backup).context(format!("Backing up {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Created backup");
    }
    Ok(backup)
}

/// Rewrite a file through `transform`, writing only on change
///
/// Returns `true` when the file was written.
pub fn rewrite_file<F>(path: &Path, backup: bool, transform: F) -> Result<bool>
where
    F: FnOnce(&str) -> String,
{
    let content = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
    let updated = transform(&content);
    if updated == content {
        return Ok(false);
    }
    if backup {
        backup_once(path)?;
    }
    fs::write(path, updated).map_err(|e| {
        Error::new(
            ErrorCode::PatchFailed,
            format!("Failed to write {}: {}", path.display(), e),
        )
        .with_source(e)
    })?;
    Ok(true)
}

/// Apply literal replacements to a file with a one-time `.bak` backup
pub fn apply_literal_patch(path: &Path, replacements: &[Replacement]) -> Result<PatchOutcome> {
    if !path.is_file() {
        return Ok(PatchOutcome::Missing);
    }
    let changed = rewrite_file(path, true, |content| apply_replacements(content, replacements))?;
    if changed {
        tracing::info!(path = %path.display(), "Patched file");
        Ok(PatchOutcome::Applied)
    } else {
        Ok(PatchOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plugin_patches() -> Vec<Replacement> {
        vec![
            Replacement::new("natural_t", "vm_size_t"),
            Replacement::new("var params", "var _ /* params */"),
        ]
    }

    #[test]
    fn test_apply_replacements() {
        let source = "natural_t size = 0;\nvar params = [:]\n";
        let patched = apply_replacements(source, &plugin_patches());
        assert_eq!(patched, "vm_size_t size = 0;\nvar _ /* params */ = [:]\n");
        assert_eq!(apply_replacements(&patched, &plugin_patches()), patched);
    }

    #[test]
    fn test_empty_search_ignored() {
        let patched = apply_replacements("abc", &[Replacement::new("", "x")]);
        assert_eq!(patched, "abc");
    }

    #[test]
    fn test_literal_patch_with_backup() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("FPPDeviceInfoPlusPlugin.m");
        fs::write(&file, "natural_t total;\n").unwrap();

        let outcome = apply_literal_patch(&file, &plugin_patches()).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "vm_size_t total;\n");
        assert_eq!(
            fs::read_to_string(backup_path(&file)).unwrap(),
            "natural_t total;\n"
        );

        let outcome = apply_literal_patch(&file, &plugin_patches()).unwrap();
        assert_eq!(outcome, PatchOutcome::Unchanged);
    }

    #[test]
    fn test_backup_never_overwritten() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("Plugin.swift");
        fs::write(&file, "var params = 1\n").unwrap();
        apply_literal_patch(&file, &plugin_patches()).unwrap();

        fs::write(&file, "var params = 2\n").unwrap();
        apply_literal_patch(&file, &plugin_patches()).unwrap();

        assert_eq!(
            fs::read_to_string(backup_path(&file)).unwrap(),
            "var params = 1\n"
        );
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let outcome = apply_literal_patch(&temp.path().join("nope.m"), &plugin_patches()).unwrap();
        assert_eq!(outcome, PatchOutcome::Missing);
    }
}
