//! Literal patches for plugin sources in the pub cache

use flutterkit_cli::output::Status;
use flutterkit_core::config::PatchTarget;
use flutterkit_core::patch::{apply_literal_patch, PatchOutcome};
use std::path::{Path, PathBuf};

/// Result of one patch target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Patched file
    pub path: PathBuf,
    /// What happened
    pub outcome: PatchOutcome,
}

/// Full path of a target's file under `pub_cache`
pub fn target_path(pub_cache: &Path, target: &PatchTarget) -> PathBuf {
    pub_cache.join(&target.package).join(&target.file)
}

/// Apply every target, returning one report per target
///
/// Failures are reported and skipped; the build carries on either way.
pub fn apply_all(pub_cache: &Path, targets: &[PatchTarget]) -> Vec<PatchReport> {
    Status::subheader("Patching plugin sources to silence warnings");
    let mut reports = Vec::new();
    for target in targets {
        let path = target_path(pub_cache, target);
        match apply_literal_patch(&path, &target.replacements) {
            Ok(outcome) => {
                if outcome == PatchOutcome::Applied {
                    Status::success(&format!("Patched {}", path.display()));
                }
                reports.push(PatchReport { path, outcome });
            }
            Err(e) => {
                tracing::warn!(package = %target.package, error = %e, "Patch failed");
                Status::warning(&format!("Patch failed ({}): {}", target.package, e));
            }
        }
    }
    if !reports.iter().any(|r| r.outcome == PatchOutcome::Applied) {
        println!("No patch targets found, or already patched");
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use flutterkit_core::config::Config;
    use flutterkit_core::patch::backup_path;
    use tempfile::TempDir;

    #[test]
    fn test_apply_default_targets() {
        let temp = TempDir::new().unwrap();
        let targets = Config::default().schema.ios.patches;

        let device_info = target_path(temp.path(), &targets[0]);
        std::fs::create_dir_all(device_info.parent().unwrap()).unwrap();
        std::fs::write(&device_info, "natural_t size = 0;\n").unwrap();

        let reports = apply_all(temp.path(), &targets);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, PatchOutcome::Applied);
        assert_eq!(reports[1].outcome, PatchOutcome::Missing);

        assert_eq!(std::fs::read_to_string(&device_info).unwrap(), "vm_size_t size = 0;\n");
        assert_eq!(
            std::fs::read_to_string(backup_path(&device_info)).unwrap(),
            "natural_t size = 0;\n"
        );

        let again = apply_all(temp.path(), &targets);
        assert_eq!(again[0].outcome, PatchOutcome::Unchanged);
    }
}
