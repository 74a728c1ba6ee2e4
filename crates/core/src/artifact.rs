//! Build artifact location and timestamped copies

use crate::error::{Error, ErrorCode, Result, ResultExt};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Timestamp format used in artifact and log file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time formatted for file names
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn artifact_name(prefix: &str, extension: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format(TIMESTAMP_FORMAT), extension)
}

/// First candidate that exists as a file
pub fn first_existing<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

/// A copied build artifact
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Where the copy lives
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
}

impl Artifact {
    /// Size in mebibytes
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Copy `source` into `dest_dir` under a timestamped name
pub fn copy_artifact(source: &Path, dest_dir: &Path, prefix: &str) -> Result<Artifact> {
    if !source.is_file() {
        return Err(Error::new(
            ErrorCode::ArtifactNotFound,
            format!("Build artifact not found: {}", source.display()),
        ));
    }

    fs::create_dir_all(dest_dir).context(format!("Creating {}", dest_dir.display()))?;

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let dest = dest_dir.join(artifact_name(prefix, extension, &Local::now()));

    fs::copy(source, &dest).context(format!(
        "Copying {} to {}",
        source.display(),
        dest.display()
    ))?;
    let size_bytes = fs::metadata(&dest)?.len();

    tracing::info!(artifact = %dest.display(), size_bytes, "Artifact copied");
    Ok(Artifact {
        path: dest,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_name() {
        let at = Local.with_ymd_and_hms(2025, 5, 12, 4, 21, 26).unwrap();
        assert_eq!(
            artifact_name("gyroscope_app", "apk", &at),
            "gyroscope_app_20250512_042126.apk"
        );
    }

    #[test]
    fn test_first_existing_prefers_order() {
        let temp = TempDir::new().unwrap();
        let split = temp.path().join("app-armeabi-v7a-release.apk");
        let fat = temp.path().join("app-release.apk");
        fs::write(&fat, b"fat").unwrap();

        assert_eq!(first_existing(&[&split, &fat]), Some(fat.clone()));

        fs::write(&split, b"split").unwrap();
        assert_eq!(first_existing(&[&split, &fat]), Some(split));
    }

    #[test]
    fn test_copy_artifact() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app-debug.apk");
        fs::write(&source, vec![0u8; 2048]).unwrap();

        let artifact = copy_artifact(&source, &temp.path().join("output/android"), "demo").unwrap();
        assert!(artifact.path.exists());
        assert_eq!(artifact.size_bytes, 2048);
        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("demo_"));
        assert!(name.ends_with(".apk"));
    }

    #[test]
    fn test_copy_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let err = copy_artifact(&temp.path().join("none.apk"), temp.path(), "demo").unwrap_err();
        assert_eq!(err.code, ErrorCode::ArtifactNotFound);
    }
}
