//! Gradle NDK version repair
//!
//! When `flutter run` fails because `ndk.dir` disagrees with
//! `android.ndkVersion`, the installed version is pulled from the error text
//! and written into every Gradle file under `android/`.

use flutterkit_core::error::Result;
use flutterkit_core::patch::rewrite_file;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static HAD_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"at.+had version\s+\[([0-9.]+)\]").expect("valid had-version regex")
});

static NDK_VERSION_IN_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NDK.+version\s+\[([0-9.]+)\]").expect("valid ndk error regex"));

static NDK_VERSION_GROOVY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ndkVersion\s+['"].*?['"]"#).expect("valid ndkVersion regex"));

static NDK_VERSION_KTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ndkVersion\s*=\s*".*?""#).expect("valid kts ndkVersion regex"));

static NDK_DIR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*ndk\.dir=.*$").expect("valid ndk.dir regex"));

/// Line that replaces an active `ndk.dir=` entry
pub const DISABLED_NDK_DIR: &str = "#ndk.dir=disabled_by_script";

/// Whether build output reports an `ndk.dir` / `ndkVersion` disagreement
pub fn is_ndk_mismatch(output: &str) -> bool {
    output.contains("NDK from ndk.dir") && output.contains("disagrees with android.ndkVersion")
}

/// Installed NDK version named in a mismatch error
pub fn extract_installed_ndk(output: &str) -> Option<String> {
    [&*HAD_VERSION, &*NDK_VERSION_IN_ERROR]
        .iter()
        .find_map(|re| re.captures(output))
        .map(|caps| caps[1].to_string())
}

/// Pin `ndkVersion` to `version` and comment out active `ndk.dir` lines
pub fn rewrite_ndk_content(content: &str, version: &str) -> String {
    let mut out = content.to_string();
    if out.contains("ndkVersion") {
        out = NDK_VERSION_KTS
            .replace_all(&out, format!("ndkVersion = \"{}\"", version).as_str())
            .into_owned();
        out = NDK_VERSION_GROOVY
            .replace_all(&out, format!("ndkVersion \"{}\"", version).as_str())
            .into_owned();
    }
    if out.contains("ndk.dir") {
        out = NDK_DIR_LINE.replace_all(&out, DISABLED_NDK_DIR).into_owned();
    }
    out
}

fn is_candidate(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".gradle") || name.ends_with(".gradle.kts") || name.ends_with(".properties")
}

/// Rewrite every `*.gradle`, `*.gradle.kts` and `*.properties` under
/// `android_dir`, returning the files that changed
pub fn rewrite_ndk_version(android_dir: &Path, version: &str) -> Result<Vec<PathBuf>> {
    let mut modified = Vec::new();
    if !android_dir.is_dir() {
        tracing::warn!(dir = %android_dir.display(), "Android directory not found");
        return Ok(modified);
    }

    let walker = WalkDir::new(android_dir).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir() && (name == "build" || name == ".gradle"))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_candidate(entry.path()) {
            continue;
        }
        match rewrite_file(entry.path(), false, |content| rewrite_ndk_content(content, version)) {
            Ok(true) => {
                tracing::info!(file = %entry.path().display(), version, "Pinned NDK version");
                modified.push(entry.path().to_path_buf());
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(file = %entry.path().display(), error = %e, "Skipping file"),
        }
    }

    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MISMATCH: &str = "\
FAILURE: Build failed with an exception.
* What went wrong:
Execution failed for task ':app:configureCMakeDebug[arm64-v8a]'.
> NDK from ndk.dir at /Users/dev/Library/Android/sdk/ndk/25.1.8937393 had version [25.1.8937393] which disagrees with android.ndkVersion [23.1.7779620]
";

    #[test]
    fn test_detect_mismatch() {
        assert!(is_ndk_mismatch(MISMATCH));
        assert!(!is_ndk_mismatch("BUILD SUCCESSFUL"));
    }

    #[test]
    fn test_extract_installed_ndk() {
        assert_eq!(extract_installed_ndk(MISMATCH).as_deref(), Some("25.1.8937393"));
        assert_eq!(extract_installed_ndk("no versions here"), None);
    }

    #[test]
    fn test_extract_without_location() {
        let output = "NDK from ndk.dir had version [26.1.10909125] which disagrees with android.ndkVersion [25.1.8937393]";
        assert_eq!(extract_installed_ndk(output).as_deref(), Some("26.1.10909125"));
    }

    #[test]
    fn test_rewrite_groovy() {
        let gradle = "android {\n    compileSdkVersion 34\n    ndkVersion '23.1.7779620'\n}\n";
        let out = rewrite_ndk_content(gradle, "25.1.8937393");
        assert_eq!(
            out,
            "android {\n    compileSdkVersion 34\n    ndkVersion \"25.1.8937393\"\n}\n"
        );
    }

    #[test]
    fn test_rewrite_kts() {
        let gradle = "android {\n    ndkVersion = \"23.1.7779620\"\n}\n";
        let out = rewrite_ndk_content(gradle, "25.1.8937393");
        assert!(out.contains("ndkVersion = \"25.1.8937393\""));
    }

    #[test]
    fn test_rewrite_disables_ndk_dir_once() {
        let props = "sdk.dir=/opt/sdk\nndk.dir=/opt/sdk/ndk/25.1.8937393\n";
        let once = rewrite_ndk_content(props, "25.1.8937393");
        assert_eq!(once, "sdk.dir=/opt/sdk\n#ndk.dir=disabled_by_script\n");
        assert_eq!(rewrite_ndk_content(&once, "25.1.8937393"), once);
    }

    #[test]
    fn test_rewrite_tree() {
        let temp = TempDir::new().unwrap();
        let android = temp.path().join("android");
        std::fs::create_dir_all(android.join("app")).unwrap();
        std::fs::create_dir_all(android.join("app/build/intermediates")).unwrap();
        std::fs::write(
            android.join("app/build.gradle"),
            "android {\n    ndkVersion \"23.1.7779620\"\n}\n",
        )
        .unwrap();
        std::fs::write(android.join("local.properties"), "ndk.dir=/old\n").unwrap();
        std::fs::write(android.join("settings.gradle"), "include ':app'\n").unwrap();
        std::fs::write(
            android.join("app/build/intermediates/x.properties"),
            "ndk.dir=/old\n",
        )
        .unwrap();

        let mut modified = rewrite_ndk_version(&android, "25.1.8937393").unwrap();
        modified.sort();
        assert_eq!(
            modified,
            vec![android.join("app/build.gradle"), android.join("local.properties")]
        );
        assert_eq!(
            std::fs::read_to_string(android.join("app/build/intermediates/x.properties")).unwrap(),
            "ndk.dir=/old\n"
        );
        assert!(rewrite_ndk_version(&android, "25.1.8937393").unwrap().is_empty());
    }

    #[test]
    fn test_rewrite_missing_dir() {
        assert!(rewrite_ndk_version(Path::new("/nonexistent/android"), "1.0").unwrap().is_empty());
    }
}
