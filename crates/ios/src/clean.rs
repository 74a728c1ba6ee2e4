//! iOS build cleanup and dependency repair

use crate::{audioplayers, cocoapods};
use flutterkit_cli::output::Status;
use flutterkit_core::config::Config;
use flutterkit_core::error::{Result, ResultExt};
use flutterkit_core::flutter::FlutterProject;
use std::fs;
use std::path::{Path, PathBuf};

/// Build leftovers removed before every iOS build
pub const STALE_PATHS: [&str; 8] = [
    "build/ios/Debug-iphoneos",
    "build/ios/Release-iphoneos",
    "ios/Pods",
    "ios/Flutter/Flutter.podspec",
    "ios/Flutter/ephemeral",
    ".dart_tool/flutter_build",
    "build/ios/iphonesimulator",
    "build/ios/iphoneos",
];

/// Paths removed by the deep clean
pub const DEEP_CLEAN_PATHS: [&str; 7] = [
    "build",
    "ios/build",
    "ios/Pods",
    "ios/Flutter/Flutter.podspec",
    "ios/Podfile.lock",
    "ios/.symlinks",
    "ios/Flutter/ephemeral",
];

/// CocoaPods state removed before a dependency reinstall
const POD_STATE_PATHS: [&str; 4] = [
    "ios/Pods",
    "ios/.symlinks",
    "ios/Podfile.lock",
    "ios/Flutter/Flutter.podspec",
];

/// Module cache entries matching these (case-insensitive) are dropped
const MODULE_CACHE_TARGETS: [&str; 4] = ["flutter", "audioplayer", "audio", "swift"];

/// Remove a file or directory tree, returning whether something was removed
pub fn remove_path(path: &Path) -> bool {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return false;
    };
    match result {
        Ok(()) => {
            println!("  Removed {}", path.display());
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove");
            Status::warning(&format!("Could not remove {}: {}", path.display(), e));
            false
        }
    }
}

/// Remove each relative path under `root`, returning the removed ones
pub fn remove_all(root: &Path, paths: &[&str]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| root.join(p))
        .filter(|p| remove_path(p))
        .collect()
}

/// Remove stale iOS build output
pub fn remove_stale(root: &Path) -> Vec<PathBuf> {
    Status::subheader("Removing stale build files");
    remove_all(root, &STALE_PATHS)
}

/// `~/Library/Developer/Xcode/DerivedData`
pub fn derived_data_dir(home: &Path) -> PathBuf {
    home.join("Library/Developer/Xcode/DerivedData")
}

/// DerivedData folders that belong to a Runner project
pub fn runner_derived_data(derived_data: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(derived_data) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("Runner"))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

/// Module cache folders for Flutter, audio and Swift modules
pub fn module_cache_entries(derived_data: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(derived_data.join("ModuleCache.noindex")) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            MODULE_CACHE_TARGETS.iter().any(|t| name.contains(t))
        })
        .map(|e| e.path())
        .collect()
}

/// Clear Xcode's caches for the Runner project
pub fn clear_xcode_caches(home: &Path) -> usize {
    let derived = derived_data_dir(home);
    let mut removed = runner_derived_data(&derived)
        .iter()
        .filter(|p| remove_path(p))
        .count();
    removed += module_cache_entries(&derived)
        .iter()
        .filter(|p| remove_path(p))
        .count();
    removed
}

/// Remove leftover backup files from the known problem packages in the pub cache
pub fn clean_problem_packages(pub_cache: &Path, prefixes: &[String]) -> usize {
    let Ok(entries) = fs::read_dir(pub_cache) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            e.path().is_dir() && prefixes.iter().any(|p| name.starts_with(p.as_str()))
        })
        .map(|e| audioplayers::remove_backups(&e.path()))
        .sum()
}

/// Remove build output, Xcode caches, pod state and pub-cache backups, then
/// `flutter clean`
pub fn deep_clean(project: &FlutterProject, config: &Config) {
    Status::header("Deep clean");
    remove_all(project.root(), &DEEP_CLEAN_PATHS);

    if let Some(home) = dirs::home_dir() {
        let removed = clear_xcode_caches(&home);
        if removed == 0 {
            println!("  No Xcode caches for Runner found");
        }
    }

    let removed = clean_problem_packages(&config.pub_cache_dir(), &config.schema.ios.problem_packages);
    if removed > 0 {
        println!("  Removed {} backup entries from the pub cache", removed);
    }

    project.clean_unless(false);
    Status::success("Deep clean finished");
}

/// Move `pubspec.lock` to `pubspec.lock.bak`
pub fn reset_pubspec_lock(root: &Path) -> Result<bool> {
    let lock = root.join("pubspec.lock");
    if !lock.is_file() {
        return Ok(false);
    }
    fs::rename(&lock, root.join("pubspec.lock.bak")).context("Resetting pubspec.lock")?;
    Status::success("Reset pubspec.lock (saved as pubspec.lock.bak)");
    Ok(true)
}

/// Re-resolve Flutter and CocoaPods dependencies from scratch
///
/// Every step only warns on failure; the build that follows reports the
/// real problem.
pub fn repair_dependencies(project: &FlutterProject, config: &Config) -> Result<()> {
    Status::header("Repairing dependencies");
    let timeouts = &config.schema.timeouts;

    reset_pubspec_lock(project.root())?;
    let podspecs =
        audioplayers::normalize_podspecs(&config.pub_cache_dir(), &config.schema.ios.deployment_target);
    if !podspecs.is_empty() {
        Status::success(&format!("Normalised {} podspec(s)", podspecs.len()));
    }

    let repair = project
        .command("flutter pub cache repair")
        .description("Repairing the pub cache")
        .timeout(Config::secs(timeouts.fix))
        .spinner()
        .run();
    if !repair.success {
        Status::warning("flutter pub cache repair failed, continuing");
    }

    project.clean_unless(false);
    if let Err(e) = project.pub_get(Config::secs(timeouts.pub_get)) {
        Status::warning(&format!("flutter pub get failed: {}", e));
    }

    remove_all(project.root(), &POD_STATE_PATHS);
    let ios_dir = project.ios_dir();
    cocoapods::deintegrate(&ios_dir);
    if !cocoapods::install(&ios_dir, true, Config::secs(timeouts.pod_install)).success {
        Status::warning("pod install --repo-update failed, continuing");
    }

    Status::success("Dependency repair finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_stale() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("ios/Pods/Alamofire")).unwrap();
        fs::create_dir_all(root.join("build/ios/iphoneos")).unwrap();
        fs::create_dir_all(root.join("ios/Flutter")).unwrap();
        fs::write(root.join("ios/Flutter/Flutter.podspec"), "spec").unwrap();
        fs::write(root.join("ios/Podfile"), "platform :ios").unwrap();

        let removed = remove_stale(root);
        assert_eq!(removed.len(), 3);
        assert!(!root.join("ios/Pods").exists());
        assert!(!root.join("ios/Flutter/Flutter.podspec").exists());
        assert!(root.join("ios/Podfile").exists());
        assert!(root.join("build/ios").exists());
    }

    #[test]
    fn test_remove_path_missing() {
        assert!(!remove_path(Path::new("/nonexistent/flutterkit/path")));
    }

    #[test]
    fn test_xcode_cache_discovery() {
        let temp = TempDir::new().unwrap();
        let derived = derived_data_dir(temp.path());
        fs::create_dir_all(derived.join("Runner-abcdef")).unwrap();
        fs::create_dir_all(derived.join("OtherApp-123456")).unwrap();
        fs::create_dir_all(derived.join("ModuleCache.noindex/Flutter-1A2B")).unwrap();
        fs::create_dir_all(derived.join("ModuleCache.noindex/UIKit-3C4D")).unwrap();

        assert_eq!(runner_derived_data(&derived), vec![derived.join("Runner-abcdef")]);
        assert_eq!(
            module_cache_entries(&derived),
            vec![derived.join("ModuleCache.noindex/Flutter-1A2B")]
        );

        assert_eq!(clear_xcode_caches(temp.path()), 2);
        assert!(derived.join("OtherApp-123456").exists());
        assert!(derived.join("ModuleCache.noindex/UIKit-3C4D").exists());
    }

    #[test]
    fn test_clean_problem_packages() {
        let temp = TempDir::new().unwrap();
        let vibration = temp.path().join("vibration-1.9.0/ios/Classes");
        fs::create_dir_all(&vibration).unwrap();
        fs::write(vibration.join("VibrationPluginSwift.swift.bak"), "x").unwrap();
        fs::write(vibration.join("VibrationPluginSwift.swift"), "x").unwrap();
        let unrelated = temp.path().join("http-1.2.0");
        fs::create_dir_all(&unrelated).unwrap();
        fs::write(unrelated.join("README.md.bak"), "x").unwrap();

        let removed = clean_problem_packages(temp.path(), &["vibration".to_string()]);
        assert_eq!(removed, 1);
        assert!(vibration.join("VibrationPluginSwift.swift").exists());
        assert!(unrelated.join("README.md.bak").exists());
    }

    #[test]
    fn test_reset_pubspec_lock() {
        let temp = TempDir::new().unwrap();
        assert!(!reset_pubspec_lock(temp.path()).unwrap());
        fs::write(temp.path().join("pubspec.lock"), "packages: {}\n").unwrap();
        assert!(reset_pubspec_lock(temp.path()).unwrap());
        assert!(!temp.path().join("pubspec.lock").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("pubspec.lock.bak")).unwrap(),
            "packages: {}\n"
        );
    }
}
