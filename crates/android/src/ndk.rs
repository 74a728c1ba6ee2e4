//! NDK discovery and `local.properties` repair

use crate::sdk::AndroidSdk;
use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::process::{shell_quote, ShellCommand};
use flutterkit_core::properties::{escape_path_value, update_properties_file};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Manual installation steps printed when the NDK cannot be installed automatically
pub const MANUAL_INSTALL_STEPS: [&str; 4] = [
    "Open Android Studio",
    "Settings > Appearance & Behavior > System Settings > Android SDK > SDK Tools",
    "Select 'NDK (Side by side)' and install it",
    "Selecting 'CMake' as well is recommended",
];

/// An installed NDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdkInstall {
    /// Directory name, e.g. `25.1.8937393`
    pub version: String,
    /// Full path
    pub path: PathBuf,
}

/// Order NDK version strings, newest last
///
/// Versions are compared as semver when both parse, else as plain strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// NDKs under `<sdk>/ndk` that contain `source.properties`, newest first
pub fn installed_versions(ndk_dir: &Path) -> Vec<NdkInstall> {
    let Ok(entries) = std::fs::read_dir(ndk_dir) else {
        return Vec::new();
    };
    let mut installs: Vec<NdkInstall> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join("source.properties").is_file())
        .filter_map(|path| {
            let version = path.file_name()?.to_string_lossy().into_owned();
            Some(NdkInstall { version, path })
        })
        .collect();
    installs.sort_by(|a, b| compare_versions(&b.version, &a.version));
    installs
}

/// Newest installed NDK
pub fn newest(ndk_dir: &Path) -> Option<NdkInstall> {
    installed_versions(ndk_dir).into_iter().next()
}

/// Point `android/local.properties` at `ndk_path`
pub fn write_ndk_dir(android_dir: &Path, ndk_path: &Path) -> Result<bool> {
    update_properties_file(
        &android_dir.join("local.properties"),
        "ndk.dir",
        &escape_path_value(ndk_path),
    )
}

/// `sdkmanager "ndk;<version>"`
pub fn install_command(sdk: &AndroidSdk, version: &str) -> ShellCommand {
    let program = sdk.sdkmanager().display().to_string();
    let package = format!("ndk;{}", version);
    ShellCommand::new(format!("{} {}", shell_quote(&program), shell_quote(&package)))
        .description(format!("Installing Android NDK {}", version))
        .stream()
}

fn ndk_unavailable(message: impl Into<String>) -> Error {
    Error::new(ErrorCode::NdkNotFound, message)
        .with_suggestion("Install the NDK from Android Studio's SDK Manager (SDK Tools > NDK (Side by side))")
}

/// Make sure an NDK is installed and `android/local.properties` points at it
///
/// Offers an `sdkmanager` install when `<sdk>/ndk` is missing.
pub fn ensure_ndk(android_dir: &Path, version: &str, prompter: &Prompter) -> Result<NdkInstall> {
    Status::subheader("Environment check: Android NDK");

    let sdk = AndroidSdk::require()?;
    let ndk_dir = sdk.ndk_dir();

    if !ndk_dir.is_dir() {
        Status::warning(&format!("NDK directory not found: {}", ndk_dir.display()));
        if !prompter.confirm("Install the NDK with the Android SDK manager?", false)? {
            Status::instructions("To install the NDK manually:", &MANUAL_INSTALL_STEPS);
            return Err(ndk_unavailable("Android NDK is not installed"));
        }
        println!("This can take a few minutes...");
        if !install_command(&sdk, version).run().success {
            Status::error("NDK installation failed");
            Status::instructions("Install it from Android Studio instead:", &MANUAL_INSTALL_STEPS);
            return Err(ndk_unavailable(format!("sdkmanager could not install NDK {}", version)));
        }
        Status::success("NDK installed");
    }

    let install = newest(&ndk_dir)
        .ok_or_else(|| ndk_unavailable(format!("No valid NDK version under {}", ndk_dir.display())))?;

    write_ndk_dir(android_dir, &install.path)?;
    tracing::debug!(version = %install.version, path = %install.path.display(), "Configured ndk.dir");
    Status::success(&format!("NDK configured: {}", install.path.display()));
    Ok(install)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_ndk(root: &Path, version: &str, valid: bool) {
        let dir = root.join(version);
        std::fs::create_dir_all(&dir).unwrap();
        if valid {
            std::fs::write(dir.join("source.properties"), "Pkg.Revision = x\n").unwrap();
        }
    }

    #[test]
    fn test_compare_versions_semver() {
        assert_eq!(compare_versions("25.1.8937393", "21.4.7075529"), Ordering::Greater);
        // String order would get this one wrong
        assert_eq!(compare_versions("9.0.1", "10.0.0"), Ordering::Less);
    }

    #[test]
    fn test_compare_versions_fallback() {
        assert_eq!(compare_versions("r21e", "r21d"), Ordering::Greater);
    }

    #[test]
    fn test_installed_versions_sorted() {
        let temp = TempDir::new().unwrap();
        fake_ndk(temp.path(), "21.4.7075529", true);
        fake_ndk(temp.path(), "25.1.8937393", true);
        fake_ndk(temp.path(), "26.0.0", false);

        let versions: Vec<String> = installed_versions(temp.path())
            .into_iter()
            .map(|i| i.version)
            .collect();
        assert_eq!(versions, vec!["25.1.8937393", "21.4.7075529"]);
        assert_eq!(newest(temp.path()).unwrap().version, "25.1.8937393");
    }

    #[test]
    fn test_installed_versions_missing_dir() {
        assert!(installed_versions(Path::new("/nonexistent/ndk")).is_empty());
    }

    #[test]
    fn test_write_ndk_dir() {
        let temp = TempDir::new().unwrap();
        let android = temp.path().join("android");
        std::fs::create_dir_all(&android).unwrap();
        std::fs::write(android.join("local.properties"), "sdk.dir=/opt/sdk\n").unwrap();

        let ndk = PathBuf::from("/opt/sdk/ndk/25.1.8937393");
        assert!(write_ndk_dir(&android, &ndk).unwrap());

        let content = std::fs::read_to_string(android.join("local.properties")).unwrap();
        assert_eq!(content, "sdk.dir=/opt/sdk\nndk.dir=/opt/sdk/ndk/25.1.8937393\n");
        assert!(!write_ndk_dir(&android, &ndk).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_install_command_quotes_package() {
        let sdk = AndroidSdk::at("/opt/sdk");
        let cmd = install_command(&sdk, "21.4.7075529");
        assert!(cmd.display_command().contains("'ndk;21.4.7075529'"));
    }
}
