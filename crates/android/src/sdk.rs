//! Android SDK discovery

use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::health::{CheckResult, HealthCheck};
use flutterkit_core::process::which_command;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Candidate SDK roots, in lookup order
///
/// `env` resolves environment variables so tests can supply their own.
pub fn sdk_candidates<F>(env: F, home: Option<&Path>) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = Vec::new();
    for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
            candidates.push(PathBuf::from(value));
        }
    }
    if let Some(home) = home {
        candidates.push(home.join("Library/Android/sdk"));
        candidates.push(home.join("Android/Sdk"));
        candidates.push(home.join("AppData/Local/Android/Sdk"));
    }
    candidates.push(PathBuf::from("/Applications/Android Studio.app/Contents/sdk"));
    if let Some(local) = env("LOCALAPPDATA").filter(|v| !v.trim().is_empty()) {
        candidates.push(PathBuf::from(local).join("Android").join("Sdk"));
    }
    candidates
}

/// An Android SDK installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSdk {
    root: PathBuf,
}

impl AndroidSdk {
    /// Use `root` as the SDK
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First existing SDK directory from the environment and well-known locations
    pub fn locate() -> Option<Self> {
        let home = dirs::home_dir();
        sdk_candidates(|var| std::env::var(var).ok(), home.as_deref())
            .into_iter()
            .find(|path| path.is_dir())
            .map(Self::at)
    }

    /// Like [`AndroidSdk::locate`], failing with guidance
    pub fn require() -> Result<Self> {
        Self::locate().ok_or_else(|| {
            Error::new(ErrorCode::SdkNotFound, "Android SDK not found")
                .with_suggestion("Install Android Studio or set ANDROID_HOME to your SDK directory")
        })
    }

    /// SDK root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<sdk>/ndk`
    pub fn ndk_dir(&self) -> PathBuf {
        self.root.join("ndk")
    }

    /// `sdkmanager` script under `tools/bin`
    pub fn sdkmanager(&self) -> PathBuf {
        let name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };
        self.root.join("tools").join("bin").join(name)
    }

    /// `emulator` binary inside the SDK
    pub fn emulator_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "emulator.exe" } else { "emulator" };
        self.root.join("emulator").join(name)
    }

    /// `adb` binary inside the SDK
    pub fn adb_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "adb.exe" } else { "adb" };
        self.root.join("platform-tools").join(name)
    }

    /// Prepend `emulator/` and `platform-tools/` to this process's PATH so
    /// child shells find both tools
    pub fn export_tool_paths(&self) {
        let tool_dirs = [self.root.join("emulator"), self.root.join("platform-tools")];
        let current = std::env::var_os("PATH").unwrap_or_default();
        let mut paths: Vec<PathBuf> = tool_dirs
            .into_iter()
            .filter(|d| d.is_dir() && !path_contains(&current, d))
            .collect();
        if paths.is_empty() {
            return;
        }
        paths.extend(std::env::split_paths(&current));
        match std::env::join_paths(paths) {
            Ok(joined) => {
                tracing::debug!(sdk = %self.root.display(), "Added SDK tools to PATH");
                std::env::set_var("PATH", joined);
            }
            Err(e) => tracing::warn!(error = %e, "Could not extend PATH"),
        }
    }
}

/// `emulator` on PATH, else the SDK's own binary
pub fn emulator_program(sdk: Option<&AndroidSdk>) -> Option<PathBuf> {
    which_command("emulator").or_else(|| {
        sdk.map(AndroidSdk::emulator_binary)
            .filter(|path| path.is_file())
    })
}

/// Whether PATH already contains `dir`
pub fn path_contains(path_var: &OsString, dir: &Path) -> bool {
    std::env::split_paths(path_var).any(|p| p == dir)
}

/// Health check for the SDK and its emulator
pub struct AndroidSdkCheck;

impl HealthCheck for AndroidSdkCheck {
    fn check(&self) -> CheckResult {
        let Some(sdk) = AndroidSdk::locate() else {
            return CheckResult::unhealthy("android-sdk", "Android SDK not found")
                .with_hint(Some("Install Android Studio or set ANDROID_HOME"));
        };
        let mut result = CheckResult::healthy("android-sdk")
            .with_detail("path", sdk.root().display().to_string());
        match emulator_program(Some(&sdk)) {
            Some(path) => result = result.with_detail("emulator", path.display().to_string()),
            None => {
                result = CheckResult::degraded("android-sdk", "emulator binary not found")
                    .with_detail("path", sdk.root().display().to_string())
                    .with_hint(Some("Install the Android Emulator from the SDK Manager"));
            }
        }
        if sdk.ndk_dir().is_dir() {
            result = result.with_detail("ndk", sdk.ndk_dir().display().to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_order() {
        let env: HashMap<&str, &str> = [
            ("ANDROID_HOME", "/opt/android"),
            ("ANDROID_SDK_ROOT", "/opt/sdk-root"),
            ("LOCALAPPDATA", "C:/Users/me/AppData/Local"),
        ]
        .into_iter()
        .collect();
        let home = PathBuf::from("/home/me");

        let candidates = sdk_candidates(|v| env.get(v).map(|s| s.to_string()), Some(&home));
        assert_eq!(candidates[0], PathBuf::from("/opt/android"));
        assert_eq!(candidates[1], PathBuf::from("/opt/sdk-root"));
        assert_eq!(candidates[2], home.join("Library/Android/sdk"));
        assert_eq!(candidates[3], home.join("Android/Sdk"));
        assert_eq!(
            candidates.last().unwrap(),
            &PathBuf::from("C:/Users/me/AppData/Local").join("Android").join("Sdk")
        );
    }

    #[test]
    fn test_candidates_skip_empty_env() {
        let candidates = sdk_candidates(|_| Some(String::new()), None);
        assert_eq!(
            candidates,
            vec![PathBuf::from("/Applications/Android Studio.app/Contents/sdk")]
        );
    }

    #[test]
    fn test_sdk_paths() {
        let temp = TempDir::new().unwrap();
        let sdk = AndroidSdk::at(temp.path());
        assert_eq!(sdk.ndk_dir(), temp.path().join("ndk"));
        assert!(sdk.sdkmanager().starts_with(temp.path().join("tools").join("bin")));
        assert!(sdk.emulator_binary().starts_with(temp.path().join("emulator")));
        assert!(sdk.adb_binary().starts_with(temp.path().join("platform-tools")));
    }

    #[test]
    fn test_path_contains() {
        let dir = PathBuf::from("/opt/sdk/emulator");
        let joined = std::env::join_paths([PathBuf::from("/usr/bin"), dir.clone()]).unwrap();
        assert!(path_contains(&joined, &dir));
        assert!(!path_contains(&joined, Path::new("/opt/sdk/platform-tools")));
    }
}
