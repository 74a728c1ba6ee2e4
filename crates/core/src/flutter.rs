//! Flutter CLI wrappers
//!
//! [`FlutterProject`] anchors every `flutter` invocation to the project root
//! and [`parse_devices`] reads `flutter devices` output.

use crate::error::{Error, ErrorCode, Result};
use crate::health::probe_version;
use crate::process::{CommandResult, ShellCommand};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

static EMULATOR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"emulator-\d+").expect("valid emulator id regex"));

/// Flutter build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// `--debug`
    Debug,
    /// `--release`
    #[default]
    Release,
}

impl BuildMode {
    /// Pick the mode from a `--debug` flag
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            BuildMode::Debug
        } else {
            BuildMode::Release
        }
    }

    /// The flag passed to `flutter build`
    pub fn flag(&self) -> &'static str {
        match self {
            BuildMode::Debug => "--debug",
            BuildMode::Release => "--release",
        }
    }

    /// Whether this is a release build
    pub fn is_release(&self) -> bool {
        matches!(self, BuildMode::Release)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => write!(f, "debug"),
            BuildMode::Release => write!(f, "release"),
        }
    }
}

/// Check that `flutter` is installed and return its version line
pub fn check_installation() -> Result<String> {
    probe_version("flutter", &["--version"]).ok_or_else(|| {
        Error::tool_missing(
            "Flutter",
            "Install Flutter from https://flutter.dev/docs/get-started/install and add it to PATH",
        )
    })
}

/// First line of `flutter --version`, or `Unknown`
pub fn version() -> String {
    probe_version("flutter", &["--version"]).unwrap_or_else(|| "Unknown".to_string())
}

/// A Flutter project on disk
#[derive(Debug, Clone)]
pub struct FlutterProject {
    root: PathBuf,
}

impl FlutterProject {
    /// Open a project, requiring `lib/main.dart` under `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.join("lib").join("main.dart").is_file() {
            return Err(Error::new(
                ErrorCode::NotAFlutterProject,
                format!("{} does not look like a Flutter project", root.display()),
            )
            .with_suggestion("Run this from the Flutter project root (the directory with lib/main.dart)"));
        }
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Ok(Self { root })
    }

    /// Project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `android/` directory
    pub fn android_dir(&self) -> PathBuf {
        self.root.join("android")
    }

    /// `ios/` directory
    pub fn ios_dir(&self) -> PathBuf {
        self.root.join("ios")
    }

    /// A shell command that runs in the project root
    pub fn command(&self, command: impl Into<String>) -> ShellCommand {
        ShellCommand::new(command).current_dir(&self.root)
    }

    /// `flutter clean`
    pub fn clean(&self) -> CommandResult {
        self.command("flutter clean")
            .description("Cleaning Flutter project")
            .spinner()
            .run()
    }

    /// `flutter clean` where failure only warns
    pub fn clean_unless(&self, skip: bool) {
        if skip {
            println!("Skipping clean step");
            return;
        }
        if !self.clean().success {
            tracing::warn!("flutter clean failed, continuing");
            eprintln!("Warning: clean failed, continuing with the build");
        }
    }

    /// `flutter pub get`
    pub fn pub_get(&self, timeout: Duration) -> Result<CommandResult> {
        self.command("flutter pub get")
            .description("Resolving Flutter dependencies")
            .timeout(timeout)
            .spinner()
            .run_checked()
    }

    /// `flutter doctor -v`
    pub fn doctor(&self, timeout: Duration) -> CommandResult {
        self.command("flutter doctor -v")
            .description("Flutter environment diagnosis")
            .timeout(timeout)
            .stream()
            .run()
    }

    /// `flutter config --enable-web`
    pub fn enable_web(&self) -> CommandResult {
        self.command("flutter config --enable-web")
            .description("Enabling Flutter web support")
            .capture()
            .run()
    }

    /// `flutter devices`, parsed
    pub fn devices(&self) -> Vec<FlutterDevice> {
        let result = self
            .command("flutter devices")
            .description("Listing Flutter devices")
            .capture()
            .run();
        if result.success {
            parse_devices(&result.stdout)
        } else {
            Vec::new()
        }
    }
}

/// One line of `flutter devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlutterDevice {
    /// Display name
    pub name: String,
    /// Device id passed to `flutter run -d`
    pub id: String,
    /// Target platform, e.g. `android-arm64`
    pub platform: String,
    /// Remaining columns
    pub details: String,
}

impl FlutterDevice {
    /// Whether this is an Android emulator
    pub fn is_android_emulator(&self) -> bool {
        let line = format!("{} {} {}", self.name, self.id, self.details).to_lowercase();
        line.contains("emulator") && self.platform.to_lowercase().contains("android")
    }
}

/// Parse `flutter devices` output (`name • id • platform • details`)
pub fn parse_devices(output: &str) -> Vec<FlutterDevice> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('•').map(str::trim).collect();
            if parts.len() < 3 || parts[1].is_empty() {
                return None;
            }
            Some(FlutterDevice {
                name: parts[0].to_string(),
                id: parts[1].to_string(),
                platform: parts[2].to_string(),
                details: parts[3..].join(" • "),
            })
        })
        .collect()
}

/// Device id of the first Android emulator in `flutter devices` output
///
/// Prefers an `emulator-NNNN` token on the line, falling back to the second
/// `•` column.
pub fn find_emulator_id(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("emulator") && lower.contains("android")
        })
        .find_map(|line| {
            if let Some(m) = EMULATOR_ID.find(line) {
                return Some(m.as_str().to_string());
            }
            line.split('•')
                .nth(1)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEVICES: &str = "\
Found 3 connected devices:
  sdk gphone64 arm64 (mobile) • emulator-5554 • android-arm64  • Android 13 (API 33) (emulator)
  macOS (desktop)             • macos         • darwin-arm64   • macOS 14.4 23E214 darwin-arm64
  Chrome (web)                • chrome        • web-javascript • Google Chrome 124.0.6367.91
";

    #[test]
    fn test_build_mode() {
        assert_eq!(BuildMode::from_debug_flag(true).flag(), "--debug");
        assert_eq!(BuildMode::from_debug_flag(false).flag(), "--release");
        assert!(BuildMode::Release.is_release());
        assert_eq!(BuildMode::Debug.to_string(), "debug");
    }

    #[test]
    fn test_parse_devices() {
        let devices = parse_devices(DEVICES);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].id, "emulator-5554");
        assert_eq!(devices[0].platform, "android-arm64");
        assert!(devices[0].is_android_emulator());
        assert_eq!(devices[2].name, "Chrome (web)");
        assert!(!devices[2].is_android_emulator());
    }

    #[test]
    fn test_find_emulator_id() {
        assert_eq!(find_emulator_id(DEVICES).as_deref(), Some("emulator-5554"));
    }

    #[test]
    fn test_find_emulator_id_column_fallback() {
        let output = "Pixel Emulator (mobile) • pixel_custom • android-x64 • Android 14 (emulator)\n";
        assert_eq!(find_emulator_id(output).as_deref(), Some("pixel_custom"));
    }

    #[test]
    fn test_find_emulator_id_none() {
        assert_eq!(find_emulator_id("Chrome (web) • chrome • web-javascript • Chrome\n"), None);
        assert_eq!(find_emulator_id(""), None);
    }

    #[test]
    fn test_open_requires_main_dart() {
        let temp = TempDir::new().unwrap();
        let err = FlutterProject::open(temp.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAFlutterProject);

        std::fs::create_dir_all(temp.path().join("lib")).unwrap();
        std::fs::write(temp.path().join("lib/main.dart"), "void main() {}").unwrap();
        let project = FlutterProject::open(temp.path()).unwrap();
        assert!(project.android_dir().ends_with("android"));
        assert!(project.ios_dir().ends_with("ios"));
    }
}
