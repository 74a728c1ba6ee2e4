//! audioplayers_darwin workarounds
//!
//! Last-resort fixes for the audioplayers_darwin plugin when its Swift
//! sources do not compile: podspec normalisation, stub implementations of
//! the plugin classes, and removal of stray backup files that Xcode would
//! otherwise pick up. Originals are copied into a project-local
//! `swift_backups/` directory before anything is overwritten.

use chrono::{DateTime, Local};
use flutterkit_cli::output::Status;
use flutterkit_core::artifact::TIMESTAMP_FORMAT;
use flutterkit_core::error::{Result, ResultExt};
use flutterkit_core::patch::rewrite_file;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Package directory prefix in the pub cache
pub const PACKAGE_PREFIX: &str = "audioplayers_darwin";

/// Version tried first
pub const PREFERRED_PACKAGE: &str = "audioplayers_darwin-5.0.2";

/// Project-local directory for Swift originals
pub const BACKUP_DIR: &str = "swift_backups";

static PODSPEC_PLATFORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"s\.platform\s*=\s*:ios.*").expect("valid podspec platform regex"));

static PODSPEC_XCCONFIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"s\.pod_target_xcconfig.*=.*\{.*"DEFINES_MODULE""#).expect("valid podspec xcconfig regex")
});

const PLUGIN_STUB: &str = r#"
import Flutter
import AVFoundation

public class SwiftAudioplayersDarwinPlugin: NSObject, FlutterPlugin {
  private var players = [String: WrappedMediaPlayer]()

  public static func register(with registrar: FlutterPluginRegistrar) {
    let channel = FlutterMethodChannel(name: "xyz.luan/audioplayers", binaryMessenger: registrar.messenger())
    let instance = SwiftAudioplayersDarwinPlugin()
    registrar.addMethodCallDelegate(instance, channel: channel)
  }

  public func handle(_ call: FlutterMethodCall, result: @escaping FlutterResult) {
    switch call.method {
    case "create":
      guard let args = call.arguments as? [String: Any],
            let playerId = args["playerId"] as? String else {
        result(FlutterError(code: "INVALID_ARGS", message: "Invalid arguments", details: nil))
        return
      }
      let streamHandler = AudioPlayersStreamHandler()
      players[playerId] = WrappedMediaPlayer(playerId: playerId, streamHandler: streamHandler)
      result(nil)
    case "pause", "stop", "release", "dispose":
      result(nil)
    case "play", "resume":
      result(1)
    case "setVolume", "setReleaseMode", "setPlaybackRate", "seek":
      result(nil)
    case "getCurrentPosition", "getDuration":
      result(0)
    case "setSourceUrl", "setSourceBytes":
      result(nil)
    default:
      result(FlutterMethodNotImplemented)
    }
  }
}
"#;

const STREAM_HANDLER_STUB: &str = r#"
import Flutter
import Foundation

public class AudioPlayersStreamHandler: NSObject, FlutterStreamHandler {
    public func onListen(withArguments arguments: Any?, eventSink events: @escaping FlutterEventSink) -> FlutterError? {
        return nil
    }
    public func onCancel(withArguments arguments: Any?) -> FlutterError? {
        return nil
    }
}
"#;

const WRAPPED_PLAYER_STUB: &str = r#"
import Foundation
import AVFoundation
import Flutter

public class WrappedMediaPlayer {
    let playerId: String
    let streamHandler: AudioPlayersStreamHandler

    init(playerId: String, streamHandler: AudioPlayersStreamHandler) {
        self.playerId = playerId
        self.streamHandler = streamHandler
    }

    public func play() {}
    public func pause() {}
    public func stop() {}
    public func release() {}
    public func setVolume(volume: Double) {}
    public func setPlaybackRate(rate: Double) {}
}
"#;

const AUDIO_CONTEXT_STUB: &str = r#"
import Foundation
import AVFoundation

public class AudioContext {
    public init() {}
}
"#;

/// Stubbed sources under `ios/Classes`, and whether they are only replaced
/// when already present
const STUBS: [(&str, &str, bool); 4] = [
    ("SwiftAudioplayersDarwinPlugin", PLUGIN_STUB, true),
    ("AudioPlayersStreamHandler", STREAM_HANDLER_STUB, false),
    ("WrappedMediaPlayer", WRAPPED_PLAYER_STUB, true),
    ("AudioContext", AUDIO_CONTEXT_STUB, true),
];

/// Every audioplayers_darwin package directory in the pub cache
pub fn package_dirs(pub_cache: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&pub_cache.to_string_lossy()),
        PACKAGE_PREFIX
    );
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = paths.filter_map(|p| p.ok()).filter(|p| p.is_dir()).collect();
    dirs.sort();
    dirs
}

/// The package whose `ios/Classes` should be stubbed
///
/// [`PREFERRED_PACKAGE`] wins when present, otherwise the first match.
pub fn find_package(pub_cache: &Path) -> Option<PathBuf> {
    let preferred = pub_cache.join(PREFERRED_PACKAGE);
    if preferred.join("ios/Classes").is_dir() {
        return Some(preferred);
    }
    package_dirs(pub_cache)
        .into_iter()
        .find(|dir| dir.join("ios/Classes").is_dir())
}

/// Directory holding the package's podspec, for a Podfile `:path`
pub fn podspec_dir(package_dir: &Path) -> PathBuf {
    WalkDir::new(package_dir)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().ends_with(".podspec"))
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
        .unwrap_or_else(|| package_dir.to_path_buf())
}

/// Whether a file name looks like a leftover backup
pub fn is_backup_file(name: &str) -> bool {
    name.ends_with(".bak") || name.ends_with(".original") || name.contains(".bak.")
}

/// Remove `backups/` directories and backup files inside a package
///
/// Returns the number of entries removed; individual failures only warn.
pub fn remove_backups(package_dir: &Path) -> usize {
    let mut removed = 0;
    let mut backup_dirs = Vec::new();
    let mut backup_files = Vec::new();
    for entry in WalkDir::new(package_dir).into_iter().filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() && name == "backups" {
            backup_dirs.push(entry.path().to_path_buf());
        } else if entry.file_type().is_file() && is_backup_file(&name) {
            backup_files.push(entry.path().to_path_buf());
        }
    }
    for dir in backup_dirs {
        match fs::remove_dir_all(&dir) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %dir.display(), error = %e, "Could not remove"),
        }
    }
    for file in backup_files.into_iter().filter(|f| f.exists()) {
        match fs::remove_file(&file) {
            Ok(()) => {
                println!("  Removed {}", file.display());
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %file.display(), error = %e, "Could not remove"),
        }
    }
    removed
}

/// `<Stem>_<YYYYmmdd_HHMMSS>.swift`
pub fn backup_name(stem: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}.swift", stem, at.format(TIMESTAMP_FORMAT))
}

/// Replace the plugin's Swift sources with stubs
///
/// Returns the files written.
pub fn install_stubs(package_dir: &Path, backup_dir: &Path) -> Result<Vec<PathBuf>> {
    Status::subheader("Replacing audioplayers_darwin Swift sources with stubs");
    let classes = package_dir.join("ios/Classes");
    fs::create_dir_all(&classes).context(format!("Creating {}", classes.display()))?;

    let removed = remove_backups(package_dir);
    if removed > 0 {
        println!("Removed {} backup entries from {}", removed, package_dir.display());
    }

    fs::create_dir_all(backup_dir).context(format!("Creating {}", backup_dir.display()))?;
    let now = Local::now();
    let mut written = Vec::new();
    for (stem, stub, existing_only) in STUBS {
        let file = classes.join(format!("{}.swift", stem));
        if file.exists() {
            fs::copy(&file, backup_dir.join(backup_name(stem, &now)))
                .context(format!("Backing up {}", file.display()))?;
        } else if existing_only {
            continue;
        }
        fs::write(&file, stub).context(format!("Writing {}", file.display()))?;
        Status::success(&format!("Stubbed {}", file.display()));
        written.push(file);
    }
    tracing::warn!(package = %package_dir.display(), files = written.len(), "Installed Swift stubs");
    Ok(written)
}

/// Require the iOS deployment target and a clean `pod_target_xcconfig`
pub fn normalize_podspec(content: &str, deployment_target: &str) -> String {
    let platform = format!("s.platform = :ios, \"{}\"", deployment_target);
    let out = PODSPEC_PLATFORM.replace_all(content, platform.as_str());
    PODSPEC_XCCONFIG
        .replace_all(&out, r#"s.pod_target_xcconfig = { "DEFINES_MODULE""#)
        .into_owned()
}

/// Normalise every audioplayers_darwin podspec in the pub cache
pub fn normalize_podspecs(pub_cache: &Path, deployment_target: &str) -> Vec<PathBuf> {
    let mut changed = Vec::new();
    for package in package_dirs(pub_cache) {
        let podspecs = WalkDir::new(&package)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(".podspec"));
        for podspec in podspecs {
            match rewrite_file(podspec.path(), false, |c| normalize_podspec(c, deployment_target)) {
                Ok(true) => {
                    println!("  Normalised {}", podspec.path().display());
                    changed.push(podspec.path().to_path_buf());
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %podspec.path().display(), error = %e, "Podspec rewrite failed"),
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fake_package(cache: &Path, name: &str) -> PathBuf {
        let dir = cache.join(name);
        fs::create_dir_all(dir.join("ios/Classes")).unwrap();
        dir
    }

    #[test]
    fn test_find_package_prefers_known_version() {
        let temp = TempDir::new().unwrap();
        fake_package(temp.path(), "audioplayers_darwin-4.1.0");
        let preferred = fake_package(temp.path(), PREFERRED_PACKAGE);
        assert_eq!(find_package(temp.path()), Some(preferred));
    }

    #[test]
    fn test_find_package_fallback() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("vibration-1.9.0")).unwrap();
        let other = fake_package(temp.path(), "audioplayers_darwin-6.0.0");
        assert_eq!(find_package(temp.path()), Some(other));
        assert_eq!(find_package(&temp.path().join("missing")), None);
    }

    #[test]
    fn test_is_backup_file() {
        assert!(is_backup_file("Plugin.swift.bak"));
        assert!(is_backup_file("Plugin.swift.original"));
        assert!(is_backup_file("Plugin.bak.swift"));
        assert!(!is_backup_file("Plugin.swift"));
    }

    #[test]
    fn test_backup_name() {
        let at = Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap();
        assert_eq!(backup_name("AudioContext", &at), "AudioContext_20240517_093005.swift");
    }

    #[test]
    fn test_install_stubs() {
        let temp = TempDir::new().unwrap();
        let package = fake_package(temp.path(), PREFERRED_PACKAGE);
        let classes = package.join("ios/Classes");
        fs::write(classes.join("SwiftAudioplayersDarwinPlugin.swift"), "original").unwrap();
        fs::write(classes.join("SwiftAudioplayersDarwinPlugin.swift.bak"), "old").unwrap();
        fs::create_dir_all(classes.join("backups")).unwrap();

        let backups = temp.path().join(BACKUP_DIR);
        let written = install_stubs(&package, &backups).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["SwiftAudioplayersDarwinPlugin.swift", "AudioPlayersStreamHandler.swift"]
        );
        assert!(fs::read_to_string(classes.join("SwiftAudioplayersDarwinPlugin.swift"))
            .unwrap()
            .contains("FlutterMethodNotImplemented"));
        assert!(!classes.join("SwiftAudioplayersDarwinPlugin.swift.bak").exists());
        assert!(!classes.join("backups").exists());
        assert!(!classes.join("WrappedMediaPlayer.swift").exists());

        let saved: Vec<_> = fs::read_dir(&backups).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[test]
    fn test_normalize_podspec() {
        let podspec = "Pod::Spec.new do |s|\n  s.platform = :ios, '9.0'\n  s.pod_target_xcconfig = { 'X' => 'Y', \"DEFINES_MODULE\" => 'YES' }\nend\n";
        let out = normalize_podspec(podspec, "12.0");
        assert!(out.contains("s.platform = :ios, \"12.0\"\n"));
        assert!(out.contains("s.pod_target_xcconfig = { \"DEFINES_MODULE\" => 'YES' }"));
        assert_eq!(normalize_podspec(&out, "12.0"), out);
    }

    #[test]
    fn test_normalize_podspecs_in_cache() {
        let temp = TempDir::new().unwrap();
        let package = fake_package(temp.path(), PREFERRED_PACKAGE);
        fs::write(package.join("ios/audioplayers_darwin.podspec"), "  s.platform = :ios, '9.0'\n").unwrap();

        let changed = normalize_podspecs(temp.path(), "12.0");
        assert_eq!(changed, vec![package.join("ios/audioplayers_darwin.podspec")]);
        assert_eq!(podspec_dir(&package), package.join("ios"));
        assert!(normalize_podspecs(temp.path(), "12.0").is_empty());
    }
}
