//! APK build driver
//!
//! NDK repair, clean, `pub get`, `flutter build apk`, then a timestamped
//! copy of the APK under `output/android/`.

use crate::ndk;
use flutterkit_cli::output::{format_duration, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::artifact::{copy_artifact, first_existing, Artifact};
use flutterkit_core::config::Config;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::flutter::{BuildMode, FlutterProject};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Hints printed when `flutter build apk` fails
pub const TROUBLESHOOTING: [&str; 3] = [
    "Run 'flutter doctor' to check the environment",
    "Check that the Android SDK, JDK and Gradle versions are compatible",
    "Re-run with --verbose for more detail",
];

/// Options for one APK build
#[derive(Debug, Clone, Copy, Default)]
pub struct ApkBuildOptions {
    /// Release or debug
    pub mode: BuildMode,
    /// Pass `--verbose` to flutter
    pub verbose: bool,
    /// Skip `flutter clean`
    pub no_clean: bool,
    /// Disable R8 shrinking in release builds
    pub fast_build: bool,
}

/// The `flutter build apk` command line
pub fn build_command(options: &ApkBuildOptions) -> String {
    let mut cmd = format!("flutter build apk {} --split-per-abi", options.mode.flag());
    if options.verbose {
        cmd.push_str(" --verbose");
    }
    if options.fast_build && options.mode.is_release() {
        cmd.push_str(" --no-shrink");
    }
    cmd
}

/// Where the APK may land, in preference order
pub fn apk_candidates(project_root: &Path, mode: BuildMode) -> [PathBuf; 2] {
    let dir = project_root.join("build/app/outputs/flutter-apk");
    match mode {
        BuildMode::Release => [
            dir.join("app-armeabi-v7a-release.apk"),
            dir.join("app-release.apk"),
        ],
        BuildMode::Debug => [dir.join("app-debug.apk"), dir.join("app-debug.apk")],
    }
}

/// Build the APK and copy it under the output directory
pub fn build_apk(
    project: &FlutterProject,
    config: &Config,
    options: &ApkBuildOptions,
    prompter: &Prompter,
) -> Result<Artifact> {
    let started = Instant::now();
    let timeouts = &config.schema.timeouts;

    ndk::ensure_ndk(&project.android_dir(), &config.schema.android.ndk_version, prompter)?;

    project.clean_unless(options.no_clean);
    project.pub_get(Config::secs(timeouts.pub_get)).map_err(|e| {
        Status::warning("Dependency resolution failed, check your network connection");
        e
    })?;

    if options.fast_build && options.mode.is_release() {
        Status::info("Fast build enabled (R8/ProGuard shrinking disabled)");
    }
    Status::info("Android builds can take 5-10 minutes, especially the first time");
    Status::hints(&["Use --no-clean --fast-build to speed up later builds"]);

    let result = project
        .command(build_command(options))
        .description("Building Android APK")
        .timeout(Config::secs(timeouts.apk_build))
        .spinner()
        .run();
    if !result.success {
        Status::error("APK build failed");
        Status::instructions("Troubleshooting:", &TROUBLESHOOTING);
    }
    result.into_result("Building Android APK")?;

    let candidates = apk_candidates(project.root(), options.mode);
    let apk = first_existing(&candidates).ok_or_else(|| {
        Error::new(
            ErrorCode::ArtifactNotFound,
            format!("APK not found: {}", candidates[1].display()),
        )
    })?;

    let artifact = copy_artifact(
        &apk,
        &config.output_dir(project.root(), "android"),
        &config.schema.project.name,
    )?;

    Status::success(&format!("APK built: {}", artifact.path.display()));
    println!("File size: {:.2} MB", artifact.size_mb());
    println!("Build time: {}", format_duration(started.elapsed()));
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_release() {
        let options = ApkBuildOptions::default();
        assert_eq!(
            build_command(&options),
            "flutter build apk --release --split-per-abi"
        );
    }

    #[test]
    fn test_build_command_fast_verbose() {
        let options = ApkBuildOptions {
            verbose: true,
            fast_build: true,
            ..Default::default()
        };
        assert_eq!(
            build_command(&options),
            "flutter build apk --release --split-per-abi --verbose --no-shrink"
        );
    }

    #[test]
    fn test_fast_build_ignored_for_debug() {
        let options = ApkBuildOptions {
            mode: BuildMode::Debug,
            fast_build: true,
            ..Default::default()
        };
        assert_eq!(build_command(&options), "flutter build apk --debug --split-per-abi");
    }

    #[test]
    fn test_apk_candidates() {
        let root = Path::new("/work/app");
        let [split, plain] = apk_candidates(root, BuildMode::Release);
        assert!(split.ends_with("build/app/outputs/flutter-apk/app-armeabi-v7a-release.apk"));
        assert!(plain.ends_with("app-release.apk"));

        let [debug, _] = apk_candidates(root, BuildMode::Debug);
        assert!(debug.ends_with("app-debug.apk"));
    }

    #[test]
    fn test_apk_located_and_copied() {
        let temp = tempfile::TempDir::new().unwrap();
        let [_, plain] = apk_candidates(temp.path(), BuildMode::Release);
        std::fs::create_dir_all(plain.parent().unwrap()).unwrap();
        std::fs::write(&plain, vec![0u8; 2048]).unwrap();

        let candidates = apk_candidates(temp.path(), BuildMode::Release);
        let found = first_existing(&candidates).unwrap();
        assert_eq!(found, plain);

        let artifact =
            copy_artifact(&found, &temp.path().join("output/android"), "gyroscope_app").unwrap();
        assert_eq!(artifact.size_bytes, 2048);
        let name = artifact.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gyroscope_app_") && name.ends_with(".apk"));
    }
}
