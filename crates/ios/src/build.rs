//! iOS debug build driver
//!
//! CocoaPods check, clean, `pub get`, `pod install`, plugin patches, stale
//! file cleanup, Podfile hook, then `flutter build ios --debug` with one
//! warnings-suppressed retry. [`build_with_remediation`] wraps the driver in
//! the dependency repair and audioplayers fallbacks.

use crate::{audioplayers, clean, cocoapods, devices, patches, podfile, simulator, xcode};
use flutterkit_cli::output::{format_duration, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::{Error, Result};
use flutterkit_core::flutter::FlutterProject;
use flutterkit_core::process::shell_quote;
use std::time::{Duration, Instant};

/// Set for the retry so Xcode only reports errors
pub const ONLY_SHOW_ERRORS_ENV: &str = "FLUTTER_XCODE_ONLY_SHOW_ERRORS";

/// Likely causes of a failed `flutter install`
pub const INSTALL_FAILURE_CAUSES: [&str; 3] = [
    "The device is not in developer mode",
    "No provisioning profile is configured",
    "An Apple developer account must be set up in Xcode",
];

/// What happens after a successful build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Offer to open Xcode with manual instructions
    #[default]
    Manual,
    /// `flutter install` onto a connected device
    Device,
    /// Open Xcode and press Run through AppleScript
    Xcode,
}

/// Options for one iOS build
#[derive(Debug, Clone, Copy, Default)]
pub struct IosBuildOptions {
    /// Pass `--verbose` to flutter
    pub verbose: bool,
    /// Skip `flutter clean`
    pub no_clean: bool,
    /// Post-build step
    pub install: InstallMode,
}

/// `flutter build ios --debug [--verbose] --no-tree-shake-icons [--suppress-analytics]`
pub fn build_command(verbose: bool, suppress_analytics: bool) -> String {
    let mut cmd = String::from("flutter build ios --debug");
    if verbose {
        cmd.push_str(" --verbose");
    }
    cmd.push_str(" --no-tree-shake-icons");
    if suppress_analytics {
        cmd.push_str(" --suppress-analytics");
    }
    cmd
}

/// `flutter install --device-id=<id> [-v]`
pub fn install_command(device_id: &str, verbose: bool) -> String {
    let mut cmd = format!("flutter install --device-id={}", shell_quote(device_id));
    if verbose {
        cmd.push_str(" -v");
    }
    cmd
}

/// Build the iOS debug app, then run the post-build step
pub fn build_ios_debug(
    project: &FlutterProject,
    config: &Config,
    options: &IosBuildOptions,
    prompter: &Prompter,
) -> Result<Duration> {
    let elapsed = build_app(project, config, options, prompter)?;
    post_build(project, config, options, prompter)?;
    Ok(elapsed)
}

/// Everything up to a built `Runner.app`, without installing it
fn build_app(
    project: &FlutterProject,
    config: &Config,
    options: &IosBuildOptions,
    prompter: &Prompter,
) -> Result<Duration> {
    crate::require_macos("iOS builds")?;
    cocoapods::ensure_installed(prompter)?;

    let started = Instant::now();
    let timeouts = &config.schema.timeouts;
    let ios_dir = project.ios_dir();
    let pod_timeout = Config::secs(timeouts.pod_install);

    project.clean_unless(options.no_clean);
    project.pub_get(Config::secs(timeouts.pub_get))?;
    cocoapods::install_with_retry(&ios_dir, pod_timeout)?;

    Status::info("iOS builds can take several minutes");

    patches::apply_all(&config.pub_cache_dir(), &config.schema.ios.patches);
    clean::remove_stale(project.root());
    if let Err(e) = podfile::add_warning_suppression(&ios_dir, &config.schema.ios.deployment_target) {
        Status::warning(&format!("Could not update the Podfile: {}", e));
    }

    if !cocoapods::install(&ios_dir, true, pod_timeout).success {
        Status::warning("pod install --repo-update failed, building anyway");
    }

    run_build(project, config, options.verbose)?;

    let elapsed = started.elapsed();
    Status::success(&format!("iOS debug build finished ({})", format_duration(elapsed)));
    Ok(elapsed)
}

fn post_build(
    project: &FlutterProject,
    config: &Config,
    options: &IosBuildOptions,
    prompter: &Prompter,
) -> Result<()> {
    match options.install {
        InstallMode::Manual => offer_xcode(project, prompter),
        InstallMode::Device => install_to_device(project, config, options.verbose, prompter),
        InstallMode::Xcode => install_via_xcode(project),
    }
}

/// `flutter build ios`, retried once with only errors shown
fn run_build(project: &FlutterProject, config: &Config, verbose: bool) -> Result<()> {
    let timeout = Config::secs(config.schema.timeouts.ios_build);
    let first = project
        .command(build_command(verbose, false))
        .description("Building iOS debug app")
        .timeout(timeout)
        .spinner()
        .run();
    if first.success {
        return Ok(());
    }
    if first.interrupted() {
        return first.into_result("Building iOS debug app").map(|_| ());
    }

    Status::warning("iOS build failed, retrying with warnings suppressed");
    tracing::warn!("Retrying iOS build with {}=1", ONLY_SHOW_ERRORS_ENV);
    project
        .command(build_command(verbose, true))
        .description("Building iOS debug app (warnings suppressed)")
        .env(ONLY_SHOW_ERRORS_ENV, "1")
        .timeout(timeout)
        .spinner()
        .run()
        .into_result("Building iOS debug app (warnings suppressed)")
        .map(|_| ())
}

fn offer_xcode(project: &FlutterProject, prompter: &Prompter) -> Result<()> {
    Status::instructions("To install on a device from Xcode:", &xcode::MANUAL_STEPS);
    if prompter.confirm("Open Xcode now?", false)? {
        xcode::open_workspace(project.root())?;
    }
    Ok(())
}

/// Install the built app onto a connected device with `flutter install`
pub fn install_to_device(
    project: &FlutterProject,
    config: &Config,
    verbose: bool,
    prompter: &Prompter,
) -> Result<()> {
    Status::subheader("Installing on a connected device");
    let connected = devices::connected();
    devices::print_list(&connected);
    let device = devices::choose(&connected, prompter)?;
    Status::info(&format!("Installing on '{}'", device.name));

    let description = "Installing the app";
    let result = project
        .command(install_command(&device.id, verbose))
        .description(description)
        .timeout(Config::secs(config.schema.timeouts.install))
        .spinner()
        .run();
    if result.success {
        Status::success("App installed on the device");
        return Ok(());
    }

    Status::error("Installing the app failed");
    Status::instructions("Possible causes:", &INSTALL_FAILURE_CAUSES);
    if !result.interrupted() && prompter.confirm("Open Xcode to install manually?", false)? {
        xcode::open_workspace(project.root())?;
    }
    result.into_result(description).map(|_| ())
}

/// Open Xcode and start Run, on a device or else a simulator
pub fn install_via_xcode(project: &FlutterProject) -> Result<()> {
    let connected = devices::connected();
    match connected.first() {
        Some(device) => Status::info(&format!("Using device: {}", device.name)),
        None => {
            Status::warning("No connected iOS device, using a simulator");
            if let Err(e) = simulator::get_or_create() {
                Status::warning("Could not prepare a simulator, opening Xcode instead");
                xcode::open_workspace(project.root())?;
                return Err(e);
            }
        }
    }
    xcode::run_in_xcode(project.root())
}

/// Build with the full remediation ladder
///
/// Dependency repair and a deep clean run first. A failed build is retried
/// with audioplayers_darwin stubs, then once more with the pod pointed at
/// its local package. The post-build step runs once, after a build succeeds.
pub fn build_with_remediation(
    project: &FlutterProject,
    config: &Config,
    options: &IosBuildOptions,
    prompter: &Prompter,
) -> Result<Duration> {
    crate::require_macos("iOS builds")?;
    clean::repair_dependencies(project, config)?;
    clean::deep_clean(project, config);

    let pub_cache = config.pub_cache_dir();
    let ios_dir = project.ios_dir();
    let fallbacks: Vec<Fallback<'_>> = vec![
        Box::new(|| -> Result<bool> {
            Status::warning("iOS build failed, replacing audioplayers_darwin Swift sources");
            let Some(package) = audioplayers::find_package(&pub_cache) else {
                Status::warning("audioplayers_darwin not found in the pub cache");
                return Ok(false);
            };
            audioplayers::install_stubs(&package, &project.root().join(audioplayers::BACKUP_DIR))?;
            Ok(true)
        }),
        Box::new(|| -> Result<bool> {
            Status::warning("Rebuild failed, pointing the audioplayers_darwin pod at the local package");
            let Some(package) = audioplayers::find_package(&pub_cache) else {
                return Ok(false);
            };
            if !podfile::override_audioplayers_pod(&ios_dir, &audioplayers::podspec_dir(&package))? {
                Status::error("Could not update the Podfile");
                return Ok(false);
            }
            clean::remove_path(&ios_dir.join("Pods"));
            cocoapods::install(&ios_dir, true, Config::secs(config.schema.timeouts.pod_install));
            Ok(true)
        }),
    ];

    let elapsed = build_with_fallbacks(|| build_app(project, config, options, prompter), fallbacks)?;
    post_build(project, config, options, prompter)?;
    Ok(elapsed)
}

/// A fix applied before the next build attempt; `false` means it could not
/// be applied and the ladder stops
type Fallback<'a> = Box<dyn FnMut() -> Result<bool> + 'a>;

/// Run `build`, applying one fallback before each further attempt
///
/// Stops at the first successful build. An interrupt ends the ladder
/// immediately.
fn build_with_fallbacks<B>(mut build: B, fallbacks: Vec<Fallback<'_>>) -> Result<Duration>
where
    B: FnMut() -> Result<Duration>,
{
    let mut error = match build() {
        Ok(elapsed) => return Ok(elapsed),
        Err(e) => e,
    };
    for mut fallback in fallbacks {
        if error.is_interrupted() || !fallback()? {
            return Err(error);
        }
        error = match build() {
            Ok(elapsed) => return Ok(elapsed),
            Err(e) => e,
        };
    }
    if error.is_interrupted() {
        return Err(error);
    }
    Status::error("Every fix was tried and the build still fails");
    Err(Error::build("iOS build failed after all remediation steps").with_context(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command() {
        assert_eq!(
            build_command(false, false),
            "flutter build ios --debug --no-tree-shake-icons"
        );
        assert_eq!(
            build_command(true, true),
            "flutter build ios --debug --verbose --no-tree-shake-icons --suppress-analytics"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_command() {
        assert_eq!(
            install_command("00008110-001A2B3C4D5E6F70", false),
            "flutter install --device-id=00008110-001A2B3C4D5E6F70"
        );
        assert!(install_command("abc", true).ends_with(" -v"));
    }

    fn failing(attempts: &std::cell::Cell<u32>, succeed_on: u32) -> Result<Duration> {
        attempts.set(attempts.get() + 1);
        if attempts.get() == succeed_on {
            Ok(Duration::from_secs(1))
        } else {
            Err(Error::build("flutter build ios failed"))
        }
    }

    #[test]
    fn test_fallbacks_stop_at_first_successful_build() {
        let attempts = std::cell::Cell::new(0);
        let applied = std::cell::Cell::new(0);
        let fallbacks: Vec<Fallback<'_>> = vec![
            Box::new(|| -> Result<bool> {
                applied.set(applied.get() + 1);
                Ok(true)
            }),
            Box::new(|| -> Result<bool> {
                applied.set(applied.get() + 1);
                Ok(true)
            }),
        ];
        let elapsed = build_with_fallbacks(|| failing(&attempts, 2), fallbacks).unwrap();
        assert_eq!(elapsed, Duration::from_secs(1));
        assert_eq!(attempts.get(), 2);
        assert_eq!(applied.get(), 1);
    }

    #[test]
    fn test_successful_build_applies_no_fallback() {
        let attempts = std::cell::Cell::new(0);
        let fallbacks: Vec<Fallback<'_>> =
            vec![Box::new(|| -> Result<bool> { panic!("fallback must not run") })];
        build_with_fallbacks(|| failing(&attempts, 1), fallbacks).unwrap();
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_fallbacks_exhausted_or_unavailable() {
        let attempts = std::cell::Cell::new(0);
        let fallbacks: Vec<Fallback<'_>> = vec![
            Box::new(|| -> Result<bool> { Ok(true) }),
            Box::new(|| -> Result<bool> { Ok(true) }),
        ];
        let err = build_with_fallbacks(|| failing(&attempts, 0), fallbacks).unwrap_err();
        assert_eq!(attempts.get(), 3);
        assert!(err.message.contains("after all remediation steps"));

        let attempts = std::cell::Cell::new(0);
        let fallbacks: Vec<Fallback<'_>> = vec![Box::new(|| -> Result<bool> { Ok(false) })];
        let err = build_with_fallbacks(|| failing(&attempts, 0), fallbacks).unwrap_err();
        assert_eq!(attempts.get(), 1);
        assert_eq!(err.message, "flutter build ios failed");
    }

    #[test]
    fn test_interrupted_build_skips_fallbacks() {
        let fallbacks: Vec<Fallback<'_>> =
            vec![Box::new(|| -> Result<bool> { panic!("fallback must not run") })];
        let err = build_with_fallbacks(|| Err(Error::interrupted()), fallbacks).unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn test_default_install_mode() {
        assert_eq!(IosBuildOptions::default().install, InstallMode::Manual);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_build_refused_off_macos() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("lib")).unwrap();
        std::fs::write(temp.path().join("lib/main.dart"), "void main() {}\n").unwrap();
        let project = FlutterProject::open(temp.path()).unwrap();

        let err = build_ios_debug(
            &project,
            &Config::default(),
            &IosBuildOptions::default(),
            &Prompter::non_interactive(),
        )
        .unwrap_err();
        assert_eq!(err.code, flutterkit_core::ErrorCode::UnsupportedPlatform);
    }
}
