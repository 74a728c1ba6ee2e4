//! Emulator run driver
//!
//! Select and boot an AVD, then `flutter run` on it. An NDK mismatch in the
//! run output triggers one Gradle rewrite and a retry; any other failure
//! falls back to a plain `flutter run` once.

use crate::emulator::{self, EmulatorManager};
use crate::gradle;
use crate::sdk::{emulator_program, AndroidSdk};
use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::flutter::{self, find_emulator_id, FlutterProject};
use flutterkit_core::process::{shell_quote, CommandResult};

/// Options for an emulator run
#[derive(Debug, Clone, Default)]
pub struct EmulatorRunOptions {
    /// Pass `--verbose` to `flutter run`
    pub verbose: bool,
    /// Skip `flutter clean`
    pub no_clean: bool,
    /// Only print the emulator table
    pub list: bool,
    /// `--emulator <name|index>`
    pub emulator: Option<String>,
}

/// `flutter run [-d <id>] [--verbose]`
pub fn run_command_line(device_id: Option<&str>, verbose: bool) -> String {
    let mut cmd = String::from("flutter run");
    if let Some(id) = device_id {
        cmd.push_str(" -d ");
        cmd.push_str(&shell_quote(id));
    }
    if verbose {
        cmd.push_str(" --verbose");
    }
    cmd
}

/// List emulators, pick one, boot it and run the app on it
pub fn run_on_emulator(
    project: &FlutterProject,
    config: &Config,
    options: &EmulatorRunOptions,
    prompter: &Prompter,
) -> Result<()> {
    flutter::check_installation()?;

    let sdk = AndroidSdk::require()?;
    sdk.export_tool_paths();
    let program = emulator_program(Some(&sdk)).ok_or_else(|| {
        Error::tool_missing(
            "Android Emulator",
            "Install the Android Emulator from Android Studio's SDK Manager",
        )
    })?;
    Status::success(&format!("Android SDK: {}", sdk.root().display()));

    let manager = EmulatorManager::new(program);
    let emulators = manager.list()?;
    emulator::print_table(&emulators);

    if emulators.is_empty() {
        return Err(Error::new(ErrorCode::DeviceNotFound, "No Android emulators available")
            .with_suggestion("Create one in Android Studio's Device Manager"));
    }
    if options.list {
        return Ok(());
    }

    let selected = emulator::select(&emulators, options.emulator.as_deref(), prompter)?;
    Status::success(&format!(
        "Selected emulator: {} (Android {})",
        selected.name, selected.android_version
    ));

    let wait = Config::secs(config.schema.android.emulator_boot_wait_secs);
    manager.boot(&selected.id, wait)?;

    project.clean_unless(options.no_clean);
    project.pub_get(Config::secs(config.schema.timeouts.pub_get))?;

    let device_id = resolve_device_id(project, &config.schema.android.default_emulator_id);
    Status::info(&format!("Launching on {} (press Ctrl+C to stop)", device_id));

    let targeted = run_command_line(Some(&device_id), options.verbose);
    let result = flutter_run(project, &targeted, "Running app on the Android emulator");
    if result.success {
        return Ok(());
    }
    if let Some(retry) = retry_after_ndk_fix(project, &targeted, &result)? {
        return retry.into_result("Running app on the Android emulator").map(|_| ());
    }

    Status::warning("Running on the selected device failed, trying a plain flutter run");
    let plain = run_command_line(None, options.verbose);
    let result = flutter_run(project, &plain, "Running app (manual device selection)");
    if result.success {
        return Ok(());
    }
    if let Some(retry) = retry_after_ndk_fix(project, &plain, &result)? {
        return retry.into_result("Running app after NDK update").map(|_| ());
    }
    result.into_result("Running app (manual device selection)").map(|_| ())
}

/// Flutter device id of the booted emulator, or `fallback`
fn resolve_device_id(project: &FlutterProject, fallback: &str) -> String {
    let devices = project
        .command("flutter devices")
        .description("Listing available devices")
        .capture()
        .run();
    let id = devices
        .success
        .then(|| find_emulator_id(&devices.stdout))
        .flatten();
    match id {
        Some(id) => {
            Status::success(&format!("Emulator device id: {}", id));
            id
        }
        None => {
            Status::warning(&format!(
                "Could not determine the emulator id, trying the default ({})",
                fallback
            ));
            fallback.to_string()
        }
    }
}

fn flutter_run(project: &FlutterProject, command: &str, description: &str) -> CommandResult {
    project.command(command).description(description).stream().run()
}

/// Rewrite Gradle files and rerun once when `result` shows an NDK mismatch
///
/// Returns `None` when there was no mismatch or nothing could be rewritten.
fn retry_after_ndk_fix(
    project: &FlutterProject,
    command: &str,
    result: &CommandResult,
) -> Result<Option<CommandResult>> {
    let output = result.combined_output();
    if !gradle::is_ndk_mismatch(&output) {
        return Ok(None);
    }
    Status::warning("NDK version mismatch detected, pinning the installed version");

    let Some(version) = gradle::extract_installed_ndk(&output) else {
        Status::warning("Could not extract the installed NDK version");
        return Ok(None);
    };
    println!("  Installed NDK: {}", version);

    let modified = gradle::rewrite_ndk_version(&project.android_dir(), &version)?;
    if modified.is_empty() {
        return Ok(None);
    }
    for file in &modified {
        println!("  Updated {}", file.display());
    }
    Status::info(&format!(
        "Pinned NDK {} in {} file(s), running again",
        version,
        modified.len()
    ));
    Ok(Some(flutter_run(project, command, "Running app after NDK update")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_line() {
        assert_eq!(
            run_command_line(Some("emulator-5554"), false),
            "flutter run -d emulator-5554"
        );
        assert_eq!(run_command_line(None, true), "flutter run --verbose");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_line_quotes_ids() {
        assert_eq!(
            run_command_line(Some("sdk gphone"), false),
            "flutter run -d 'sdk gphone'"
        );
    }
}
