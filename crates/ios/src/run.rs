//! Simulator run driver

use crate::{simulator, xcode};
use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::flutter::{self, FlutterProject};
use flutterkit_core::process::shell_quote;

/// Options for a simulator run
#[derive(Debug, Clone, Default)]
pub struct SimulatorRunOptions {
    /// Pass `--verbose` to `flutter run`
    pub verbose: bool,
    /// Skip `flutter clean`
    pub no_clean: bool,
    /// Only print the simulator table
    pub list: bool,
    /// `--simulator <udid|index>`
    pub simulator: Option<String>,
}

/// `flutter run -d <udid> [--verbose]`
pub fn run_command_line(udid: &str, verbose: bool) -> String {
    let mut cmd = format!("flutter run -d {}", shell_quote(udid));
    if verbose {
        cmd.push_str(" --verbose");
    }
    cmd
}

/// List simulators, pick one, boot it and run the app on it
///
/// Returns the simulator that was used.
pub fn run_on_simulator(
    project: &FlutterProject,
    config: &Config,
    options: &SimulatorRunOptions,
    prompter: &Prompter,
) -> Result<Option<simulator::Simulator>> {
    crate::require_macos("The iOS simulator")?;
    let flutter_version = flutter::check_installation()?;
    Status::success(&format!("Flutter: {}", flutter_version));
    let xcode_version = xcode::require()?;
    Status::success(&format!("Xcode: {}", xcode_version));

    let simulators = simulator::list()?;
    simulator::print_table(&simulators);
    if simulators.is_empty() {
        return Err(Error::new(ErrorCode::DeviceNotFound, "No iOS simulators available")
            .with_suggestion("Add a simulator in Xcode > Window > Devices and Simulators"));
    }
    if options.list {
        return Ok(None);
    }

    let selected = simulator::select(&simulators, options.simulator.as_deref(), prompter)?;
    Status::success(&format!(
        "Selected simulator: {} (iOS {})",
        selected.name, selected.ios_version
    ));

    simulator::boot(&selected.udid)?;

    Status::header("Building and running on the iOS simulator");
    project.clean_unless(options.no_clean);
    project.pub_get(Config::secs(config.schema.timeouts.pub_get))?;

    Status::info(&format!("Launching on {} (press Ctrl+C to stop)", selected.udid));
    project
        .command(run_command_line(&selected.udid, options.verbose))
        .description("Running app on the iOS simulator")
        .stream()
        .run()
        .into_result("Running app on the iOS simulator")?;
    Ok(Some(selected.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_run_command_line() {
        assert_eq!(
            run_command_line("A1B2C3D4-0000-1111-2222-333344445555", false),
            "flutter run -d A1B2C3D4-0000-1111-2222-333344445555"
        );
        assert_eq!(run_command_line("abc", true), "flutter run -d abc --verbose");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_simulator_run_refused_off_macos() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("lib")).unwrap();
        std::fs::write(temp.path().join("lib/main.dart"), "void main() {}\n").unwrap();
        let project = FlutterProject::open(temp.path()).unwrap();

        let err = run_on_simulator(
            &project,
            &Config::default(),
            &SimulatorRunOptions::default(),
            &Prompter::non_interactive(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedPlatform);
    }
}
