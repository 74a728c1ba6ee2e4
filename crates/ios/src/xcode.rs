//! Xcode probe and workspace automation

use flutterkit_cli::output::Status;
use flutterkit_core::error::{Error, Result, ResultExt};
use flutterkit_core::health::probe_version;
use flutterkit_core::process::run_command;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workspace path relative to the project root
pub const WORKSPACE: &str = "ios/Runner.xcworkspace";

/// Steps for installing from Xcode by hand
pub const MANUAL_STEPS: [&str; 3] = [
    "open ios/Runner.xcworkspace",
    "Pick the connected device in the device selector at the top left",
    "Press the Run button to build and install",
];

/// Time Xcode gets to come up before the Run script fires
const LAUNCH_WAIT: Duration = Duration::from_secs(3);

/// AppleScript that presses Run in the front Xcode window
///
/// Clicks the toolbar Run button, then sends Cmd+R (key code 15).
pub const RUN_SCRIPT: &str = r#"tell application "Xcode"
    activate
    delay 3
    tell application "System Events"
        tell process "Xcode"
            delay 3
            click button 1 of group 1 of toolbar 1 of window 1
            delay 5
            key code 15 using {command down}
        end tell
    end tell
end tell
"#;

/// First line of `xcodebuild -version`
pub fn version() -> Option<String> {
    probe_version("xcodebuild", &["-version"])
}

/// Require Xcode, returning its version line
pub fn require() -> Result<String> {
    version().ok_or_else(|| {
        Error::tool_missing(
            "Xcode",
            "Install Xcode from the App Store, then run 'xcode-select --install'",
        )
    })
}

/// `<root>/ios/Runner.xcworkspace`
pub fn workspace_path(project_root: &Path) -> PathBuf {
    project_root.join(WORKSPACE)
}

/// Open the Runner workspace in Xcode
pub fn open_workspace(project_root: &Path) -> Result<()> {
    let workspace = workspace_path(project_root);
    let path = workspace.to_string_lossy();
    let result = run_command("open", &[path.as_ref()])?;
    if !result.success {
        return Err(Error::command_failed("Opening Xcode", result.output()));
    }
    Status::success("Xcode opened");
    Ok(())
}

/// Print the manual install steps and open Xcode
pub fn open_with_instructions(project_root: &Path) -> Result<()> {
    Status::instructions("To install on a device from Xcode:", &MANUAL_STEPS);
    open_workspace(project_root)
}

/// Open the workspace and press Run through `osascript`
pub fn run_in_xcode(project_root: &Path) -> Result<()> {
    Status::info("Launching Xcode...");
    open_workspace(project_root)?;
    std::thread::sleep(LAUNCH_WAIT);

    let script = std::env::temp_dir().join("flutterkit_xcode_run.scpt");
    std::fs::write(&script, RUN_SCRIPT).context("Writing the Xcode run script")?;

    Status::info("Starting build and run in Xcode");
    let path = script.to_string_lossy();
    let result = run_command("osascript", &[path.as_ref()])?;
    if !result.success {
        tracing::warn!(error = %result.output(), "osascript failed");
        Status::warning("Xcode automation failed, press Run in Xcode yourself");
        return Ok(());
    }

    Status::success("Sent the build and run request to Xcode");
    Status::warning("If Xcode asks for signing or provisioning settings, finish them on screen");
    Ok(())
}
