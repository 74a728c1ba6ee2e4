//! CocoaPods probe and `pod install`

use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::error::{Error, Result};
use flutterkit_core::health::probe_version;
use flutterkit_core::process::{CommandResult, ShellCommand};
use std::path::Path;
use std::time::Duration;

/// Manual install commands
pub const INSTALL_HINTS: [&str; 2] = ["sudo gem install cocoapods", "brew install cocoapods"];

/// `pod --version`, if CocoaPods is installed
pub fn version() -> Option<String> {
    probe_version("pod", &["--version"])
}

/// Make sure CocoaPods is installed, offering `sudo gem install cocoapods`
pub fn ensure_installed(prompter: &Prompter) -> Result<String> {
    Status::subheader("Environment check: CocoaPods");
    if let Some(version) = version() {
        Status::success(&format!("CocoaPods is installed (version {})", version));
        return Ok(version);
    }

    Status::error("CocoaPods is not installed");
    if prompter.confirm("Install CocoaPods with 'sudo gem install cocoapods'?", false)? {
        let result = ShellCommand::new(INSTALL_HINTS[0])
            .description("Installing CocoaPods")
            .stream()
            .run();
        if result.success {
            if let Some(version) = version() {
                Status::success("CocoaPods installed");
                return Ok(version);
            }
        }
        Status::warning("CocoaPods installation failed");
    }

    Status::instructions("Install CocoaPods manually with one of:", &INSTALL_HINTS);
    Err(Error::tool_missing("CocoaPods", INSTALL_HINTS.join("  or  ")))
}

/// `pod install [--repo-update]`
pub fn install_command(repo_update: bool) -> &'static str {
    if repo_update {
        "pod install --repo-update"
    } else {
        "pod install"
    }
}

/// Run `pod install` in `ios_dir`
pub fn install(ios_dir: &Path, repo_update: bool, timeout: Duration) -> CommandResult {
    let description = if repo_update {
        "Installing CocoaPods dependencies (repo update)"
    } else {
        "Installing CocoaPods dependencies"
    };
    ShellCommand::new(install_command(repo_update))
        .description(description)
        .current_dir(ios_dir)
        .timeout(timeout)
        .spinner()
        .run()
}

/// `pod install`, retrying once after `pod repo update`
pub fn install_with_retry(ios_dir: &Path, timeout: Duration) -> Result<()> {
    if install(ios_dir, false, timeout).success {
        return Ok(());
    }

    Status::warning("pod install failed");
    Status::hints(&["cd ios && pod install --repo-update"]);
    tracing::warn!("Retrying pod install after repo update");

    ShellCommand::new("pod repo update")
        .description("Updating the CocoaPods spec repo")
        .current_dir(ios_dir)
        .timeout(timeout)
        .spinner()
        .run();

    install(ios_dir, true, timeout)
        .into_result("Installing CocoaPods dependencies (retry)")
        .map(|_| ())
}

/// `pod deintegrate`, failure ignored
pub fn deintegrate(ios_dir: &Path) {
    let result = ShellCommand::new("pod deintegrate")
        .description("Removing CocoaPods integration")
        .current_dir(ios_dir)
        .capture()
        .run();
    if !result.success {
        tracing::debug!(error = %result.output(), "pod deintegrate failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_command() {
        assert_eq!(install_command(false), "pod install");
        assert_eq!(install_command(true), "pod install --repo-update");
    }

    #[test]
    fn test_missing_pod_without_tty_fails_with_hints() {
        if version().is_some() {
            return;
        }
        let err = ensure_installed(&Prompter::non_interactive()).unwrap_err();
        assert!(err.to_string().contains("CocoaPods"));
    }
}
