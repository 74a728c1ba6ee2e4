//! Chrome run driver
//!
//! Clean, `pub get`, enable web support, then `flutter run -d chrome` until
//! the user stops it.

use crate::chrome;
use flutterkit_cli::output::Status;
use flutterkit_core::config::Config;
use flutterkit_core::error::Result;
use flutterkit_core::flutter::{self, FlutterProject};

/// Options for a Chrome run
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeRunOptions {
    /// Pass `--verbose` to `flutter run`
    pub verbose: bool,
    /// Skip `flutter clean`
    pub no_clean: bool,
    /// Port override, else the configured one
    pub port: Option<u16>,
}

/// `flutter run -d chrome --web-port <port> [--verbose]`
pub fn run_command_line(port: u16, verbose: bool) -> String {
    let mut cmd = format!("flutter run -d chrome --web-port {}", port);
    if verbose {
        cmd.push_str(" --verbose");
    }
    cmd
}

/// Check the toolchain, prepare the project and run it in Chrome
pub fn run_in_chrome(project: &FlutterProject, config: &Config, options: &ChromeRunOptions) -> Result<()> {
    let version = flutter::check_installation()?;
    Status::success(&format!("Flutter: {}", version));
    let chrome = chrome::require()?;
    Status::success(&format!("Google Chrome: {}", chrome.display()));

    Status::header("Building and running in Chrome");
    project.clean_unless(options.no_clean);
    project.pub_get(Config::secs(config.schema.timeouts.pub_get))?;
    project
        .enable_web()
        .into_result("Enabling Flutter web support")?;

    let port = options.port.unwrap_or(config.schema.web.port);
    tracing::debug!(port, "Starting web run");
    Status::info(&format!("Serving on http://localhost:{} (press Ctrl+C to stop)", port));
    project
        .command(run_command_line(port, options.verbose))
        .description("Running app in Chrome")
        .stream()
        .run()
        .into_result("Running app in Chrome")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_line() {
        assert_eq!(run_command_line(8080, false), "flutter run -d chrome --web-port 8080");
        assert_eq!(
            run_command_line(5000, true),
            "flutter run -d chrome --web-port 5000 --verbose"
        );
    }

    #[test]
    fn test_default_port_from_config() {
        let options = ChromeRunOptions::default();
        let config = Config::default();
        assert_eq!(options.port.unwrap_or(config.schema.web.port), 8080);
    }
}
