//! Google Chrome detection

use flutterkit_core::error::{Error, Result};
use flutterkit_core::health::{CheckResult, HealthCheck};
use std::path::{Path, PathBuf};

/// Chrome binary inside the macOS app bundle
pub const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

/// Chrome binary relative to a Windows program files directory
pub const WINDOWS_CHROME: &str = "Google/Chrome/Application/chrome.exe";

/// Executable names looked up on PATH on Linux
pub const LINUX_CHROME_NAMES: [&str; 2] = ["google-chrome", "chrome"];

/// Operating systems with a known Chrome layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// macOS
    MacOs,
    /// Windows
    Windows,
    /// Linux and other Unixes
    Linux,
}

impl Os {
    /// The OS this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(windows) {
            Os::Windows
        } else {
            Os::Linux
        }
    }
}

/// Fixed install paths to probe, in order
///
/// `env` resolves environment variables so tests can supply their own.
pub fn chrome_candidates<F>(os: Os, env: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    match os {
        Os::MacOs => vec![PathBuf::from(MACOS_CHROME)],
        Os::Windows => ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|var| env(var).filter(|v| !v.trim().is_empty()))
            .map(|dir| Path::new(&dir).join(WINDOWS_CHROME))
            .collect(),
        Os::Linux => Vec::new(),
    }
}

/// Locate Chrome for the current OS
pub fn find_chrome() -> Option<PathBuf> {
    let os = Os::current();
    let found = chrome_candidates(os, |var| std::env::var(var).ok())
        .into_iter()
        .find(|p| p.is_file());
    if found.is_some() || os != Os::Linux {
        return found;
    }
    LINUX_CHROME_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Require Chrome, returning its path
pub fn require() -> Result<PathBuf> {
    find_chrome().ok_or_else(|| {
        Error::tool_missing(
            "Google Chrome",
            "Install Google Chrome from https://www.google.com/chrome/ and run again",
        )
    })
}

/// Health check for a Chrome install
pub struct ChromeCheck;

impl HealthCheck for ChromeCheck {
    fn check(&self) -> CheckResult {
        match find_chrome() {
            Some(path) => {
                CheckResult::healthy("chrome").with_detail("path", path.display().to_string())
            }
            None => CheckResult::unhealthy("chrome", "Google Chrome not found")
                .with_hint(Some("Install Google Chrome from https://www.google.com/chrome/")),
        }
    }
}
