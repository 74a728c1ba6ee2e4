//! Toolchain probes and health reports
//!
//! Each probe runs one fixed diagnostic command (`flutter --version`,
//! `pod --version`, `xcodebuild -version`, ...) and looks only at the exit
//! code and the first line of output. No retries, no caching.
//!
//! Platform crates add their own [`HealthCheck`] implementations (SDK
//! discovery, Chrome lookup) on top of the generic checks here.

use crate::process::{command_exists, run_command};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All checks passed
    Healthy,
    /// Some optional checks failed
    Degraded,
    /// Required checks failed
    Unhealthy,
}

impl HealthStatus {
    /// Returns true if status is healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Returns true if status is healthy or degraded (still operational)
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Individual health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Status of the check
    pub status: HealthStatus,
    /// Optional message with details
    pub message: Option<String>,
    /// How to fix a failed check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Duration of the check in milliseconds
    pub duration_ms: u64,
    /// Additional details as key-value pairs
    pub details: BTreeMap<String, String>,
}

impl CheckResult {
    fn with_status(name: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message,
            hint: None,
            duration_ms: 0,
            details: BTreeMap::new(),
        }
    }

    /// Create a healthy check result
    pub fn healthy(name: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Healthy, None)
    }

    /// Create an unhealthy check result with a message
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Unhealthy, Some(message.into()))
    }

    /// Create a degraded check result with a message
    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Degraded, Some(message.into()))
    }

    /// Set the duration of the check
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Add a detail key-value pair
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attach installation guidance, shown only when the check failed
    pub fn with_hint(mut self, hint: Option<&str>) -> Self {
        if !self.status.is_healthy() {
            self.hint = hint.map(String::from);
        }
        self
    }

    /// The `version` detail, if the probe recorded one
    pub fn version(&self) -> Option<&str> {
        self.details.get("version").map(String::as_str)
    }
}

/// Overall health report containing all check results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status based on all checks
    pub status: HealthStatus,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Total duration of all checks in milliseconds
    pub total_duration_ms: u64,
    /// Timestamp when the report was generated
    pub timestamp: String,
    /// Version of the tool
    pub version: String,
}

impl HealthReport {
    /// Create a new health report from check results
    #[must_use]
    pub fn new(checks: Vec<CheckResult>, duration: Duration) -> Self {
        let status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            checks,
            total_duration_ms: duration.as_millis() as u64,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Returns true if overall status is healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Get all checks that failed (not healthy)
    #[must_use]
    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.status.is_healthy())
            .collect()
    }
}

/// Health checker with configurable checks
pub struct HealthChecker {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    /// Create a new health checker with no checks
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Add a health check
    pub fn add_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Flutter SDK and git
    #[must_use]
    pub fn with_standard_checks(self) -> Self {
        self.add_check(
            CommandCheck::new("flutter", &["--version"])
                .hint("Install Flutter from https://flutter.dev/docs/get-started/install"),
        )
        .add_check(CommandCheck::optional("git", &["--version"]))
    }

    /// Xcode and CocoaPods
    #[must_use]
    pub fn with_ios_checks(self) -> Self {
        self.add_check(
            CommandCheck::new("xcodebuild", &["-version"])
                .hint("Install Xcode from the App Store and run `xcode-select --install`"),
        )
        .add_check(
            CommandCheck::new("pod", &["--version"])
                .hint("sudo gem install cocoapods  (or: brew install cocoapods)"),
        )
        .add_check(CommandCheck::new("xcrun", &["simctl", "help"]))
    }

    /// Android platform tools
    #[must_use]
    pub fn with_android_checks(self) -> Self {
        self.add_check(EnvVarCheck::optional("ANDROID_HOME"))
            .add_check(
                CommandCheck::optional("adb", &["version"])
                    .hint("Add <sdk>/platform-tools to PATH"),
            )
    }

    /// Run all health checks
    #[must_use]
    pub fn run(&self) -> HealthReport {
        let start = Instant::now();
        let mut results = Vec::new();

        for check in &self.checks {
            let check_start = Instant::now();
            let mut result = check.check();
            result.duration_ms = check_start.elapsed().as_millis() as u64;
            tracing::debug!(check = %result.name, status = ?result.status, "Health check finished");
            results.push(result);
        }

        HealthReport::new(results, start.elapsed())
    }
}

/// Trait for implementing health checks
pub trait HealthCheck: Send + Sync {
    /// Perform the health check and return a result
    fn check(&self) -> CheckResult;
}

/// Run `program args...` and return the first output line on success
pub fn probe_version(program: &str, args: &[&str]) -> Option<String> {
    let output = run_command(program, args).ok()?;
    if !output.success {
        return None;
    }
    let first = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();
    Some(first)
}

/// Check that a command is on PATH and its diagnostic invocation succeeds
pub struct CommandCheck {
    command: String,
    args: Vec<String>,
    required: bool,
    hint: Option<String>,
}

impl CommandCheck {
    /// Create a required command check
    pub fn new(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            required: true,
            hint: None,
        }
    }

    /// Create an optional command check (degraded if missing, not unhealthy)
    pub fn optional(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            required: false,
            ..Self::new(command, args)
        }
    }

    /// Installation guidance shown on failure
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn missing(&self, message: String) -> CheckResult {
        if self.required {
            CheckResult::unhealthy(&self.command, message)
        } else {
            CheckResult::degraded(&self.command, format!("{} (optional)", message))
        }
    }
}

impl HealthCheck for CommandCheck {
    fn check(&self) -> CheckResult {
        let start = Instant::now();

        let result = if !command_exists(&self.command) {
            self.missing(format!("{} is not installed or not on PATH", self.command))
        } else {
            let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            match probe_version(&self.command, &args) {
                Some(version) => CheckResult::healthy(&self.command).with_detail("version", version),
                None => self.missing(format!(
                    "`{} {}` failed",
                    self.command,
                    self.args.join(" ")
                )),
            }
        };

        result
            .with_hint(self.hint.as_deref())
            .with_duration(start.elapsed())
    }
}

/// Check if an optional environment variable is set
pub struct EnvVarCheck {
    var_name: String,
}

impl EnvVarCheck {
    /// Create an optional environment variable check
    pub fn optional(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl HealthCheck for EnvVarCheck {
    fn check(&self) -> CheckResult {
        match std::env::var(&self.var_name) {
            Ok(value) => CheckResult::healthy(&self.var_name).with_detail("value", value),
            Err(_) => CheckResult::degraded(
                &self.var_name,
                format!("{} is not set (optional)", self.var_name),
            ),
        }
    }
}

/// Check that a file or directory exists
pub struct PathCheck {
    name: String,
    path: PathBuf,
    required: bool,
}

impl PathCheck {
    /// Create a required path check
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required: true,
        }
    }

    /// Create an optional path check
    pub fn optional(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            required: false,
            ..Self::new(name, path)
        }
    }
}

impl HealthCheck for PathCheck {
    fn check(&self) -> CheckResult {
        if self.path.exists() {
            return CheckResult::healthy(&self.name)
                .with_detail("path", self.path.display().to_string());
        }
        let message = format!("{} does not exist", self.path.display());
        if self.required {
            CheckResult::unhealthy(&self.name, message)
        } else {
            CheckResult::degraded(&self.name, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_check_optional_missing() {
        let check = CommandCheck::optional("nonexistent_command_12345", &["--version"]);
        let result = check.check();
        assert_eq!(result.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_command_check_required_missing_has_hint() {
        let check = CommandCheck::new("nonexistent_command_12345", &["--version"])
            .hint("install it");
        let result = check.check();
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert_eq!(result.hint.as_deref(), Some("install it"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_check_present() {
        let result = CommandCheck::new("sh", &["-c", "echo check-ok"]).check();
        assert!(result.status.is_healthy());
        assert_eq!(result.version(), Some("check-ok"));
        assert!(result.hint.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_version_failure() {
        assert_eq!(probe_version("sh", &["-c", "exit 2"]), None);
    }

    #[test]
    fn test_path_check() {
        let temp = tempfile::tempdir().unwrap();
        assert!(PathCheck::new("tmp", temp.path()).check().status.is_healthy());
        assert_eq!(
            PathCheck::optional("nope", temp.path().join("nope")).check().status,
            HealthStatus::Degraded
        );
    }

    #[test]
    fn test_health_report() {
        let checks = vec![CheckResult::healthy("check1"), CheckResult::healthy("check2")];
        let report = HealthReport::new(checks, Duration::from_millis(100));
        assert!(report.is_healthy());
    }

    #[test]
    fn test_health_report_with_failure() {
        let checks = vec![
            CheckResult::healthy("check1"),
            CheckResult::degraded("check2", "optional"),
            CheckResult::unhealthy("check3", "Failed"),
        ];
        let report = HealthReport::new(checks, Duration::from_millis(100));
        assert!(!report.is_healthy());
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.failed_checks().len(), 2);
    }

    #[test]
    fn test_health_report_degraded() {
        let checks = vec![CheckResult::healthy("a"), CheckResult::degraded("b", "meh")];
        let report = HealthReport::new(checks, Duration::ZERO);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.status.is_operational());
    }
}
