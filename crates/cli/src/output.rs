//! Terminal output utilities
//!
//! Consistent status lines for every tool.

use flutterkit_core::health::{CheckResult, HealthReport, HealthStatus};
use owo_colors::OwoColorize;

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a step message (for multi-step operations)
    pub fn step(step: usize, total: usize, message: &str) {
        println!("{} {}", format!("[{}/{}]", step, total).dimmed(), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Print a subheader
    pub fn subheader(message: &str) {
        println!();
        println!("{}", message.bold().dimmed());
    }

    /// Print indented hint lines under a previous message
    pub fn hints<S: AsRef<str>>(lines: &[S]) {
        for line in lines {
            println!("  {} {}", "→".cyan(), line.as_ref());
        }
    }

    /// Print numbered instructions
    pub fn instructions<S: AsRef<str>>(title: &str, lines: &[S]) {
        println!();
        println!("{}", title.bold());
        for (i, line) in lines.iter().enumerate() {
            println!("  {}. {}", i + 1, line.as_ref());
        }
    }
}

/// Enable or disable colored output for this process
pub fn set_colors(enabled: bool) {
    owo_colors::set_override(enabled);
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format a file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One line describing a check result
pub fn health_line(check: &CheckResult) -> String {
    match (check.version(), check.message.as_deref()) {
        (_, Some(message)) if !check.status.is_healthy() => format!("{}: {}", check.name, message),
        (Some(version), _) => format!("{}: {}", check.name, version),
        _ => check.name.clone(),
    }
}

/// Print a health report, one line per check with hints under failures
pub fn print_health_report(report: &HealthReport) {
    for check in &report.checks {
        let line = health_line(check);
        match check.status {
            HealthStatus::Healthy => Status::success(&line),
            HealthStatus::Degraded => Status::warning(&line),
            HealthStatus::Unhealthy => Status::error(&line),
        }
        if let Some(hint) = &check.hint {
            Status::hints(&[hint]);
        }
    }
    println!();
    let failed = report.failed_checks().len();
    if failed == 0 {
        Status::success("Environment looks good");
    } else {
        Status::warning(&format!("{} check(s) need attention", failed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs_f32(12.5)), "12.5s");
        assert_eq!(format_duration(Duration::from_secs(754)), "12m 34s");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(900), "900 B");
        assert_eq!(format_size(3 * 1024), "3.00 KB");
        assert_eq!(format_size(18 * 1024 * 1024 + 512 * 1024), "18.50 MB");
    }

    #[test]
    fn test_health_line() {
        let ok = CheckResult::healthy("flutter").with_detail("version", "Flutter 3.22.0");
        assert_eq!(health_line(&ok), "flutter: Flutter 3.22.0");
        assert_eq!(health_line(&CheckResult::healthy("chrome")), "chrome");
        let bad = CheckResult::unhealthy("pod", "pod is not installed").with_detail("version", "x");
        assert_eq!(health_line(&bad), "pod: pod is not installed");
    }
}
