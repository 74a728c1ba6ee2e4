//! Timestamped diagnostic logs written when a tool fails
//!
//! Each failure produces `<kind>_error_log_<YYYYmmdd_HHMMSS>.txt` with the
//! date, the Flutter version, any extra context and the error text.

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// A diagnostic log about to be written
#[derive(Debug, Clone)]
pub struct ErrorLog {
    kind: String,
    at: DateTime<Local>,
    flutter_version: Option<String>,
    context: Vec<(String, String)>,
    error: String,
}

impl ErrorLog {
    /// Start a log for the given tool kind (`android`, `ios`, `web`, ...)
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            at: Local::now(),
            flutter_version: None,
            context: Vec::new(),
            error: error.into(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, at: DateTime<Local>) -> Self {
        self.at = at;
        self
    }

    /// Record the Flutter version line
    pub fn flutter_version(mut self, version: impl Into<String>) -> Self {
        self.flutter_version = Some(version.into());
        self
    }

    /// Add a `key: value` context line
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Add several context lines at once
    pub fn contexts<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.context
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// File name for this log
    pub fn file_name(&self) -> String {
        format!("{}_error_log_{}.txt", self.kind, self.at.format("%Y%m%d_%H%M%S"))
    }

    /// Log body
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} Error Log", title_case(&self.kind));
        let _ = writeln!(out, "Date: {}", self.at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Session: {}", crate::session_id());
        if let Some(version) = &self.flutter_version {
            let _ = writeln!(out, "Flutter version: {}", version);
        }
        for (key, value) in &self.context {
            let _ = writeln!(out, "{}: {}", key, value);
        }
        out.push('\n');
        let _ = writeln!(out, "Error:");
        out.push_str(&self.error);
        if !self.error.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Write the log into `dir`, returning its path
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render())?;
        tracing::info!(path = %path.display(), "Wrote error log");
        Ok(path)
    }
}

fn title_case(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_file_name() {
        let log = ErrorLog::new("android", "boom").at(fixed());
        assert_eq!(log.file_name(), "android_error_log_20240517_093005.txt");
    }

    #[test]
    fn test_render_contents() {
        let log = ErrorLog::new("emulator", "flutter run failed")
            .at(fixed())
            .flutter_version("Flutter 3.19.6 • channel stable")
            .context("Emulator", "Pixel_7_API_34");
        let body = log.render();

        assert!(body.starts_with("Emulator Error Log\n"));
        assert!(body.contains("Date: 2024-05-17 09:30:05"));
        assert!(body.contains("Flutter version: Flutter 3.19.6"));
        assert!(body.contains("Emulator: Pixel_7_API_34"));
        assert!(body.ends_with("Error:\nflutter run failed\n"));
    }

    #[test]
    fn test_contexts() {
        let body = ErrorLog::new("git_push", "push rejected")
            .at(fixed())
            .contexts([("Error code", "E4003"), ("Category", "Git")])
            .render();
        assert!(body.contains("Error code: E4003\nCategory: Git\n"));
    }

    #[test]
    fn test_write_to() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        let path = ErrorLog::new("ios", "pod install failed")
            .at(fixed())
            .write_to(&dir)
            .unwrap();

        assert_eq!(path, dir.join("ios_error_log_20240517_093005.txt"));
        assert!(std::fs::read_to_string(path).unwrap().contains("pod install failed"));
    }
}
