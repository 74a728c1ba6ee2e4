//! `key=value` properties files
//!
//! Rewrites keep every other line byte-for-byte and in order. A key that is
//! already present has its value replaced in place; a missing key is appended
//! once at the end.

use crate::error::{Result, ResultExt};
use std::fs;
use std::path::Path;

/// Value of the first line starting with `key=`
pub fn get_property(content: &str, key: &str) -> Option<String> {
    let prefix = format!("{}=", key);
    content
        .lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|value| value.trim_end_matches('\r').to_string())
}

/// Set `key` to `value`, replacing the first matching line or appending
///
/// Later duplicates of the key are left alone.
pub fn set_property(content: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let replacement = format!("{}{}", prefix, value);
    let mut out = String::with_capacity(content.len() + replacement.len() + 1);
    let mut replaced = false;

    for line in content.split_inclusive('\n') {
        if !replaced && line.starts_with(&prefix) {
            out.push_str(&replacement);
            if line.ends_with("\r\n") {
                out.push_str("\r\n");
            } else if line.ends_with('\n') {
                out.push('\n');
            }
            replaced = true;
        } else {
            out.push_str(line);
        }
    }

    if !replaced {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&replacement);
        out.push('\n');
    }

    out
}

/// Set a property in a file, creating the file when missing
///
/// Returns `true` when the file content changed.
pub fn update_properties_file(path: &Path, key: &str, value: &str) -> Result<bool> {
    let current = if path.exists() {
        fs::read_to_string(path).context(format!("Reading {}", path.display()))?
    } else {
        String::new()
    };

    let updated = set_property(&current, key, value);
    if updated == current {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, updated).context(format!("Writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), key, "Updated properties file");
    Ok(true)
}

/// Escape a filesystem path for a Java properties value
///
/// Backslashes are doubled so Windows paths survive the properties parser.
pub fn escape_path_value(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}
