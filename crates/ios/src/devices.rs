//! Physical iOS devices
//!
//! Connected iPhones and iPads as reported by `xcrun xctrace list devices`.

use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::process::run_command;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static DEVICE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([\w-]+)\)$").expect("valid device id regex"));

/// A connected device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IosDevice {
    /// Device identifier
    pub id: String,
    /// Device name, e.g. `Taro's iPhone`
    pub name: String,
    /// The full xctrace line
    pub full_info: String,
}

/// Parse `xcrun xctrace list devices`
///
/// Keeps iPhone/iPad lines that are not simulators and end in `(<id>)`.
pub fn parse_xctrace(output: &str) -> Vec<IosDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| (line.contains("iPhone") || line.contains("iPad")) && !line.contains("Simulator"))
        .filter_map(|line| {
            let id = DEVICE_ID.captures(line)?[1].to_string();
            let name = line.split(" (").next().unwrap_or(line).to_string();
            Some(IosDevice {
                id,
                name,
                full_info: line.to_string(),
            })
        })
        .collect()
}

/// Connected devices; empty off macOS or when xctrace fails
pub fn connected() -> Vec<IosDevice> {
    if !cfg!(target_os = "macos") {
        return Vec::new();
    }
    match run_command("xcrun", &["xctrace", "list", "devices"]) {
        Ok(result) if result.success => parse_xctrace(&result.stdout),
        Ok(result) => {
            tracing::debug!(error = %result.output(), "xctrace failed");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "xctrace unavailable");
            Vec::new()
        }
    }
}

/// Print connected devices as a numbered list
pub fn print_list(devices: &[IosDevice]) {
    if devices.is_empty() {
        Status::warning("No connected iOS devices found");
        return;
    }
    Status::subheader("Connected iOS devices");
    for (i, device) in devices.iter().enumerate() {
        println!("{}: {} ({})", i + 1, device.name, device.id);
    }
}

/// Pick a device, prompting only when more than one is connected
pub fn choose<'a>(devices: &'a [IosDevice], prompter: &Prompter) -> Result<&'a IosDevice> {
    let index = match devices.len() {
        0 => {
            return Err(Error::new(ErrorCode::DeviceNotFound, "No connected iOS devices")
                .with_suggestion("Connect an iPhone or iPad with a cable and trust this computer"))
        }
        1 => 0,
        _ => {
            let labels: Vec<String> =
                devices.iter().map(|d| format!("{} ({})", d.name, d.id)).collect();
            prompter.select("Select a device", &labels, 0)?
        }
    };
    devices
        .get(index)
        .ok_or_else(|| Error::invalid_selection("No device selected"))
}
