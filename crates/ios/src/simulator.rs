//! iOS Simulator management
//!
//! Enumerates simulators through `xcrun simctl list devices --json`, picks
//! one, boots it and, when none exists, creates a `FlutterTestDevice`.

use flutterkit_cli::output::Status;
use flutterkit_cli::prompt::Prompter;
use flutterkit_cli::table::Table;
use flutterkit_core::error::{Error, ErrorCode, Result};
use flutterkit_core::interrupt;
use flutterkit_core::process::{run_command, CommandResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Time Simulator.app gets to settle after a boot
pub const BOOT_SETTLE: Duration = Duration::from_secs(5);

/// Name of the simulator created when none is available
pub const TEST_DEVICE_NAME: &str = "FlutterTestDevice";

/// Device type used for [`TEST_DEVICE_NAME`]
pub const TEST_DEVICE_TYPE: &str = "com.apple.CoreSimulator.SimDeviceType.iPhone-13";

/// Choices longer than this are treated as UDIDs rather than indices
const UDID_MIN_LEN: usize = 8;

static RUNTIME_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"iOS[- ](\d+)[.-](\d+)").expect("valid runtime version regex"));

static RUNTIME_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"com\.apple\.CoreSimulator\.SimRuntime\.iOS-\d+-\d+").expect("valid runtime id regex")
});

static TRAILING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([\w-]+)\)").expect("valid simulator id regex"));

#[derive(Debug, Deserialize)]
struct SimctlList {
    #[serde(default)]
    devices: BTreeMap<String, Vec<SimctlDevice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    is_deleted: bool,
}

/// One iOS simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Simulator {
    /// Device name, e.g. `iPhone 15`
    pub name: String,
    /// Device UDID
    pub udid: String,
    /// iOS version from the runtime identifier, `unknown` when absent
    pub ios_version: String,
    /// `Booted`, `Shutdown`, ...
    pub state: String,
    /// Runtime key from simctl
    pub runtime: String,
}

impl Simulator {
    /// Whether simctl reports the device as booted
    pub fn is_booted(&self) -> bool {
        self.state == "Booted"
    }
}

/// Whether a simctl runtime key is an iOS runtime
pub fn is_ios_runtime(runtime: &str) -> bool {
    runtime.contains("iOS") || runtime.contains(".iOS-")
}

/// `17.4` from `com.apple.CoreSimulator.SimRuntime.iOS-17-4` or `iOS 17.4`
pub fn runtime_version(runtime: &str) -> Option<String> {
    RUNTIME_VERSION
        .captures(runtime)
        .map(|caps| format!("{}.{}", &caps[1], &caps[2]))
}

/// Parse `xcrun simctl list devices --json`
///
/// Keeps every non-deleted device under an iOS runtime, whatever its state.
pub fn parse_simctl_json(json: &str) -> Result<Vec<Simulator>> {
    let list: SimctlList = serde_json::from_str(json)?;
    let mut simulators = Vec::new();
    for (runtime, devices) in list.devices {
        if !is_ios_runtime(&runtime) {
            continue;
        }
        let ios_version = runtime_version(&runtime).unwrap_or_else(|| "unknown".to_string());
        simulators.extend(devices.into_iter().filter(|d| !d.is_deleted).map(|d| Simulator {
            name: d.name.unwrap_or_else(|| "unnamed".to_string()),
            udid: d.udid,
            ios_version: ios_version.clone(),
            state: d.state.unwrap_or_else(|| "unknown".to_string()),
            runtime: runtime.clone(),
        }));
    }
    Ok(simulators)
}

/// List iOS simulators
pub fn list() -> Result<Vec<Simulator>> {
    Status::info("Searching for iOS simulators...");
    let result = run_command("xcrun", &["simctl", "list", "devices", "--json"])?;
    if !result.success {
        return Err(Error::command_failed("Listing simulators", result.output()));
    }
    let simulators = parse_simctl_json(&result.stdout)?;
    tracing::debug!(count = simulators.len(), "Found simulators");
    Ok(simulators)
}

/// Print the simulator table
pub fn print_table(simulators: &[Simulator]) {
    if simulators.is_empty() {
        Status::warning("No iOS simulators available");
        return;
    }
    Status::header("Available iOS simulators");
    let mut table = Table::new(["No.", "Name", "iOS version", "State", "UDID"]);
    for (i, sim) in simulators.iter().enumerate() {
        table.row([
            (i + 1).to_string(),
            sim.name.clone(),
            sim.ios_version.clone(),
            sim.state.clone(),
            sim.udid.clone(),
        ]);
    }
    table.print();
}

/// Resolve `--simulator <udid|1-based index>`
pub fn resolve_choice(simulators: &[Simulator], choice: &str) -> Result<usize> {
    let choice = choice.trim();
    if choice.len() > UDID_MIN_LEN {
        return simulators
            .iter()
            .position(|s| s.udid == choice)
            .ok_or_else(|| Error::invalid_selection(format!("No simulator with UDID '{}'", choice)));
    }
    match choice.parse::<usize>() {
        Ok(n) if (1..=simulators.len()).contains(&n) => Ok(n - 1),
        Ok(_) => Err(Error::invalid_selection(format!(
            "Index '{}' is out of range (1-{})",
            choice,
            simulators.len()
        ))),
        Err(_) => Err(Error::invalid_selection(format!(
            "'{}' is not a valid UDID or index",
            choice
        ))),
    }
}

/// Pick a simulator from the flag or by prompting
pub fn select<'a>(
    simulators: &'a [Simulator],
    choice: Option<&str>,
    prompter: &Prompter,
) -> Result<&'a Simulator> {
    let index = match choice {
        Some(choice) => resolve_choice(simulators, choice)?,
        None => {
            let labels: Vec<String> = simulators
                .iter()
                .map(|s| format!("{} (iOS {}, {})", s.name, s.ios_version, s.state))
                .collect();
            prompter.select("Select a simulator", &labels, 0)?
        }
    };
    simulators
        .get(index)
        .ok_or_else(|| Error::invalid_selection("No simulator selected"))
}

/// Whether the device line for `udid` in `simctl list devices` says Booted
fn already_booted(udid: &str) -> bool {
    run_command("xcrun", &["simctl", "list", "devices"])
        .map(|result| {
            result
                .stdout
                .lines()
                .any(|line| line.contains(udid) && line.contains("Booted"))
        })
        .unwrap_or(false)
}

/// Boot a simulator and bring up Simulator.app
pub fn boot(udid: &str) -> Result<()> {
    Status::subheader(&format!("Starting simulator {}", udid));
    if already_booted(udid) {
        Status::success("Simulator is already running");
        return Ok(());
    }

    let result = run_command("xcrun", &["simctl", "boot", udid])?;
    if !result.success {
        return Err(Error::new(
            ErrorCode::DeviceNotFound,
            format!("Failed to boot simulator {}: {}", udid, result.output().trim()),
        ));
    }

    if !open_simulator_app()?.success {
        Status::warning("Could not open Simulator.app");
    }

    println!("Waiting for the simulator to start...");
    std::thread::sleep(BOOT_SETTLE);
    interrupt::check()
}

/// `open -a Simulator`
pub fn open_simulator_app() -> Result<CommandResult> {
    run_command("open", &["-a", "Simulator"])
}

/// First available iPhone/iPad in `xcrun simctl list devices available`
pub fn first_available_device(output: &str) -> Option<(String, String)> {
    output
        .lines()
        .filter(|line| (line.contains("iPhone") || line.contains("iPad")) && !line.contains("unavailable"))
        .find_map(|line| {
            let id = TRAILING_ID.captures(line)?[1].to_string();
            let name = line.split(" (").next().unwrap_or(line).trim().to_string();
            Some((id, name))
        })
}

/// Newest available iOS runtime identifier in `xcrun simctl list runtimes`
pub fn newest_runtime(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("iOS") && !line.contains("unavailable"))
        .filter_map(|line| RUNTIME_ID.find(line).map(|m| m.as_str().to_string()))
        .max_by_key(|id| runtime_sort_key(id))
}

fn runtime_sort_key(id: &str) -> (u32, u32) {
    let mut parts = id
        .rsplit("iOS-")
        .next()
        .unwrap_or_default()
        .split('-')
        .map(|p| p.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

/// UDID of an available simulator, creating one when none exists
pub fn get_or_create() -> Result<String> {
    let available = run_command("xcrun", &["simctl", "list", "devices", "available"])?;
    if available.success {
        if let Some((udid, name)) = first_available_device(&available.stdout) {
            Status::info(&format!("Available simulator: {}", name));
            return Ok(udid);
        }
    }

    Status::warning("No available simulator found, creating one");
    let runtimes = run_command("xcrun", &["simctl", "list", "runtimes"])?;
    let runtime = newest_runtime(&runtimes.stdout).ok_or_else(|| {
        Error::new(ErrorCode::DeviceNotFound, "No available iOS runtime")
            .with_suggestion("Install an iOS simulator runtime from Xcode > Settings > Platforms")
    })?;

    let created = run_command(
        "xcrun",
        &["simctl", "create", TEST_DEVICE_NAME, TEST_DEVICE_TYPE, &runtime],
    )?;
    if !created.success {
        return Err(Error::command_failed("Creating a simulator", created.output()));
    }
    let udid = created.stdout.trim().to_string();
    Status::success(&format!("Created simulator {} ({})", TEST_DEVICE_NAME, udid));
    Ok(udid)
}
