//! Android emulator management
//!
//! AVDs come from `emulator -list-avds`; their state from `adb devices` plus
//! the process list; API level and ABI from each AVD's `config.ini`.

use flutterkit_cli::output::Status;
use flutterkit_cli::progress;
use flutterkit_cli::prompt::Prompter;
use flutterkit_cli::table::Table;
use flutterkit_core::error::{Error, Result};
use flutterkit_core::interrupt;
use flutterkit_core::process::{run_command, shell_quote, ShellCommand};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

static API_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"android-(\d+)").expect("valid api level regex"));

/// Placeholder for fields that could not be read
pub const UNKNOWN: &str = "unknown";

/// Pause after boot completes so the launcher settles
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// One line of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdbDevice {
    /// Serial, e.g. `emulator-5554`
    pub serial: String,
    /// `device`, `offline`, `unauthorized`, ...
    pub state: String,
}

impl AdbDevice {
    /// An emulator that finished connecting
    pub fn is_online_emulator(&self) -> bool {
        self.serial.starts_with("emulator-") && self.state == "device"
    }
}

/// Parse `adb devices` output
pub fn parse_adb_devices(output: &str) -> Vec<AdbDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*')
        })
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?.to_string();
            let state = parts.next()?.to_string();
            Some(AdbDevice { serial, state })
        })
        .collect()
}

/// Parse `emulator -list-avds` output
///
/// Diagnostic lines (`INFO    | ...`) are skipped; AVD names never contain
/// whitespace.
pub fn parse_avd_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(char::is_whitespace))
        .map(String::from)
        .collect()
}

/// Fields read from an AVD's `config.ini`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvdConfig {
    /// API level from `target=android-NN`
    pub api_level: Option<String>,
    /// `abi.type=`
    pub abi: Option<String>,
}

/// Parse an AVD `config.ini`
///
/// `image.sysdir.1` supplies the API level when `target=` is absent.
pub fn parse_avd_config(content: &str) -> AvdConfig {
    let mut config = AvdConfig::default();
    let mut sysdir_api = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "target" if config.api_level.is_none() => {
                config.api_level = API_LEVEL.captures(value).map(|c| c[1].to_string());
            }
            "image.sysdir.1" => {
                sysdir_api = API_LEVEL.captures(value).map(|c| c[1].to_string());
            }
            "abi.type" if config.abi.is_none() => config.abi = Some(value.to_string()),
            _ => {}
        }
    }
    if config.api_level.is_none() {
        config.api_level = sysdir_api;
    }
    config
}

/// Android release for an API level
pub fn android_version_for_api(api: &str) -> String {
    let version = match api {
        "35" => "15.0",
        "34" => "14.0",
        "33" => "13.0",
        "32" => "12.1",
        "31" => "12.0",
        "30" => "11.0",
        "29" => "10.0",
        "28" => "9.0",
        "27" => "8.1",
        "26" => "8.0",
        "25" => "7.1",
        "24" => "7.0",
        "23" => "6.0",
        "22" => "5.1",
        _ => return format!("API {}", api),
    };
    version.to_string()
}

/// `~/.android/avd/<name>.avd/config.ini`
pub fn avd_config_path(home: &Path, name: &str) -> PathBuf {
    home.join(".android")
        .join("avd")
        .join(format!("{}.avd", name))
        .join("config.ini")
}

/// Running state of an AVD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmulatorState {
    /// Booted
    Running,
    /// Not started
    Stopped,
}

impl fmt::Display for EmulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorState::Running => write!(f, "running"),
            EmulatorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// An Android virtual device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidEmulator {
    /// AVD name
    pub name: String,
    /// Identifier passed to `emulator -avd` (same as the name)
    pub id: String,
    /// API level
    pub api_level: String,
    /// Android release
    pub android_version: String,
    /// System image ABI
    pub abi: String,
    /// Running state
    pub state: EmulatorState,
}

impl AndroidEmulator {
    /// Build a descriptor from an AVD name and its parsed config
    pub fn from_config(name: &str, config: &AvdConfig, state: EmulatorState) -> Self {
        let api_level = config.api_level.clone().unwrap_or_else(|| UNKNOWN.to_string());
        let android_version = match &config.api_level {
            Some(api) => android_version_for_api(api),
            None => UNKNOWN.to_string(),
        };
        Self {
            name: name.to_string(),
            id: name.to_string(),
            api_level,
            android_version,
            abi: config.abi.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            state,
        }
    }

    /// Whether the AVD is booted
    pub fn is_running(&self) -> bool {
        self.state == EmulatorState::Running
    }
}

/// Emulators discovered through one `emulator` binary
pub struct EmulatorManager {
    program: PathBuf,
    home: Option<PathBuf>,
}

impl EmulatorManager {
    /// Use the given `emulator` binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            home: dirs::home_dir(),
        }
    }

    fn program_str(&self) -> String {
        self.program.display().to_string()
    }

    /// Enumerate AVDs with their state and config
    pub fn list(&self) -> Result<Vec<AndroidEmulator>> {
        Status::info("Searching for Android emulators...");

        let any_running = adb_devices().iter().any(AdbDevice::is_online_emulator);

        let result = run_command(&self.program_str(), &["-list-avds"])?;
        if !result.success {
            return Err(Error::command_failed("emulator -list-avds", result.output().trim()));
        }

        let emulators: Vec<AndroidEmulator> = parse_avd_list(&result.stdout)
            .into_iter()
            .map(|name| {
                let state = if any_running && qemu_process_running(&name) {
                    EmulatorState::Running
                } else {
                    EmulatorState::Stopped
                };
                let config = self.read_config(&name);
                AndroidEmulator::from_config(&name, &config, state)
            })
            .collect();

        let running = emulators.iter().filter(|e| e.is_running()).count();
        Status::info(&format!(
            "Found {} emulator(s) ({} running)",
            emulators.len(),
            running
        ));
        Ok(emulators)
    }

    fn read_config(&self, name: &str) -> AvdConfig {
        let Some(home) = &self.home else {
            return AvdConfig::default();
        };
        let path = avd_config_path(home, name);
        match std::fs::read_to_string(&path) {
            Ok(content) => parse_avd_config(&content),
            Err(e) => {
                tracing::debug!(avd = name, path = %path.display(), error = %e, "No AVD config");
                AvdConfig::default()
            }
        }
    }

    /// Whether `name` is already up
    pub fn is_running(&self, name: &str) -> bool {
        adb_devices().iter().any(AdbDevice::is_online_emulator) || qemu_process_running(name)
    }

    /// Start `name` detached and wait up to `wait` for it to finish booting
    ///
    /// A boot that outlasts `wait` only warns; the caller carries on.
    pub fn boot(&self, name: &str, wait: Duration) -> Result<BootOutcome> {
        Status::header(&format!("Starting emulator {}", name));

        if self.is_running(name) {
            Status::success("Emulator is already running, using it");
            return Ok(BootOutcome::AlreadyRunning);
        }

        let program = shell_quote(&self.program_str());
        let avd = shell_quote(name);
        let start = if cfg!(windows) {
            format!("start /B {} -avd {}", program, avd)
        } else {
            format!("nohup {} -avd {} > /dev/null 2>&1 &", program, avd)
        };
        ShellCommand::new(start)
            .description("Starting emulator")
            .capture()
            .run_checked()?;

        wait_for_boot(wait)
    }
}

/// How an emulator boot ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// It was running before we started
    AlreadyRunning,
    /// Booted after the given time
    Booted(Duration),
    /// Still booting when the wait ran out
    TimedOut,
}

/// Whether `getprop sys.boot_completed` output means booted
pub fn boot_completed(output: &str) -> bool {
    output.trim() == "1"
}

fn adb_devices() -> Vec<AdbDevice> {
    match run_command("adb", &["devices"]) {
        Ok(result) if result.success => parse_adb_devices(&result.stdout),
        _ => Vec::new(),
    }
}

#[cfg(unix)]
fn qemu_process_running(name: &str) -> bool {
    let pattern = shell_quote(&format!("qemu.*{}", name));
    let result = ShellCommand::new(format!("ps aux | grep {} | grep -v grep", pattern))
        .capture()
        .run();
    result.success && !result.stdout.trim().is_empty()
}

#[cfg(not(unix))]
fn qemu_process_running(_name: &str) -> bool {
    false
}

fn wait_for_boot(wait: Duration) -> Result<BootOutcome> {
    let started = Instant::now();
    let bar = progress::wait_bar(wait.as_secs(), "Waiting for the emulator to boot");

    while started.elapsed() < wait {
        interrupt::check()?;
        if adb_devices().iter().any(AdbDevice::is_online_emulator) {
            let booted = run_command("adb", &["shell", "getprop", "sys.boot_completed"])
                .map(|r| r.success && boot_completed(&r.stdout))
                .unwrap_or(false);
            if booted {
                let elapsed = started.elapsed();
                progress::finish_success(&bar, &format!("Emulator booted ({}s)", elapsed.as_secs()));
                thread::sleep(SETTLE_DELAY);
                return Ok(BootOutcome::Booted(elapsed));
            }
        }
        thread::sleep(Duration::from_secs(1));
        bar.set_position(started.elapsed().as_secs().min(wait.as_secs()));
    }

    progress::finish_error(&bar, "Boot wait timed out");
    Status::warning("Emulator boot timed out, continuing anyway");
    tracing::warn!(wait_secs = wait.as_secs(), "Emulator boot timed out");
    Ok(BootOutcome::TimedOut)
}

/// Print the emulator table
pub fn print_table(emulators: &[AndroidEmulator]) {
    if emulators.is_empty() {
        Status::warning("No Android emulators available");
        return;
    }
    Status::header("Available Android emulators");
    let mut table = Table::new(["No.", "Name", "Android version", "API", "ABI", "State"]);
    for (i, emu) in emulators.iter().enumerate() {
        table.row([
            (i + 1).to_string(),
            emu.name.clone(),
            emu.android_version.clone(),
            emu.api_level.clone(),
            emu.abi.clone(),
            emu.state.to_string(),
        ]);
    }
    table.print();
}

/// Resolve `--emulator <name|1-based index>`
pub fn resolve_choice(emulators: &[AndroidEmulator], choice: &str) -> Result<usize> {
    if let Some(i) = emulators.iter().position(|e| e.name == choice) {
        return Ok(i);
    }
    match choice.trim().parse::<usize>() {
        Ok(n) if (1..=emulators.len()).contains(&n) => Ok(n - 1),
        Ok(_) => Err(Error::invalid_selection(format!(
            "Index '{}' is out of range (1-{})",
            choice,
            emulators.len()
        ))),
        Err(_) => Err(Error::invalid_selection(format!(
            "'{}' is not a valid emulator name or index",
            choice
        ))),
    }
}

/// Pick an emulator from the flag or by prompting
pub fn select<'a>(
    emulators: &'a [AndroidEmulator],
    choice: Option<&str>,
    prompter: &Prompter,
) -> Result<&'a AndroidEmulator> {
    let index = match choice {
        Some(choice) => resolve_choice(emulators, choice)?,
        None => {
            let labels: Vec<String> = emulators
                .iter()
                .map(|e| format!("{} (Android {}, {})", e.name, e.android_version, e.state))
                .collect();
            prompter.select("Select an emulator", &labels, 0)?
        }
    };
    emulators
        .get(index)
        .ok_or_else(|| Error::invalid_selection("No emulator selected"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADB: &str = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
emulator-5554\tdevice
emulator-5556\toffline
R58M123ABC\tunauthorized

";

    const AVDS: &str = "\
INFO    | Storing crashdata in: /tmp/android-dev/emu-crash-34.1.20.db
Pixel_7_API_34
Pixel_Tablet_API_33
Nexus_5X_API_29
";

    const CONFIG: &str = "\
AvdId=Pixel_7_API_34
abi.type=arm64-v8a
hw.lcd.density=420
image.sysdir.1=system-images/android-34/google_apis/arm64-v8a/
target=android-34
";

    fn emulators() -> Vec<AndroidEmulator> {
        ["Pixel_7_API_34", "Pixel_Tablet_API_33", "Nexus_5X_API_29"]
            .iter()
            .map(|name| AndroidEmulator::from_config(name, &AvdConfig::default(), EmulatorState::Stopped))
            .collect()
    }

    #[test]
    fn test_parse_adb_devices() {
        let devices = parse_adb_devices(ADB);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert!(devices[0].is_online_emulator());
        assert!(!devices[1].is_online_emulator());
        assert_eq!(devices[2].state, "unauthorized");
        assert!(!devices[2].is_online_emulator());
    }

    #[test]
    fn test_parse_avd_list() {
        assert_eq!(
            parse_avd_list(AVDS),
            vec!["Pixel_7_API_34", "Pixel_Tablet_API_33", "Nexus_5X_API_29"]
        );
        assert!(parse_avd_list("\n\n").is_empty());
    }

    #[test]
    fn test_parse_avd_config() {
        let config = parse_avd_config(CONFIG);
        assert_eq!(config.api_level.as_deref(), Some("34"));
        assert_eq!(config.abi.as_deref(), Some("arm64-v8a"));
    }

    #[test]
    fn test_parse_avd_config_sysdir_fallback() {
        let config = parse_avd_config("image.sysdir.1=system-images/android-30/google_apis/x86/\n");
        assert_eq!(config.api_level.as_deref(), Some("30"));
        assert_eq!(config.abi, None);
    }

    #[test]
    fn test_descriptor_placeholders() {
        let emu = AndroidEmulator::from_config("Broken", &AvdConfig::default(), EmulatorState::Stopped);
        assert_eq!(emu.api_level, UNKNOWN);
        assert_eq!(emu.android_version, UNKNOWN);
        assert_eq!(emu.abi, UNKNOWN);
        assert_eq!(emu.id, "Broken");

        let emu = AndroidEmulator::from_config("Pixel", &parse_avd_config(CONFIG), EmulatorState::Running);
        assert_eq!(emu.android_version, "14.0");
        assert!(emu.is_running());
    }

    #[test]
    fn test_android_version_table() {
        assert_eq!(android_version_for_api("33"), "13.0");
        assert_eq!(android_version_for_api("27"), "8.1");
        assert_eq!(android_version_for_api("19"), "API 19");
    }

    #[test]
    fn test_avd_config_path() {
        let path = avd_config_path(Path::new("/home/dev"), "Pixel_7_API_34");
        assert_eq!(
            path,
            PathBuf::from("/home/dev/.android/avd/Pixel_7_API_34.avd/config.ini")
        );
    }

    #[test]
    fn test_resolve_choice() {
        let emus = emulators();
        assert_eq!(resolve_choice(&emus, "Nexus_5X_API_29").unwrap(), 2);
        assert_eq!(resolve_choice(&emus, "2").unwrap(), 1);
        assert!(resolve_choice(&emus, "0").is_err());
        assert!(resolve_choice(&emus, "4").is_err());
        assert!(resolve_choice(&emus, "Pixel_9").is_err());
    }

    #[test]
    fn test_select_defaults_without_terminal() {
        let emus = emulators();
        let prompter = Prompter::non_interactive();
        assert_eq!(select(&emus, None, &prompter).unwrap().name, "Pixel_7_API_34");
        assert_eq!(select(&emus, Some("3"), &prompter).unwrap().name, "Nexus_5X_API_29");
    }

    #[test]
    fn test_boot_completed() {
        assert!(boot_completed("1\n"));
        assert!(!boot_completed("0"));
        assert!(!boot_completed(""));
    }
}
