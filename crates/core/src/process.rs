//! Process execution utilities
//!
//! Every external tool the drivers touch goes through [`ShellCommand`]:
//! - the command line runs under the platform shell (`sh -c` / `cmd /C`)
//! - stdout and stderr are drained on two reader threads
//! - output is streamed live, captured silently, or hidden behind a spinner
//! - an optional timeout escalates from SIGTERM to a forced kill
//!
//! The lower level `run_command*` helpers run a program with explicit
//! arguments and no shell, for probes and git plumbing.

use crate::error::{Error, Result};
use crate::interrupt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between child status polls
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default time a child gets between SIGTERM and the forced kill
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How command output is presented while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Echo every line as it arrives (and still buffer it)
    #[default]
    Stream,
    /// Buffer silently
    Capture,
    /// Buffer silently and show a spinner with elapsed time
    Spinner,
}

/// How a command run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own
    Exited,
    /// The process was killed after exceeding its timeout
    TimedOut(Duration),
    /// The user pressed Ctrl+C while it ran
    Interrupted,
    /// The process could not be started
    SpawnFailed,
}

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code of the command, -1 when it never exited normally
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// How the run ended
    pub termination: Termination,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl CommandResult {
    /// Create from std::process::Output
    pub fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            termination: Termination::Exited,
            duration: Duration::ZERO,
        }
    }

    fn spawn_failed(message: String, started: Instant) -> Self {
        Self {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: message,
            termination: Termination::SpawnFailed,
            duration: started.elapsed(),
        }
    }

    fn interrupted_before_start() -> Self {
        Self {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            termination: Termination::Interrupted,
            duration: Duration::ZERO,
        }
    }

    /// Stdout on success, otherwise the most useful error text
    pub fn output(&self) -> String {
        if self.success {
            return self.stdout.clone();
        }
        match self.termination {
            Termination::TimedOut(limit) => {
                format!("Command timed out after {}", format_limit(limit))
            }
            Termination::Interrupted => interrupt::MESSAGE.to_string(),
            Termination::Exited | Termination::SpawnFailed => {
                if self.stderr.trim().is_empty() {
                    self.stdout.clone()
                } else {
                    self.stderr.clone()
                }
            }
        }
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Whether the run was cut short by the timeout
    pub fn timed_out(&self) -> bool {
        matches!(self.termination, Termination::TimedOut(_))
    }

    /// Whether the run was cut short by Ctrl+C
    pub fn interrupted(&self) -> bool {
        self.termination == Termination::Interrupted
    }

    /// Turn a failed run into the matching coded error
    pub fn into_result(self, description: &str) -> Result<CommandResult> {
        if self.success {
            return Ok(self);
        }
        match self.termination {
            Termination::Interrupted => Err(Error::interrupted()),
            Termination::TimedOut(limit) => Err(Error::timeout(description, limit)),
            Termination::SpawnFailed => Err(Error::process(format!(
                "Failed to start {}: {}",
                description,
                self.stderr.trim()
            ))),
            Termination::Exited => {
                let detail = self.output();
                Err(Error::command_failed(description, detail.trim()))
            }
        }
    }
}

/// Builder for a single shell command run
///
/// A description turns on the `===== description =====` banner, the echoed
/// command line and the failure report; without one the run is silent apart
/// from streamed output.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    display: Option<String>,
    description: Option<String>,
    timeout: Option<Duration>,
    grace_period: Duration,
    mode: OutputMode,
    dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ShellCommand {
    /// Create a command from a full shell command line
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            display: None,
            description: None,
            timeout: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            mode: OutputMode::Stream,
            dir: None,
            env: Vec::new(),
        }
    }

    /// Human-readable label for banners, spinners and errors
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Text shown and logged instead of the real command line
    ///
    /// Used when the command line embeds a credential.
    pub fn display_as(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Kill the command once it runs longer than this
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Time allowed between SIGTERM and the forced kill
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the output mode
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Echo output live
    pub fn stream(self) -> Self {
        self.mode(OutputMode::Stream)
    }

    /// Buffer output silently
    pub fn capture(self) -> Self {
        self.mode(OutputMode::Capture)
    }

    /// Buffer output behind a spinner
    pub fn spinner(self) -> Self {
        self.mode(OutputMode::Spinner)
    }

    /// Run in this working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as shown to the user
    pub fn display_command(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.command)
    }

    /// Run to completion
    ///
    /// Never returns an error: spawn failures, timeouts and interrupts are
    /// all reported through [`CommandResult::termination`].
    pub fn run(&self) -> CommandResult {
        let started = Instant::now();
        let label = self
            .description
            .clone()
            .unwrap_or_else(|| self.display_command().to_string());

        if let Some(description) = &self.description {
            println!("\n===== {} =====", description);
            println!("$ {}", self.display_command());
        }

        if interrupt::is_interrupted() {
            return CommandResult::interrupted_before_start();
        }

        tracing::debug!(command = %self.display_command(), dir = ?self.dir, timeout = ?self.timeout, "Spawning command");

        let mut cmd = self.build_command();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(command = %self.display_command(), error = %e, "Failed to spawn command");
                let result = CommandResult::spawn_failed(e.to_string(), started);
                self.report_failure(&result);
                return result;
            }
        };

        let _running = interrupt::enter_command();
        let echo = self.mode == OutputMode::Stream;
        let stdout_reader = child
            .stdout
            .take()
            .map(|pipe| spawn_reader(pipe, echo.then_some(Echo::Stdout)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| spawn_reader(pipe, echo.then_some(Echo::Stderr)));

        let spinner = (self.mode == OutputMode::Spinner).then(|| start_spinner(&label));

        let (termination, exit_code) = self.wait(&mut child, started);

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();

        let result = CommandResult {
            success: termination == Termination::Exited && exit_code == 0,
            exit_code,
            stdout,
            stderr,
            termination,
            duration: started.elapsed(),
        };

        tracing::debug!(
            command = %self.display_command(),
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "Command finished"
        );

        match result.termination {
            Termination::TimedOut(limit) => {
                eprintln!(
                    "\n{} timed out after {} and was stopped",
                    label,
                    format_limit(limit)
                );
            }
            Termination::Interrupted => eprintln!("\n{}", interrupt::MESSAGE),
            _ if !result.success => self.report_failure(&result),
            _ => {}
        }

        result
    }

    /// Run and convert failure into an error
    pub fn run_checked(&self) -> Result<CommandResult> {
        let label = self
            .description
            .clone()
            .unwrap_or_else(|| self.display_command().to_string());
        self.run().into_result(&label)
    }

    fn build_command(&self) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", &self.command]);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &self.command]);
            cmd
        };

        // Interactive commands (password prompts, `flutter run`) need the terminal.
        if self.mode == OutputMode::Stream {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        // A separate group lets the timeout reach grandchildren of `sh -c`,
        // but takes the child out of the terminal's foreground group.
        #[cfg(unix)]
        if self.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    fn wait(&self, child: &mut Child, started: Instant) -> (Termination, i32) {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let termination = if interrupt::is_interrupted() {
                        Termination::Interrupted
                    } else {
                        Termination::Exited
                    };
                    return (termination, status.code().unwrap_or(-1));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll child process");
                    terminate(child, self.grace_period, self.timeout.is_some());
                    return (Termination::Exited, -1);
                }
            }

            if interrupt::is_interrupted() {
                terminate(child, self.grace_period, self.timeout.is_some());
                return (Termination::Interrupted, -1);
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() > limit {
                    tracing::warn!(command = %self.display_command(), "Timeout reached, terminating");
                    terminate(child, self.grace_period, true);
                    return (Termination::TimedOut(limit), -1);
                }
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    fn report_failure(&self, result: &CommandResult) {
        if self.description.is_none() {
            return;
        }
        eprintln!("Command failed with exit code {}", result.exit_code);
        let text = result.output();
        if !text.trim().is_empty() && self.mode != OutputMode::Stream {
            eprintln!("{}", text.trim_end());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Echo {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(pipe: R, echo: Option<Echo>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        for chunk in BufReader::new(pipe).split(b'\n') {
            let Ok(bytes) = chunk else { break };
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim_end_matches('\r');
            match echo {
                Some(Echo::Stdout) => println!("{}", line),
                Some(Echo::Stderr) => eprintln!("{}", line),
                None => {}
            }
            buffer.push_str(line);
            buffer.push('\n');
        }
        buffer
    })
}

fn join_reader(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn start_spinner(label: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(label.to_string());
    spinner.enable_steady_tick(POLL_INTERVAL);
    spinner
}

/// SIGTERM, wait out the grace period, then force-kill
#[cfg(unix)]
fn terminate(child: &mut Child, grace: Duration, grouped: bool) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    let sent = if grouped {
        killpg(pid, Signal::SIGTERM)
    } else {
        kill(pid, Signal::SIGTERM)
    };
    if let Err(e) = sent {
        tracing::debug!(error = %e, "SIGTERM delivery failed");
    }

    let deadline = Instant::now() + grace;
    let mut exited = false;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            exited = true;
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    // The group can outlive its leader and keep the output pipes open.
    if grouped {
        match killpg(pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(error = %e, "SIGKILL delivery failed"),
        }
    }
    if !exited {
        tracing::warn!(pid = child.id(), "Child ignored SIGTERM, killing");
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(windows)]
fn terminate(child: &mut Child, _grace: Duration, _grouped: bool) {
    let _ = child.kill();
    let _ = child.wait();
}

/// `300ms`, `5s` or `1.5s`
pub(crate) fn format_limit(limit: Duration) -> String {
    if limit < Duration::from_secs(1) {
        format!("{}ms", limit.as_millis())
    } else if limit.subsec_millis() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{:.1}s", limit.as_secs_f64())
    }
}

/// Quote a single argument for the platform shell
pub fn shell_quote(arg: &str) -> String {
    #[cfg(windows)]
    {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
    #[cfg(not(windows))]
    {
        if !arg.is_empty()
            && arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c))
        {
            return arg.to_string();
        }
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Run a command and capture output
pub fn run_command(program: &str, args: &[&str]) -> Result<CommandResult> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    Ok(CommandResult::from_output(output))
}

fn spawn_error(program: &str, error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::NotFound {
        Error::command_not_found(program)
    } else {
        Error::process(format!("Failed to execute {}: {}", program, error))
    }
}

/// Run a command in a specific directory
pub fn run_command_in_dir(program: &str, args: &[&str], dir: &Path) -> Result<CommandResult> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    Ok(CommandResult::from_output(output))
}

/// Check if a command exists in PATH
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Get the path to a command
pub fn which_command(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists_sh() {
        #[cfg(unix)]
        assert!(command_exists("sh"));
    }

    #[test]
    fn test_command_exists_nonexistent() {
        assert!(!command_exists("nonexistent_command_12345"));
    }

    #[test]
    fn test_run_command_echo() {
        let result = run_command("echo", &["hello"]).unwrap();
        assert!(result.success);
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn test_run_command_missing_program() {
        let err = run_command("nonexistent_command_12345", &[]).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CommandNotFound);
    }

    #[test]
    fn test_shell_command_echo() {
        let result = ShellCommand::new("echo hello").capture().run();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.termination, Termination::Exited);
        assert_eq!(result.output().trim(), "hello");
    }

    #[test]
    fn test_shell_command_stream_still_buffers() {
        let result = ShellCommand::new("echo streamed").stream().run();
        assert!(result.success);
        assert!(result.stdout.contains("streamed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_command_nonzero_exit() {
        let result = ShellCommand::new("echo oops 1>&2; exit 3").capture().run();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.output().trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_command_failure_falls_back_to_stdout() {
        let result = ShellCommand::new("echo only-stdout; exit 1").capture().run();
        assert!(!result.success);
        assert_eq!(result.output().trim(), "only-stdout");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_command_timeout_is_bounded() {
        let started = Instant::now();
        let result = ShellCommand::new("sleep 30")
            .timeout(Duration::from_millis(300))
            .grace_period(Duration::from_millis(500))
            .capture()
            .run();

        assert!(!result.success);
        assert!(result.timed_out());
        assert!(result.output().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_reaches_grandchildren_ignoring_sigterm() {
        let started = Instant::now();
        let result = ShellCommand::new("(trap '' TERM; sleep 8); echo done")
            .timeout(Duration::from_millis(300))
            .grace_period(Duration::from_millis(500))
            .capture()
            .run();

        assert!(result.timed_out());
        assert!(!result.stdout.contains("done"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_limits() {
        assert_eq!(format_limit(Duration::from_millis(300)), "300ms");
        assert_eq!(format_limit(Duration::from_secs(120)), "120s");
        assert_eq!(format_limit(Duration::from_millis(1500)), "1.5s");

        let result = CommandResult {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            termination: Termination::TimedOut(Duration::from_millis(300)),
            duration: Duration::from_millis(300),
        };
        assert_eq!(result.output(), "Command timed out after 300ms");
        let err = result.into_result("flutter devices").unwrap_err();
        assert!(err.message.contains("within 300ms"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_command_current_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellCommand::new("pwd; echo $FLUTTERKIT_TEST_VAR")
            .current_dir(dir.path())
            .env("FLUTTERKIT_TEST_VAR", "value42")
            .capture()
            .run();
        assert!(result.success);
        assert!(result.stdout.contains("value42"));
        let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(result.stdout.contains(&name));
    }

    #[test]
    fn test_into_result_maps_failures() {
        let failed = CommandResult {
            success: false,
            exit_code: 1,
            stdout: String::new(),
            stderr: "boom".to_string(),
            termination: Termination::Exited,
            duration: Duration::ZERO,
        };
        let err = failed.into_result("flutter pub get").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::CommandFailed);

        let timed_out = CommandResult {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            termination: Termination::TimedOut(Duration::from_secs(5)),
            duration: Duration::from_secs(5),
        };
        let err = timed_out.into_result("pod install").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ProcessTimeout);
    }

    #[test]
    fn test_display_as_hides_command() {
        let cmd = ShellCommand::new("git push https://secret@github.com/o/r.git main")
            .display_as("git push https://***@github.com/o/r.git main");
        assert!(!cmd.display_command().contains("secret"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("main"), "main");
        assert_eq!(shell_quote("it's done"), "'it'\\''s done'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_command_result_combined_output() {
        let result = CommandResult {
            success: true,
            exit_code: 0,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            termination: Termination::Exited,
            duration: Duration::ZERO,
        };
        assert!(result.combined_output().contains("out"));
        assert!(result.combined_output().contains("err"));
    }
}
