//! flutterkit-build
//!
//! Build the Flutter app for Android, iOS or both in one run.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use flutterkit_android::build::{build_apk, ApkBuildOptions};
use flutterkit_cli::output::{self, format_duration, format_size, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::exit_codes;
use flutterkit_core::flutter::{self, BuildMode, FlutterProject};
use flutterkit_core::interrupt;
use flutterkit_ios::build::{build_ios_debug, InstallMode, IosBuildOptions};
use flutterkit_telemetry::{ErrorLog, TelemetryConfig, Timer};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flutterkit-build")]
#[command(about = "Build the Flutter app for Android, iOS or both")]
#[command(version)]
struct Cli {
    /// Platform to build
    #[arg(long, value_enum, default_value_t = Platform::All)]
    platform: Platform,

    /// Build in debug mode (Android is release by default)
    #[arg(long)]
    debug: bool,

    /// Skip `flutter clean`
    #[arg(long)]
    no_clean: bool,

    /// Disable shrinking for a faster release build
    #[arg(long)]
    fast_build: bool,

    /// Install the iOS build on a connected device
    #[arg(long)]
    install: bool,

    /// Verbose flutter output and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Flutter project root
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Platform {
    Android,
    Ios,
    All,
}

impl Platform {
    fn android(self) -> bool {
        matches!(self, Platform::Android | Platform::All)
    }

    fn ios(self) -> bool {
        matches!(self, Platform::Ios | Platform::All)
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        output::set_colors(false);
    }
    let _telemetry = match flutterkit_telemetry::init_with_config(TelemetryConfig {
        verbose: cli.verbose,
        color: !cli.no_color,
        ..TelemetryConfig::default()
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            Status::warning(&format!("Logging is unavailable: {}", e));
            None
        }
    };
    if let Err(e) = interrupt::install() {
        Status::warning(&e.to_string());
    }

    let exit_code = match run(&cli) {
        Ok(failures) if failures.is_empty() => exit_codes::SUCCESS,
        Ok(failures) => {
            write_error_log(&failures.join("\n\n"));
            exit_codes::FAILURE
        }
        Err(e) => {
            report_failure(&e);
            exit_codes::FAILURE
        }
    };
    std::process::exit(exit_code);
}

/// Returns the error text of every build that failed
fn run(cli: &Cli) -> Result<Vec<String>> {
    Status::header("Flutter app build");

    let project = FlutterProject::open(&cli.project_dir)?;
    std::env::set_current_dir(project.root())?;
    let config = Config::load(cli.config.as_deref())?;
    let prompter = Prompter::new();

    if prompter.confirm("Run flutter doctor -v first?", false)? {
        let doctor = project.doctor(Config::secs(config.schema.timeouts.doctor));
        if !doctor.success {
            Status::warning("flutter doctor reported problems");
        }
    }

    let version = flutter::check_installation()?;
    Status::success(&format!("Flutter: {}", version));
    tracing::debug!(root = %project.root().display(), platform = ?cli.platform, "Starting build");

    let timer = Timer::start("flutter_build");
    let mut failures = Vec::new();

    if cli.platform.android() {
        Status::header("Android APK");
        let options = ApkBuildOptions {
            mode: BuildMode::from_debug_flag(cli.debug),
            verbose: cli.verbose,
            no_clean: cli.no_clean,
            fast_build: cli.fast_build,
        };
        match build_apk(&project, &config, &options, &prompter) {
            Ok(artifact) => Status::success(&format!(
                "APK: {} ({})",
                artifact.path.display(),
                format_size(artifact.size_bytes)
            )),
            Err(e) if e.is_interrupted() => return Err(e.into()),
            Err(e) => {
                Status::error(&e.to_string());
                Status::warning("Android APK build failed");
                failures.push(format!("Android: {}", e));
            }
        }
    }

    if cli.platform.ios() {
        if cli.platform == Platform::All && !cfg!(target_os = "macos") {
            Status::warning("iOS builds need macOS, skipping iOS");
        } else {
            Status::header("iOS debug build");
            let options = IosBuildOptions {
                verbose: cli.verbose,
                no_clean: cli.no_clean,
                install: if cli.install {
                    InstallMode::Device
                } else {
                    InstallMode::Manual
                },
            };
            match build_ios_debug(&project, &config, &options, &prompter) {
                Ok(elapsed) => Status::info(&format!("iOS build time: {}", format_duration(elapsed))),
                Err(e) if e.is_interrupted() => return Err(e.into()),
                Err(e) => {
                    Status::error(&e.to_string());
                    Status::warning("iOS build failed");
                    failures.push(format!("iOS: {}", e));
                }
            }
        }
    }

    println!();
    println!("Total time: {}", format_duration(timer.stop()));
    if failures.is_empty() {
        Status::success("All builds finished");
    } else {
        Status::warning("Some builds failed, see the errors above");
    }
    Ok(failures)
}

fn report_failure(error: &anyhow::Error) {
    let interrupted = error
        .downcast_ref::<flutterkit_core::Error>()
        .is_some_and(|e| e.is_interrupted());
    if interrupted {
        Status::warning(interrupt::MESSAGE);
        return;
    }
    Status::error(&format!("{:#}", error));
    write_error_log(&format!("{:?}", error));
}

/// Logs land in the working directory, which is the project root once it opened
fn write_error_log(message: &str) {
    match ErrorLog::new("build", message)
        .flutter_version(flutter::version())
        .write_to(Path::new("."))
    {
        Ok(path) => Status::info(&format!("Error log saved to {}", path.display())),
        Err(e) => Status::warning(&format!("Could not write the error log: {}", e)),
    }
}
