//! flutterkit-android
//!
//! Android APK builds, emulator runs and environment checks for the Flutter app.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flutterkit_android::build::{build_apk, ApkBuildOptions};
use flutterkit_android::run::{run_on_emulator, EmulatorRunOptions};
use flutterkit_android::sdk::AndroidSdkCheck;
use flutterkit_cli::output::{self, format_size, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::exit_codes;
use flutterkit_core::flutter::{self, BuildMode, FlutterProject};
use flutterkit_core::health::HealthChecker;
use flutterkit_core::interrupt;
use flutterkit_telemetry::{ErrorLog, TelemetryConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flutterkit-android")]
#[command(about = "Android builds and emulator runs for the Flutter app")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose flutter output and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Flutter project root
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an APK and copy it to the output directory
    Build {
        /// Debug build instead of release
        #[arg(long)]
        debug: bool,
        /// Skip `flutter clean`
        #[arg(long)]
        no_clean: bool,
        /// Disable shrinking for a faster release build
        #[arg(long)]
        fast_build: bool,
    },

    /// Pick an emulator, boot it and run the app on it
    Emulator {
        /// Only list the available emulators
        #[arg(long)]
        list: bool,
        /// Emulator name or 1-based index
        #[arg(long)]
        emulator: Option<String>,
        /// Skip `flutter clean`
        #[arg(long)]
        no_clean: bool,
    },

    /// Check the Flutter and Android toolchain
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Prefix of the error log written when the command fails
    fn log_kind(&self) -> &'static str {
        match self {
            Commands::Build { .. } => "android_build",
            Commands::Emulator { .. } => "android_emulator",
            Commands::Doctor { .. } => "android_doctor",
        }
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
        Ok(code) => code,
        Err(e) => {
            report_failure(cli.command.log_kind(), &e);
            exit_codes::FAILURE
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    std::env::set_current_dir(&cli.project_dir)
        .with_context(|| format!("Cannot enter {}", cli.project_dir.display()))?;
    let config = Config::load(cli.config.as_deref())?;
    let prompter = Prompter::new();

    match &cli.command {
        Commands::Build {
            debug,
            no_clean,
            fast_build,
        } => {
            let project = FlutterProject::open(".")?;
            let version = flutter::check_installation()?;
            Status::success(&format!("Flutter: {}", version));

            let options = ApkBuildOptions {
                mode: BuildMode::from_debug_flag(*debug),
                verbose: cli.verbose,
                no_clean: *no_clean,
                fast_build: *fast_build,
            };
            Status::header(&format!("Android APK ({})", options.mode));
            let artifact = build_apk(&project, &config, &options, &prompter)?;
            Status::success(&format!(
                "APK ready: {} ({})",
                artifact.path.display(),
                format_size(artifact.size_bytes)
            ));
            Ok(exit_codes::SUCCESS)
        }
        Commands::Emulator {
            list,
            emulator,
            no_clean,
        } => {
            let project = FlutterProject::open(".")?;
            Status::header("Android emulator run");
            let options = EmulatorRunOptions {
                verbose: cli.verbose,
                no_clean: *no_clean,
                list: *list,
                emulator: emulator.clone(),
            };
            run_on_emulator(&project, &config, &options, &prompter)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Doctor { json } => run_doctor(*json),
    }
}

fn run_doctor(json: bool) -> Result<i32> {
    let report = HealthChecker::new()
        .with_standard_checks()
        .with_android_checks()
        .add_check(AndroidSdkCheck)
        .run();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        Status::header("Android environment");
        output::print_health_report(&report);
    }

    Ok(if report.status.is_operational() {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    })
}

fn report_failure(kind: &str, error: &anyhow::Error) {
    let interrupted = error
        .downcast_ref::<flutterkit_core::Error>()
        .is_some_and(|e| e.is_interrupted());
    if interrupted {
        Status::warning(interrupt::MESSAGE);
        return;
    }
    Status::error(&format!("{:#}", error));

    let report = error
        .downcast_ref::<flutterkit_core::Error>()
        .map(flutterkit_core::Error::to_report);
    match ErrorLog::new(kind, format!("{:?}", error))
        .flutter_version(flutter::version())
        .contexts(report.iter().flat_map(|r| r.fields()))
        .write_to(Path::new("."))
    {
        Ok(path) => Status::info(&format!("Error log saved to {}", path.display())),
        Err(e) => Status::warning(&format!("Could not write the error log: {}", e)),
    }
}
