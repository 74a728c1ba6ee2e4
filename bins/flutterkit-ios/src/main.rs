//! flutterkit-ios
//!
//! iOS debug builds with automatic remediation, simulator runs, device
//! listing, deep cleanup and environment checks. Everything except `doctor`
//! needs macOS.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flutterkit_cli::output::{self, format_duration, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::exit_codes;
use flutterkit_core::flutter::{self, FlutterProject};
use flutterkit_core::health::{HealthChecker, PathCheck};
use flutterkit_core::interrupt;
use flutterkit_ios::build::{build_with_remediation, InstallMode, IosBuildOptions};
use flutterkit_ios::run::{run_on_simulator, SimulatorRunOptions};
use flutterkit_ios::{clean, devices, require_macos, xcode};
use flutterkit_telemetry::{ErrorLog, TelemetryConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flutterkit-ios")]
#[command(about = "iOS builds, simulator runs and device tools for the Flutter app")]
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
    /// Repair dependencies, build the debug app and install it
    Build {
        /// Skip `flutter clean`
        #[arg(long)]
        no_clean: bool,
        /// What to do after a successful build
        #[arg(long, value_enum, default_value_t = Install::Xcode)]
        install: Install,
        /// Open the Xcode workspace without building
        #[arg(long)]
        xcode_only: bool,
    },

    /// Pick a simulator, boot it and run the app on it
    Simulator {
        /// Only list the available simulators
        #[arg(long)]
        list: bool,
        /// Simulator UDID or 1-based index
        #[arg(long)]
        simulator: Option<String>,
        /// Skip `flutter clean`
        #[arg(long)]
        no_clean: bool,
    },

    /// List connected iPhones and iPads
    Devices,

    /// Remove build output, Pods, Xcode caches and pub-cache backups
    Clean,

    /// Check the Flutter and Xcode toolchain
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Post-build step
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Install {
    /// Print the manual Xcode steps
    Manual,
    /// `flutter install` onto a connected device
    Device,
    /// Open Xcode and start Run
    Xcode,
}

impl From<Install> for InstallMode {
    fn from(install: Install) -> Self {
        match install {
            Install::Manual => InstallMode::Manual,
            Install::Device => InstallMode::Device,
            Install::Xcode => InstallMode::Xcode,
        }
    }
}

impl Commands {
    fn log_kind(&self) -> &'static str {
        match self {
            Commands::Build { .. } => "ios_build",
            Commands::Simulator { .. } => "ios_simulator",
            Commands::Devices => "ios_devices",
            Commands::Clean => "ios_clean",
            Commands::Doctor { .. } => "ios_doctor",
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
            no_clean,
            install,
            xcode_only,
        } => {
            require_macos("iOS builds")?;
            let project = FlutterProject::open(".")?;
            if *xcode_only {
                xcode::open_with_instructions(project.root())?;
                return Ok(exit_codes::SUCCESS);
            }

            Status::header("iOS debug build");
            let doctor = project.doctor(Config::secs(config.schema.timeouts.doctor));
            if !doctor.success {
                Status::warning("flutter doctor reported problems, continuing");
            }
            let version = flutter::check_installation()?;
            Status::success(&format!("Flutter: {}", version));
            devices::print_list(&devices::connected());

            let options = IosBuildOptions {
                verbose: cli.verbose,
                no_clean: *no_clean,
                install: (*install).into(),
            };
            let elapsed = build_with_remediation(&project, &config, &options, &prompter)?;
            Status::success(&format!("Done in {}", format_duration(elapsed)));
            Ok(exit_codes::SUCCESS)
        }
        Commands::Simulator {
            list,
            simulator,
            no_clean,
        } => {
            let project = FlutterProject::open(".")?;
            Status::header("iOS simulator run");
            let options = SimulatorRunOptions {
                verbose: cli.verbose,
                no_clean: *no_clean,
                list: *list,
                simulator: simulator.clone(),
            };
            run_on_simulator(&project, &config, &options, &prompter)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Devices => {
            require_macos("iOS device listing")?;
            devices::print_list(&devices::connected());
            Ok(exit_codes::SUCCESS)
        }
        Commands::Clean => {
            let project = FlutterProject::open(".")?;
            clean::deep_clean(&project, &config);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Doctor { json } => run_doctor(&config, *json),
    }
}

fn run_doctor(config: &Config, json: bool) -> Result<i32> {
    let report = HealthChecker::new()
        .with_standard_checks()
        .with_ios_checks()
        .add_check(PathCheck::optional("pub-cache", config.pub_cache_dir()))
        .run();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        Status::header("iOS environment");
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
