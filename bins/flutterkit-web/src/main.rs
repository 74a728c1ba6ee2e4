//! flutterkit-web
//!
//! Run the Flutter app in Chrome.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flutterkit_cli::output::{self, Status};
use flutterkit_core::config::Config;
use flutterkit_core::error::exit_codes;
use flutterkit_core::flutter::{self, FlutterProject};
use flutterkit_core::health::HealthChecker;
use flutterkit_core::interrupt;
use flutterkit_telemetry::{ErrorLog, TelemetryConfig};
use flutterkit_web::chrome::ChromeCheck;
use flutterkit_web::run::{run_in_chrome, ChromeRunOptions};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flutterkit-web")]
#[command(about = "Run the Flutter app in Chrome")]
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
    /// Build and serve the app in Chrome until stopped
    Run {
        /// Web server port (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
        /// Skip `flutter clean`
        #[arg(long)]
        no_clean: bool,
    },

    /// Check Flutter and Chrome
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
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
            report_failure(&e);
            exit_codes::FAILURE
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    std::env::set_current_dir(&cli.project_dir)
        .with_context(|| format!("Cannot enter {}", cli.project_dir.display()))?;
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Run { port, no_clean } => {
            let project = FlutterProject::open(".")?;
            Status::header("Chrome run");
            let options = ChromeRunOptions {
                verbose: cli.verbose,
                no_clean: *no_clean,
                port: *port,
            };
            run_in_chrome(&project, &config, &options)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Doctor { json } => {
            let report = HealthChecker::new()
                .with_standard_checks()
                .add_check(ChromeCheck)
                .run();
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                Status::header("Web environment");
                output::print_health_report(&report);
            }
            Ok(if report.status.is_operational() {
                exit_codes::SUCCESS
            } else {
                exit_codes::FAILURE
            })
        }
    }
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

    let report = error
        .downcast_ref::<flutterkit_core::Error>()
        .map(flutterkit_core::Error::to_report);
    match ErrorLog::new("chrome_run", format!("{:?}", error))
        .flutter_version(flutter::version())
        .contexts(report.iter().flat_map(|r| r.fields()))
        .write_to(Path::new("."))
    {
        Ok(path) => Status::info(&format!("Error log saved to {}", path.display())),
        Err(e) => Status::warning(&format!("Could not write the error log: {}", e)),
    }
}
