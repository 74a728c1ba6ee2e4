//! Core utilities for the flutterkit build tools
//!
//! This crate provides shared functionality used by every platform driver:
//!
//! - **Error handling**: coded errors with context and recovery suggestions
//! - **Process execution**: one shell command runner with streaming, capture,
//!   spinner, timeouts and SIGTERM → SIGKILL escalation
//! - **Interrupts**: Ctrl+C handling shared by the runner and the binaries
//! - **Configuration**: TOML-based configuration with defaults
//! - **Health checks**: toolchain probes
//! - **Text rewriting**: `key=value` properties files and literal/regex patches
//! - **Flutter**: wrappers around the `flutter` CLI
//! - **Git**: command-line git for the commit-and-push helper
//!
//! # Example
//!
//! ```rust,no_run
//! use flutterkit_core::process::ShellCommand;
//! use std::time::Duration;
//!
//! let result = ShellCommand::new("flutter pub get")
//!     .description("Resolving Flutter dependencies")
//!     .timeout(Duration::from_secs(120))
//!     .spinner()
//!     .run();
//!
//! if !result.success {
//!     eprintln!("{}", result.output());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod flutter;
pub mod git;
pub mod health;
pub mod interrupt;
pub mod network;
pub mod patch;
pub mod process;
pub mod properties;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::flutter::BuildMode;
    pub use crate::git::GitRepo;
    pub use crate::health::{HealthChecker, HealthReport, HealthStatus};
    pub use crate::process::{CommandResult, OutputMode, ShellCommand, Termination};
}
