//! Terminal helpers shared by the flutterkit binaries
//!
//! - Status messages and formatting
//! - Progress bars for waits and spinners
//! - Interactive prompts that fall back to defaults when no terminal is attached

#![warn(missing_docs)]

pub mod output;
pub mod progress;
pub mod prompt;
pub mod table;
