//! iOS drivers for flutterkit
//!
//! This crate provides iOS/Xcode-specific functionality:
//! - Simulator enumeration, selection, boot and creation
//! - Physical device discovery through `xctrace`
//! - CocoaPods install with repo-update retry
//! - Podfile hooks, pub-cache plugin patches and audioplayers stubs
//! - Stale file cleanup and dependency repair
//! - The debug build driver and the simulator run driver

#![warn(missing_docs)]

pub mod audioplayers;
pub mod build;
pub mod clean;
pub mod cocoapods;
pub mod devices;
pub mod patches;
pub mod podfile;
pub mod run;
pub mod simulator;
pub mod xcode;

use flutterkit_core::error::{Error, Result};

/// Fail unless running on macOS
pub fn require_macos(what: &str) -> Result<()> {
    if cfg!(target_os = "macos") {
        Ok(())
    } else {
        Err(Error::unsupported_platform(what, "macOS"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_macos() {
        let result = require_macos("iOS builds");
        assert_eq!(result.is_ok(), cfg!(target_os = "macos"));
    }
}
