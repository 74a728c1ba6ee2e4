//! Web drivers for flutterkit
//!
//! - Google Chrome detection on macOS, Linux and Windows
//! - The `flutter run -d chrome` driver

#![warn(missing_docs)]

pub mod chrome;
pub mod run;
