//! Android drivers for flutterkit
//!
//! This crate provides Android-specific functionality:
//! - SDK discovery and NDK repair
//! - Gradle `ndkVersion` rewrites after an NDK mismatch
//! - Emulator enumeration, selection and boot
//! - The APK build driver and the emulator run driver

#![warn(missing_docs)]

pub mod build;
pub mod emulator;
pub mod gradle;
pub mod ndk;
pub mod run;
pub mod sdk;
