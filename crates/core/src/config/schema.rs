//! Configuration schema definitions
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration for the gyroscope demo app.

use crate::patch::Replacement;
use serde::{Deserialize, Serialize};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub android: AndroidConfig,

    #[serde(default)]
    pub ios: IosConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// General project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Prefix for copied artifacts
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Directory (relative to the project root) that receives artifacts and logs
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_project_name() -> String {
    "gyroscope_app".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// Android toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidConfig {
    /// NDK version offered to `sdkmanager` when none is installed
    #[serde(default = "default_ndk_version")]
    pub ndk_version: String,

    /// Seconds to wait for an emulator to finish booting
    #[serde(default = "default_boot_wait")]
    pub emulator_boot_wait_secs: u64,

    /// Flutter device id used when `flutter devices` yields nothing usable
    #[serde(default = "default_emulator_device_id")]
    pub default_emulator_id: String,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            ndk_version: default_ndk_version(),
            emulator_boot_wait_secs: default_boot_wait(),
            default_emulator_id: default_emulator_device_id(),
        }
    }
}

fn default_ndk_version() -> String {
    "21.4.7075529".to_string()
}

fn default_boot_wait() -> u64 {
    60
}

fn default_emulator_device_id() -> String {
    "emulator-5554".to_string()
}

/// A literal patch applied to a plugin source file in the pub cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTarget {
    /// Package directory name, e.g. `vibration-1.9.0`
    pub package: String,
    /// File path relative to the package directory
    pub file: String,
    /// Substitutions to apply
    pub replacements: Vec<Replacement>,
}

/// iOS toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IosConfig {
    /// Hosted pub cache directory (`~` is expanded)
    #[serde(default = "default_pub_cache")]
    pub pub_cache: String,

    /// Plugin source patches
    #[serde(default = "default_patches")]
    pub patches: Vec<PatchTarget>,

    /// Deployment target written into the Podfile hook and podspecs
    #[serde(default = "default_deployment_target")]
    pub deployment_target: String,

    /// Package name prefixes whose pub-cache backups the deep clean removes
    #[serde(default = "default_problem_packages")]
    pub problem_packages: Vec<String>,
}

impl Default for IosConfig {
    fn default() -> Self {
        Self {
            pub_cache: default_pub_cache(),
            patches: default_patches(),
            deployment_target: default_deployment_target(),
            problem_packages: default_problem_packages(),
        }
    }
}

fn default_pub_cache() -> String {
    "~/.pub-cache/hosted/pub.dev".to_string()
}

fn default_patches() -> Vec<PatchTarget> {
    vec![
        PatchTarget {
            package: "device_info_plus-11.4.0".to_string(),
            file: "ios/device_info_plus/Sources/device_info_plus/FPPDeviceInfoPlusPlugin.m"
                .to_string(),
            replacements: vec![Replacement::new("natural_t", "vm_size_t")],
        },
        PatchTarget {
            package: "vibration-1.9.0".to_string(),
            file: "ios/Classes/VibrationPluginSwift.swift".to_string(),
            replacements: vec![Replacement::new("var params", "var _ /* params */")],
        },
    ]
}

fn default_deployment_target() -> String {
    "12.0".to_string()
}

fn default_problem_packages() -> Vec<String> {
    [
        "audioplayers_darwin",
        "vibration",
        "device_info_plus",
        "sensors_plus",
        "path_provider_foundation",
        "shared_preferences_foundation",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Web configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Port for `flutter run -d chrome`
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
        }
    }
}

fn default_web_port() -> u16 {
    8080
}

/// Commit-and-push helper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Expected `origin` URL
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// Default push branch
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Host checked before pushing
    #[serde(default = "default_host")]
    pub host: String,

    /// Addresses tried with `http.curloptResolve` when a normal push fails
    #[serde(default = "default_fallback_ips")]
    pub fallback_ips: Vec<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            branch: default_branch(),
            host: default_host(),
            fallback_ips: default_fallback_ips(),
        }
    }
}

fn default_remote_url() -> String {
    "https://github.com/Eiji-Y-work/gyroscopeApp.git".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_host() -> String {
    "github.com".to_string()
}

fn default_fallback_ips() -> Vec<String> {
    ["140.82.112.3", "140.82.113.3", "140.82.114.3"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Per-step timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_pub_get")]
    pub pub_get: u64,
    #[serde(default = "default_apk_build")]
    pub apk_build: u64,
    #[serde(default = "default_pod_install")]
    pub pod_install: u64,
    #[serde(default = "default_ios_build")]
    pub ios_build: u64,
    #[serde(default = "default_doctor")]
    pub doctor: u64,
    #[serde(default = "default_install")]
    pub install: u64,
    #[serde(default = "default_fix")]
    pub fix: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            pub_get: default_pub_get(),
            apk_build: default_apk_build(),
            pod_install: default_pod_install(),
            ios_build: default_ios_build(),
            doctor: default_doctor(),
            install: default_install(),
            fix: default_fix(),
        }
    }
}

fn default_pub_get() -> u64 {
    120
}

fn default_apk_build() -> u64 {
    1200
}

fn default_pod_install() -> u64 {
    300
}

fn default_ios_build() -> u64 {
    900
}

fn default_doctor() -> u64 {
    60
}

fn default_install() -> u64 {
    180
}

fn default_fix() -> u64 {
    60
}
