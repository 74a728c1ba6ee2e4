//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file names searched in the working directory, in order
pub const CONFIG_CANDIDATES: [&str; 3] = [
    ".flutterkit.toml",
    "flutterkit.toml",
    ".config/flutterkit.toml",
];

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed settings
    pub schema: ConfigSchema,
    /// File the settings came from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    ///
    /// An explicit path must exist. Without one the standard locations are
    /// searched and defaults are used when none is present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => {
                return Err(Error::new(
                    ErrorCode::ConfigNotFound,
                    format!("Config file not found: {}", p.display()),
                ))
            }
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(Path::new(".")),
        };

        let schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        if let Some(p) = &config_path {
            tracing::debug!(path = %p.display(), "Loaded configuration");
        }

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(Self {
            schema: toml::from_str(content)?,
            path: None,
        })
    }

    /// Pub cache directory with `~` expanded
    pub fn pub_cache_dir(&self) -> PathBuf {
        expand_path(&self.schema.ios.pub_cache)
    }

    /// Output directory for one platform, under `project_root`
    pub fn output_dir(&self, project_root: &Path, platform: &str) -> PathBuf {
        project_root
            .join(expand_path(&self.schema.project.output_dir))
            .join(platform)
    }

    /// Convert a timeout in seconds to a `Duration`
    pub fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }
}

/// Expand a leading `~` in a path setting
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Find configuration file in standard locations
fn find_config_file(base: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|p| p.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::new(
            ErrorCode::ConfigParseError,
            format!("Failed to parse config file {}: {}", path.display(), e),
        )
    })
}
