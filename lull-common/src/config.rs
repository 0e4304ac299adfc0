//! Configuration file resolution and loading
//!
//! Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config dir>/<app>/config.toml`)
//!
//! A file named explicitly (1 or 2) must exist. The per-user default is
//! optional: when it is missing, built-in defaults are used.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A resolved configuration file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: PathBuf,
    /// True when named by the CLI or environment (must exist)
    pub explicit: bool,
}

/// Resolve which configuration file to read
pub fn resolve_config_file(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<ConfigFile> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(ConfigFile {
            path: path.to_path_buf(),
            explicit: true,
        });
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(ConfigFile {
                path: PathBuf::from(path),
                explicit: true,
            });
        }
    }

    // Priority 3: per-user default location
    default_config_path(app_name).map(|path| ConfigFile {
        path,
        explicit: false,
    })
}

/// Platform config directory path for an application
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(app_name).join("config.toml"))
}

/// Load a TOML configuration, falling back to `T::default()` when no file applies
pub fn load_toml<T>(location: Option<&ConfigFile>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(location) = location else {
        info!("No configuration location available, using built-in defaults");
        return Ok(T::default());
    };

    if !location.path.exists() {
        if location.explicit {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                location.path.display()
            )));
        }
        warn!(
            "Config file {} not found, using built-in defaults",
            location.path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(&location.path)?;
    let parsed = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Invalid TOML in {}: {}", location.path.display(), e))
    })?;

    info!("Loaded configuration from {}", location.path.display());
    Ok(parsed)
}
