//! Configuration management for lull-mixer
//!
//! Bootstrap configuration is a single TOML file; every key is optional and
//! falls back to a built-in default. The file location is resolved by
//! `lull_common::config` (CLI argument, then `LULL_CONFIG`, then the per-user
//! config directory).

use crate::error::{Error, Result};
use crate::playback::fader::FadeSettings;
use crate::playback::policy::MixLimitPolicy;
use lull_common::config::{load_toml, ConfigFile};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LULL_CONFIG";

/// Application directory name under the platform config dir
pub const APP_NAME: &str = "lull";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Volume ramp timing
    pub fade: FadeConfig,

    /// Host audio-focus behaviour
    pub focus: FocusConfig,

    /// Concurrent-sound admission
    pub mix_limit: MixLimitConfig,

    /// In-memory renderer behaviour
    pub backend: BackendConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Fade timing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    /// Total ramp duration in milliseconds
    pub duration_ms: u64,

    /// Interval between volume steps in milliseconds
    pub step_ms: u64,
}

/// Audio focus configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Attenuation applied while the host asks the mixer to duck
    pub duck_factor: f32,
}

/// Mix limit configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MixLimitConfig {
    /// Enforce the limit at the engine layer
    pub enabled: bool,

    /// Maximum concurrently active sounds on the Free tier
    pub free_limit: usize,
}

/// Renderer backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Simulated time a renderer takes to start rendering after `play`
    pub prepare_delay_ms: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5750,
            logging: LoggingConfig::default(),
            fade: FadeConfig::default(),
            focus: FocusConfig::default(),
            mix_limit: MixLimitConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            step_ms: 50,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self { duck_factor: 0.3 }
    }
}

impl Default for MixLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            free_limit: 2,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { prepare_delay_ms: 0 }
    }
}

impl TomlConfig {
    /// Load and validate configuration from a resolved location
    pub fn load(location: Option<&ConfigFile>) -> Result<Self> {
        let config: TomlConfig = load_toml(location)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.fade.step_ms == 0 {
            return Err(Error::Config("fade.step_ms must be greater than 0".to_string()));
        }
        if self.fade.step_ms > self.fade.duration_ms {
            return Err(Error::Config(format!(
                "fade.step_ms ({}) must not exceed fade.duration_ms ({})",
                self.fade.step_ms, self.fade.duration_ms
            )));
        }
        if !(self.focus.duck_factor > 0.0 && self.focus.duck_factor <= 1.0) {
            return Err(Error::Config(format!(
                "focus.duck_factor must be in (0.0, 1.0], got {}",
                self.focus.duck_factor
            )));
        }
        if self.mix_limit.free_limit == 0 {
            return Err(Error::Config("mix_limit.free_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Fade timing for the registry
    pub fn fade_settings(&self) -> FadeSettings {
        FadeSettings {
            duration: Duration::from_millis(self.fade.duration_ms),
            step: Duration::from_millis(self.fade.step_ms),
        }
    }

    /// Admission policy for the registry
    pub fn mix_limit_policy(&self) -> MixLimitPolicy {
        MixLimitPolicy::new(self.mix_limit.free_limit).enforced(self.mix_limit.enabled)
    }

    /// Simulated renderer prepare delay
    pub fn prepare_delay(&self) -> Duration {
        Duration::from_millis(self.backend.prepare_delay_ms)
    }
}
