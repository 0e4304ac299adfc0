//! Ambient sound catalog types
//!
//! The engine only reads and copies these values; the catalog that owns them
//! lives outside the mixer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

fn default_volume() -> f32 {
    1.0
}

/// A named ambient audio asset with an adjustable volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    /// Stable key used by the engine for every per-sound table
    pub id: String,

    /// Display name
    pub name: String,

    /// Reference to the audio asset (path or URI understood by the backend)
    pub asset: String,

    /// Requested volume (0.0-1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Whether the sound is selected in the current mix
    #[serde(default)]
    pub selected: bool,

    /// Whether the sound requires the Premium tier
    #[serde(default)]
    pub premium: bool,
}

impl Sound {
    /// Create a free, unselected sound at full volume
    pub fn new(id: impl Into<String>, name: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset: asset.into(),
            volume: default_volume(),
            selected: false,
            premium: false,
        }
    }

    /// Copy of this sound with a different requested volume
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Copy of this sound flagged as premium-only
    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }
}

/// Subscription tier of the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionTier::Free => write!(f, "free"),
            SubscriptionTier::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            other => Err(Error::InvalidInput(format!(
                "Unknown subscription tier '{}'",
                other
            ))),
        }
    }
}
