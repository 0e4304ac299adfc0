//! # Lull Common Library
//!
//! Shared code for the Lull ambient mixer:
//! - Domain types consumed by the engine (`Sound`, `SubscriptionTier`)
//! - Host audio-focus change values (`FocusChange`)
//! - Event types broadcast to observers (`MixerEvent`)
//! - Configuration file resolution
//! - Countdown display formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod sound;

pub use error::{Error, Result};
pub use events::{FocusChange, MixerEvent};
pub use sound::{Sound, SubscriptionTier};
