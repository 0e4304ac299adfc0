//! Event types for the Lull event system
//!
//! Every observable change in the mixer is broadcast as a `MixerEvent`.
//! Events are serialized with a `type` tag so SSE clients can dispatch on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host audio-focus change delivered to the mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusChange {
    /// Focus granted or returned
    Gain,
    /// Focus lost for an unbounded time
    Loss,
    /// Focus lost for a short time; playback may resume on regain
    LossTransient,
    /// Focus lost for a short time; playback may continue at reduced volume
    LossTransientCanDuck,
}

impl fmt::Display for FocusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusChange::Gain => write!(f, "gain"),
            FocusChange::Loss => write!(f, "loss"),
            FocusChange::LossTransient => write!(f, "loss_transient"),
            FocusChange::LossTransientCanDuck => write!(f, "loss_transient_can_duck"),
        }
    }
}

/// Mixer event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MixerEvent {
    /// A playback unit was allocated and began fading in
    SoundStarted {
        sound_id: String,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// A playback unit finished fading out and was released
    SoundStopped {
        sound_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A sound's base volume changed
    VolumeChanged {
        sound_id: String,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// The set of rendering sounds changed
    PlaybackStateChanged {
        playing: bool,
        sound_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Host audio focus changed
    FocusChanged {
        change: FocusChange,
        timestamp: DateTime<Utc>,
    },

    /// Host refused the audio-focus request (playback continues)
    FocusDenied {
        timestamp: DateTime<Utc>,
    },

    /// Play request rejected by the mix limit
    MixLimitReached {
        sound_id: String,
        limit: usize,
        timestamp: DateTime<Utc>,
    },

    /// A playback unit failed and was torn down
    PlaybackError {
        sound_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Countdown timer state changed or ticked
    TimerStateChanged {
        state: String,
        remaining_secs: Option<u64>,
        display: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Countdown timer reached zero
    TimerFinished {
        timestamp: DateTime<Utc>,
    },
}

impl MixerEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            MixerEvent::SoundStarted { .. } => "SoundStarted",
            MixerEvent::SoundStopped { .. } => "SoundStopped",
            MixerEvent::VolumeChanged { .. } => "VolumeChanged",
            MixerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            MixerEvent::FocusChanged { .. } => "FocusChanged",
            MixerEvent::FocusDenied { .. } => "FocusDenied",
            MixerEvent::MixLimitReached { .. } => "MixLimitReached",
            MixerEvent::PlaybackError { .. } => "PlaybackError",
            MixerEvent::TimerStateChanged { .. } => "TimerStateChanged",
            MixerEvent::TimerFinished { .. } => "TimerFinished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = MixerEvent::SoundStarted {
            sound_id: "rain".to_string(),
            volume: 0.5,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SoundStarted");
        assert_eq!(json["sound_id"], "rain");
        assert_eq!(event.event_type(), "SoundStarted");
    }

    #[test]
    fn test_focus_change_wire_names() {
        let change: FocusChange = serde_json::from_str("\"loss_transient_can_duck\"").unwrap();
        assert_eq!(change, FocusChange::LossTransientCanDuck);
        assert_eq!(change.to_string(), "loss_transient_can_duck");
    }
}
