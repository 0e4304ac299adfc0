//! Internal playback events (not exposed via SSE)
//!
//! Fade tasks and renderer handles report back to the registry through these
//! events. They enter the registry's serialized context and are converted to
//! `MixerEvent`s before broadcasting where relevant.

use tokio::sync::mpsc;
use uuid::Uuid;

/// Direction of a volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// Progress report from a running fade task
///
/// `fade_id` identifies the ramp that produced the event; events from a
/// ramp that has since been cancelled or replaced are discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum FadeEvent {
    /// Apply this logical volume to the unit
    Step {
        sound_id: String,
        fade_id: u64,
        volume: f32,
    },

    /// The ramp reached its target
    Completed {
        sound_id: String,
        fade_id: u64,
        direction: FadeDirection,
    },
}

/// Asynchronous report from a renderer handle
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// The renderer started or stopped producing audio
    RenderingChanged {
        sound_id: String,
        unit_id: Uuid,
        rendering: bool,
    },

    /// The renderer failed after creation
    Failed {
        sound_id: String,
        unit_id: Uuid,
        message: String,
    },
}

/// Per-unit reporting channel handed to a renderer at creation
#[derive(Debug, Clone)]
pub struct RendererNotifier {
    sound_id: String,
    unit_id: Uuid,
    tx: mpsc::UnboundedSender<RendererEvent>,
}

impl RendererNotifier {
    pub fn new(sound_id: impl Into<String>, unit_id: Uuid, tx: mpsc::UnboundedSender<RendererEvent>) -> Self {
        Self {
            sound_id: sound_id.into(),
            unit_id,
            tx,
        }
    }

    /// Report a change of the "actually rendering" flag
    pub fn rendering_changed(&self, rendering: bool) {
        // The registry may already be gone during shutdown
        let _ = self.tx.send(RendererEvent::RenderingChanged {
            sound_id: self.sound_id.clone(),
            unit_id: self.unit_id,
            rendering,
        });
    }

    /// Report an asynchronous renderer failure
    pub fn failed(&self, message: impl Into<String>) {
        let _ = self.tx.send(RendererEvent::Failed {
            sound_id: self.sound_id.clone(),
            unit_id: self.unit_id,
            message: message.into(),
        });
    }
}
