//! Host audio-focus arbitration
//!
//! The arbiter owns the focus grant and the user's explicit play/pause
//! intent. Host focus changes are delivered into the registry's serialized
//! context, which asks the arbiter what to do and applies the resulting
//! `FocusDirective` to its units. The arbiter never touches units itself.
//!
//! A deliberate user pause (`UserIntent::Paused`) suppresses every
//! focus-driven pause, duck and resume. Restoring ducked volumes on regain
//! still happens so that paused units come back at their base volume.

use std::sync::Arc;

use lull_common::FocusChange;
use tracing::{debug, info, warn};

/// Host primitives for exclusive audio output
pub trait AudioFocusHost: Send + Sync {
    /// Ask the host for focus; returns whether it was granted
    fn request_focus(&self) -> bool;

    /// Give a previously granted focus back to the host
    fn abandon_focus(&self);
}

/// Explicit user play/pause intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserIntent {
    #[default]
    Playing,
    Paused,
}

/// Effect the registry must apply after a focus change
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusDirective {
    /// Nothing to do
    None,

    /// Pause every unit (no fade)
    PauseAll,

    /// Scale every applied volume by this factor, keeping base volumes
    Duck(f32),

    /// Focus returned
    Regain {
        /// Re-apply every unit's base volume
        restore_volumes: bool,
        /// Resume every unit paused by a transient loss
        resume: bool,
    },
}

pub struct AudioFocusArbiter {
    host: Arc<dyn AudioFocusHost>,
    duck_factor: f32,
    intent: UserIntent,

    /// Host currently grants focus
    granted: bool,

    /// A grant is outstanding and changes are being delivered
    listening: bool,

    /// Units were paused by a transient loss and come back on regain
    resume_on_gain: bool,

    /// Applied volumes are currently attenuated
    ducked: bool,
}

impl AudioFocusArbiter {
    pub fn new(host: Arc<dyn AudioFocusHost>, duck_factor: f32) -> Self {
        Self {
            host,
            duck_factor: duck_factor.clamp(0.0, 1.0),
            intent: UserIntent::Playing,
            granted: false,
            listening: false,
            resume_on_gain: false,
            ducked: false,
        }
    }

    /// Request focus unless it is already held.
    ///
    /// Returns whether focus is held afterwards.
    pub fn request_focus(&mut self) -> bool {
        if self.granted {
            return true;
        }

        if self.host.request_focus() {
            info!("Audio focus granted");
            self.granted = true;
            self.listening = true;
            true
        } else {
            warn!("Audio focus request denied by host");
            false
        }
    }

    /// Release an outstanding grant and stop reacting to focus changes
    pub fn abandon_focus(&mut self) {
        if self.listening {
            self.host.abandon_focus();
            info!("Audio focus abandoned");
        }
        self.granted = false;
        self.listening = false;
        self.resume_on_gain = false;
        self.ducked = false;
    }

    /// Decide how the registry reacts to a host focus change
    pub fn on_focus_change(&mut self, change: FocusChange) -> FocusDirective {
        if !self.listening {
            debug!("Ignoring focus change {} (no outstanding grant)", change);
            return FocusDirective::None;
        }

        let user_paused = self.intent == UserIntent::Paused;

        match change {
            FocusChange::Gain => {
                self.granted = true;
                let restore_volumes = std::mem::take(&mut self.ducked);
                let resume = std::mem::take(&mut self.resume_on_gain) && !user_paused;
                if !restore_volumes && !resume {
                    return FocusDirective::None;
                }
                FocusDirective::Regain {
                    restore_volumes,
                    resume,
                }
            }
            FocusChange::Loss => {
                // Permanent: give the grant back, the next play re-requests it
                self.abandon_focus();
                if user_paused {
                    FocusDirective::None
                } else {
                    FocusDirective::PauseAll
                }
            }
            FocusChange::LossTransient => {
                self.granted = false;
                if user_paused {
                    debug!("Transient loss while user-paused; regain will not resume");
                    return FocusDirective::None;
                }
                self.resume_on_gain = true;
                FocusDirective::PauseAll
            }
            FocusChange::LossTransientCanDuck => {
                self.ducked = true;
                if user_paused {
                    return FocusDirective::None;
                }
                FocusDirective::Duck(self.duck_factor)
            }
        }
    }

    /// Factor applied on top of every logical volume
    pub fn attenuation(&self) -> f32 {
        if self.ducked {
            self.duck_factor
        } else {
            1.0
        }
    }

    pub fn has_focus(&self) -> bool {
        self.granted
    }

    /// Record an explicit user play/pause; a user pause cancels pending auto-resume
    pub fn set_intent(&mut self, intent: UserIntent) {
        if intent == UserIntent::Paused {
            self.resume_on_gain = false;
        }
        self.intent = intent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::simulated::SimulatedFocusHost;

    fn arbiter() -> (Arc<SimulatedFocusHost>, AudioFocusArbiter) {
        let host = Arc::new(SimulatedFocusHost::new());
        let arbiter = AudioFocusArbiter::new(host.clone(), 0.3);
        (host, arbiter)
    }

    #[test]
    fn test_request_is_not_repeated_while_held() {
        let (host, mut arbiter) = arbiter();
        assert!(arbiter.request_focus());
        assert!(arbiter.request_focus());
        assert_eq!(host.request_count(), 1);

        arbiter.abandon_focus();
        assert_eq!(host.abandon_count(), 1);
        assert!(!arbiter.has_focus());
    }

    #[test]
    fn test_denied_request() {
        let (host, mut arbiter) = arbiter();
        host.set_grant(false);

        assert!(!arbiter.request_focus());
        assert_eq!(arbiter.on_focus_change(FocusChange::LossTransient), FocusDirective::None);

        arbiter.abandon_focus();
        assert_eq!(host.abandon_count(), 0);
    }

    #[test]
    fn test_transient_loss_resumes_on_gain() {
        let (_host, mut arbiter) = arbiter();
        arbiter.request_focus();

        assert_eq!(arbiter.on_focus_change(FocusChange::LossTransient), FocusDirective::PauseAll);
        assert_eq!(
            arbiter.on_focus_change(FocusChange::Gain),
            FocusDirective::Regain {
                restore_volumes: false,
                resume: true
            }
        );
        assert_eq!(arbiter.on_focus_change(FocusChange::Gain), FocusDirective::None);
    }

    #[test]
    fn test_user_pause_suppresses_resume() {
        let (_host, mut arbiter) = arbiter();
        arbiter.request_focus();

        arbiter.on_focus_change(FocusChange::LossTransient);
        arbiter.set_intent(UserIntent::Paused);
        assert_eq!(arbiter.on_focus_change(FocusChange::Gain), FocusDirective::None);

        arbiter.set_intent(UserIntent::Paused);
        assert_eq!(arbiter.on_focus_change(FocusChange::LossTransient), FocusDirective::None);
        assert_eq!(arbiter.on_focus_change(FocusChange::Gain), FocusDirective::None);
    }

    #[test]
    fn test_permanent_loss_abandons_grant() {
        let (host, mut arbiter) = arbiter();
        arbiter.request_focus();

        assert_eq!(arbiter.on_focus_change(FocusChange::Loss), FocusDirective::PauseAll);
        assert!(!arbiter.has_focus());
        assert_eq!(host.abandon_count(), 1);

        // No automatic resume: later changes are not delivered
        assert_eq!(arbiter.on_focus_change(FocusChange::Gain), FocusDirective::None);

        assert!(arbiter.request_focus());
        assert_eq!(host.request_count(), 2);
    }

    #[test]
    fn test_duck_and_restore() {
        let (_host, mut arbiter) = arbiter();
        arbiter.request_focus();

        assert_eq!(arbiter.on_focus_change(FocusChange::LossTransientCanDuck), FocusDirective::Duck(0.3));
        assert_eq!(arbiter.attenuation(), 0.3);

        assert_eq!(
            arbiter.on_focus_change(FocusChange::Gain),
            FocusDirective::Regain {
                restore_volumes: true,
                resume: false
            }
        );
        assert_eq!(arbiter.attenuation(), 1.0);
    }
}
