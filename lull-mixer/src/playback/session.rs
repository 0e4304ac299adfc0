//! Mix session
//!
//! The collaborator the control surface talks to. Owns the user's current
//! selection, the sleep timer and the subscription tier, and couples the
//! timer to playback activity:
//! - nothing rendering any more: a running timer pauses
//! - something rendering again: a paused timer resumes
//! - timer reaches zero: every sound fades out

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lull_common::human_time::{format_countdown, whole_seconds_ceil};
use lull_common::{MixerEvent, Sound, SubscriptionTier};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::registry::{MixerHandle, UnitSnapshot};
use super::timer::{CountdownTimer, TimerState};
use crate::error::{Error, Result};
use crate::state::SharedState;

type Selection = Arc<RwLock<BTreeMap<String, Sound>>>;

/// Timer status as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub state: &'static str,
    pub remaining_secs: Option<u64>,
    pub display: Option<String>,
}

impl From<TimerState> for TimerStatus {
    fn from(state: TimerState) -> Self {
        let remaining = state.remaining();
        Self {
            state: state.name(),
            remaining_secs: remaining.map(whole_seconds_ceil),
            display: remaining.map(format_countdown),
        }
    }
}

/// Outcome of replacing the whole mix
#[derive(Debug, Clone, Default, Serialize)]
pub struct MixReport {
    pub playing: Vec<String>,
    pub stopped: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

pub struct MixSession {
    mixer: MixerHandle,
    timer: Arc<CountdownTimer>,
    tier: watch::Receiver<SubscriptionTier>,
    state: Arc<SharedState>,
    selected: Selection,
    watchers: Vec<JoinHandle<()>>,
}

impl MixSession {
    /// Create the session and start its timer/playback watchers
    pub fn new(mixer: MixerHandle, tier: watch::Receiver<SubscriptionTier>, state: Arc<SharedState>) -> Self {
        let timer = Arc::new(CountdownTimer::new());
        let watchers = vec![
            tokio::spawn(couple_timer(mixer.is_playing(), timer.clone())),
            tokio::spawn(forward_timer_state(timer.state(), state.clone())),
        ];

        Self {
            mixer,
            timer,
            tier,
            state,
            selected: Arc::new(RwLock::new(BTreeMap::new())),
            watchers,
        }
    }

    pub fn mixer(&self) -> &MixerHandle {
        &self.mixer
    }

    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    pub fn tier(&self) -> SubscriptionTier {
        *self.tier.borrow()
    }

    /// Sounds currently selected in the mix
    pub async fn selected(&self) -> Vec<Sound> {
        self.selected.read().await.values().cloned().collect()
    }

    /// Select-and-play or deselect-and-stop. Returns whether the sound is now selected.
    pub async fn toggle_sound(&self, sound: Sound) -> Result<bool> {
        let is_selected = self.selected.read().await.contains_key(&sound.id);
        if is_selected {
            self.stop_sound(&sound.id).await?;
            Ok(false)
        } else {
            self.play_sound(sound).await?;
            Ok(true)
        }
    }

    /// Select and play a sound, subject to premium gating and the mix limit
    pub async fn play_sound(&self, mut sound: Sound) -> Result<()> {
        self.check_access(&sound)?;

        sound.selected = true;
        self.mixer.play(sound.clone()).await?;
        self.selected.write().await.insert(sound.id.clone(), sound);
        Ok(())
    }

    pub async fn stop_sound(&self, sound_id: &str) -> Result<()> {
        self.selected.write().await.remove(sound_id);
        self.mixer.stop(sound_id).await
    }

    pub async fn update_volume(&self, sound_id: &str, volume: f32) -> Result<()> {
        self.mixer.update_volume(sound_id, volume).await?;
        if let Some(sound) = self.selected.write().await.get_mut(sound_id) {
            sound.volume = volume.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// Pause every sound (user intent)
    pub async fn pause(&self) -> Result<()> {
        self.mixer.pause_all().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.mixer.resume_all().await
    }

    /// Deselect and fade out everything
    pub async fn stop_all(&self) -> Result<()> {
        self.selected.write().await.clear();
        self.mixer.stop_all().await
    }

    /// Replace the current mix with `sounds`.
    ///
    /// Sounds not in the new mix fade out. A sound that cannot start is
    /// reported in the result without aborting the rest.
    pub async fn apply_mix(&self, sounds: Vec<Sound>) -> Result<MixReport> {
        let mut report = MixReport::default();

        let current: Vec<String> = self.selected.read().await.keys().cloned().collect();
        for sound_id in current {
            if !sounds.iter().any(|sound| sound.id == sound_id) {
                self.stop_sound(&sound_id).await?;
                report.stopped.push(sound_id);
            }
        }

        for sound in sounds {
            let sound_id = sound.id.clone();
            match self.play_sound(sound).await {
                Ok(()) => report.playing.push(sound_id),
                Err(Error::EngineClosed) => return Err(Error::EngineClosed),
                Err(e) => {
                    warn!("Mix entry {} not started: {}", sound_id, e);
                    report.failed.insert(sound_id, e.to_string());
                }
            }
        }

        info!(
            "Applied mix: {} playing, {} stopped, {} failed",
            report.playing.len(),
            report.stopped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Set or clear the sleep timer.
    ///
    /// With nothing rendering the timer is armed paused and starts counting
    /// once playback begins.
    pub async fn set_timer(&self, duration: Option<Duration>) -> Result<()> {
        let Some(duration) = duration else {
            self.timer.cancel();
            return Ok(());
        };

        let on_finish = finish_action(self.mixer.clone(), self.selected.clone(), self.state.clone());
        if self.mixer.is_any_playing().await? {
            self.timer.start(duration, on_finish);
        } else {
            self.timer.setup_paused(duration, on_finish);
        }
        Ok(())
    }

    pub fn pause_timer(&self) {
        self.timer.pause();
    }

    pub fn resume_timer(&self) {
        self.timer.resume();
    }

    pub fn timer_status(&self) -> TimerStatus {
        self.timer.current().into()
    }

    pub async fn snapshot(&self) -> Result<Vec<UnitSnapshot>> {
        self.mixer.snapshot().await
    }

    fn check_access(&self, sound: &Sound) -> Result<()> {
        if sound.premium && self.tier() == SubscriptionTier::Free {
            warn!("Premium sound {} requested on the free tier", sound.id);
            return Err(Error::PremiumRequired(sound.id.clone()));
        }
        Ok(())
    }
}

impl Drop for MixSession {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

/// Timer completion: deselect and fade out everything
fn finish_action(mixer: MixerHandle, selected: Selection, state: Arc<SharedState>) -> impl FnOnce() + Send + 'static {
    move || {
        state.broadcast_event(MixerEvent::TimerFinished { timestamp: Utc::now() });
        tokio::spawn(async move {
            selected.write().await.clear();
            if let Err(e) = mixer.stop_all().await {
                warn!("Timer could not stop playback: {}", e);
            }
        });
    }
}

/// Pause the timer when rendering stops, resume it when rendering starts
async fn couple_timer(mut is_playing: watch::Receiver<bool>, timer: Arc<CountdownTimer>) {
    while is_playing.changed().await.is_ok() {
        let playing = *is_playing.borrow_and_update();
        if playing {
            timer.resume();
        } else {
            timer.pause();
        }
    }
}

async fn forward_timer_state(mut timer_state: watch::Receiver<TimerState>, state: Arc<SharedState>) {
    while timer_state.changed().await.is_ok() {
        let status = TimerStatus::from(*timer_state.borrow_and_update());
        state.broadcast_event(MixerEvent::TimerStateChanged {
            state: status.state.to_string(),
            remaining_secs: status.remaining_secs,
            display: status.display,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_status_formatting() {
        let status = TimerStatus::from(TimerState::Running {
            remaining: Duration::from_millis(899_400),
        });
        assert_eq!(status.state, "running");
        assert_eq!(status.remaining_secs, Some(900));
        assert_eq!(status.display.as_deref(), Some("15:00"));

        let idle = TimerStatus::from(TimerState::Idle);
        assert_eq!(idle.remaining_secs, None);
        assert_eq!(idle.display, None);
    }
}
