//! Channel registry
//!
//! The registry is the single owner of every playback unit. It runs as one
//! tokio task; callers talk to it through a cloneable `MixerHandle` that
//! sends commands and awaits replies. Fade progress, renderer reports and
//! host focus changes arrive on channels drained by the same task, so user
//! actions and asynchronous events are applied one at a time in arrival
//! order and never race on the unit map.
//!
//! **Volumes:**
//! - base volume: the level the user asked for, kept per sound id
//! - logical volume: the unit's current level (moves during fades)
//! - applied volume: logical volume times the focus attenuation, clamped
//!
//! **Lifecycle:**
//! - `play` allocates a unit (subject to admission) muted, then fades it in
//! - `play` during a fade-out revives the unit, also subject to admission
//! - `stop` fades the unit out; the renderer is released when that fade completes
//! - dropping every `MixerHandle` tears everything down like `release()`

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use lull_common::{FocusChange, MixerEvent, Sound, SubscriptionTier};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregator::{PlaybackStateAggregator, PlayingSounds};
use super::backend::{MediaBackend, Renderer};
use super::events::{FadeDirection, FadeEvent, RendererEvent, RendererNotifier};
use super::fader::{FadeController, FadeSettings};
use super::focus::{AudioFocusArbiter, AudioFocusHost, FocusDirective, UserIntent};
use super::policy::{AdmissionPolicy, MixLimitPolicy};
use crate::error::{BackendError, Error, Result};
use crate::state::SharedState;

/// Default attenuation applied while the host asks us to duck
pub const DEFAULT_DUCK_FACTOR: f32 = 0.3;

/// Registry construction parameters
#[derive(Clone)]
pub struct RegistryConfig {
    pub fade: FadeSettings,
    pub duck_factor: f32,
    pub policy: Arc<dyn AdmissionPolicy>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fade: FadeSettings::default(),
            duck_factor: DEFAULT_DUCK_FACTOR,
            policy: Arc::new(MixLimitPolicy::default()),
        }
    }
}

/// Point-in-time view of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSnapshot {
    pub sound_id: String,
    /// Volume currently applied to the renderer
    pub volume: f32,
    /// Volume the user asked for
    pub base_volume: f32,
    pub rendering: bool,
    pub stopping: bool,
}

enum Command {
    Play {
        sound: Sound,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        sound_id: String,
        reply: oneshot::Sender<()>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
    UpdateVolume {
        sound_id: String,
        volume: f32,
        reply: oneshot::Sender<Result<()>>,
    },
    PauseAll {
        reply: oneshot::Sender<()>,
    },
    ResumeAll {
        reply: oneshot::Sender<()>,
    },
    IsAnyPlaying {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<UnitSnapshot>>,
    },
    Focus(FocusChange),
    Release {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable entry point to the registry task
#[derive(Clone)]
pub struct MixerHandle {
    tx: mpsc::UnboundedSender<Command>,
    playing_sounds: watch::Receiver<PlayingSounds>,
    is_playing: watch::Receiver<bool>,
}

impl MixerHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(command(reply)).map_err(|_| Error::EngineClosed)?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Start `sound`, or retarget its unit if one already exists
    pub async fn play(&self, sound: Sound) -> Result<()> {
        self.request(|reply| Command::Play { sound, reply }).await?
    }

    /// Fade out and release the unit for `sound_id`; no-op if there is none
    pub async fn stop(&self, sound_id: &str) -> Result<()> {
        let sound_id = sound_id.to_string();
        self.request(|reply| Command::Stop { sound_id, reply }).await
    }

    /// Fade out every unit
    pub async fn stop_all(&self) -> Result<()> {
        self.request(|reply| Command::StopAll { reply }).await
    }

    /// Set a unit's volume immediately, cancelling any fade
    pub async fn update_volume(&self, sound_id: &str, volume: f32) -> Result<()> {
        let sound_id = sound_id.to_string();
        self.request(|reply| Command::UpdateVolume {
            sound_id,
            volume,
            reply,
        })
        .await?
    }

    /// Pause every unit without releasing it
    pub async fn pause_all(&self) -> Result<()> {
        self.request(|reply| Command::PauseAll { reply }).await
    }

    pub async fn resume_all(&self) -> Result<()> {
        self.request(|reply| Command::ResumeAll { reply }).await
    }

    /// Whether any unit is rendering right now
    pub async fn is_any_playing(&self) -> Result<bool> {
        self.request(|reply| Command::IsAnyPlaying { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Vec<UnitSnapshot>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Deliver a host focus change; applied in order with other commands
    pub fn focus_changed(&self, change: FocusChange) -> Result<()> {
        self.tx.send(Command::Focus(change)).map_err(|_| Error::EngineClosed)
    }

    /// Cancel all fades, release every unit and stop the registry task
    pub async fn release(&self) -> Result<()> {
        self.request(|reply| Command::Release { reply }).await
    }

    pub fn playing_sounds(&self) -> watch::Receiver<PlayingSounds> {
        self.playing_sounds.clone()
    }

    pub fn is_playing(&self) -> watch::Receiver<bool> {
        self.is_playing.clone()
    }

    /// Whether the registry task has exited
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitPhase {
    Active,
    /// Fading out; released when the fade completes
    Stopping,
}

struct PlaybackUnit {
    unit_id: Uuid,
    sound: Sound,
    renderer: Box<dyn Renderer>,
    /// Logical volume last applied
    volume: f32,
    phase: UnitPhase,
}

impl PlaybackUnit {
    fn apply_volume(&mut self, logical: f32, attenuation: f32) -> std::result::Result<(), BackendError> {
        self.volume = logical.clamp(0.0, 1.0);
        self.renderer.set_volume((self.volume * attenuation).clamp(0.0, 1.0))
    }

    fn discard(mut self) {
        if let Err(e) = self.renderer.stop() {
            debug!("Stop failed while discarding {}: {}", self.sound.id, e);
        }
        self.renderer.release();
    }
}

/// Reject NaN/infinite input, clamp everything else into [0.0, 1.0]
fn checked_volume(volume: f32) -> Result<f32> {
    if !volume.is_finite() {
        return Err(Error::InvalidVolume(volume));
    }
    Ok(volume.clamp(0.0, 1.0))
}

/// Registry task state
pub struct ChannelRegistry {
    units: HashMap<String, PlaybackUnit>,
    base_volumes: HashMap<String, f32>,
    fades: FadeController,
    focus: AudioFocusArbiter,
    policy: Arc<dyn AdmissionPolicy>,
    tier: watch::Receiver<SubscriptionTier>,
    backend: Arc<dyn MediaBackend>,
    aggregator: PlaybackStateAggregator,
    state: Arc<SharedState>,
    renderer_tx: mpsc::UnboundedSender<RendererEvent>,
}

impl ChannelRegistry {
    /// Start the registry task
    pub fn spawn(
        config: RegistryConfig,
        backend: Arc<dyn MediaBackend>,
        focus_host: Arc<dyn AudioFocusHost>,
        tier: watch::Receiver<SubscriptionTier>,
        state: Arc<SharedState>,
    ) -> (MixerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fade_tx, fade_rx) = mpsc::unbounded_channel();
        let (renderer_tx, renderer_rx) = mpsc::unbounded_channel();

        let aggregator = PlaybackStateAggregator::new(state.clone());
        let handle = MixerHandle {
            tx: command_tx,
            playing_sounds: aggregator.playing_sounds(),
            is_playing: aggregator.is_playing(),
        };

        let registry = ChannelRegistry {
            units: HashMap::new(),
            base_volumes: HashMap::new(),
            fades: FadeController::new(config.fade, fade_tx),
            focus: AudioFocusArbiter::new(focus_host, config.duck_factor),
            policy: config.policy,
            tier,
            backend,
            aggregator,
            state,
            renderer_tx,
        };

        let task = tokio::spawn(registry.run(command_rx, fade_rx, renderer_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut fade_rx: mpsc::UnboundedReceiver<FadeEvent>,
        mut renderer_rx: mpsc::UnboundedReceiver<RendererEvent>,
    ) {
        info!("Channel registry started");

        loop {
            tokio::select! {
                biased;

                Some(event) = fade_rx.recv() => self.on_fade_event(event).await,
                Some(event) = renderer_rx.recv() => self.on_renderer_event(event).await,
                command = commands.recv() => match command {
                    Some(Command::Release { reply }) => {
                        self.release().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        debug!("All mixer handles dropped");
                        self.release().await;
                        break;
                    }
                },
            }

            self.publish();
        }

        info!("Channel registry stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Play { sound, reply } => {
                let result = self.play(sound).await;
                self.reply(reply, result);
            }
            Command::Stop { sound_id, reply } => {
                self.stop(&sound_id).await;
                self.reply(reply, ());
            }
            Command::StopAll { reply } => {
                self.stop_all().await;
                self.reply(reply, ());
            }
            Command::UpdateVolume {
                sound_id,
                volume,
                reply,
            } => {
                let result = self.update_volume(&sound_id, volume).await;
                self.reply(reply, result);
            }
            Command::PauseAll { reply } => {
                self.pause_all().await;
                self.reply(reply, ());
            }
            Command::ResumeAll { reply } => {
                self.resume_all().await;
                self.reply(reply, ());
            }
            Command::IsAnyPlaying { reply } => {
                let playing = self.is_any_playing();
                self.reply(reply, playing);
            }
            Command::Snapshot { reply } => {
                let units = self.snapshot();
                self.reply(reply, units);
            }
            Command::Focus(change) => self.on_focus_change(change).await,
            Command::Release { reply } => {
                self.release().await;
                self.reply(reply, ());
            }
        }
    }

    /// Publish derived state first so callers observe it once they get the reply
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    async fn play(&mut self, mut sound: Sound) -> Result<()> {
        let target = checked_volume(sound.volume)?;
        sound.volume = target;

        if self.units.contains_key(&sound.id) {
            return self.redirect(sound).await;
        }

        self.admit(&sound.id)?;
        self.focus.set_intent(UserIntent::Playing);
        self.ensure_focus();

        let sound_id = sound.id.clone();
        let unit_id = Uuid::new_v4();
        let notifier = RendererNotifier::new(sound_id.clone(), unit_id, self.renderer_tx.clone());
        let renderer = match self.backend.create(&sound, notifier) {
            Ok(renderer) => renderer,
            Err(e) => return Err(self.report_failure(&sound_id, e)),
        };

        let mut unit = PlaybackUnit {
            unit_id,
            sound,
            renderer,
            volume: 0.0,
            phase: UnitPhase::Active,
        };

        let started = unit
            .apply_volume(0.0, self.focus.attenuation())
            .and_then(|_| unit.renderer.play());
        if let Err(e) = started {
            unit.discard();
            return Err(self.report_failure(&sound_id, e));
        }

        self.units.insert(sound_id.clone(), unit);
        self.base_volumes.insert(sound_id.clone(), target);
        self.fades.fade_in(&sound_id, target).await;

        info!("Started {} (unit {}) fading in to {:.2}", sound_id, unit_id, target);
        self.state.broadcast_event(MixerEvent::SoundStarted {
            sound_id,
            volume: target,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Ask the policy whether one more active unit fits; rejection changes nothing
    fn admit(&self, sound_id: &str) -> Result<()> {
        let active = self.active_count();
        let tier = *self.tier.borrow();
        if self.policy.can_admit(active, tier) {
            return Ok(());
        }

        let limit = self.policy.limit();
        warn!(
            "Mix limit reached: refusing {} ({} of {} active, tier {})",
            sound_id, active, limit, tier
        );
        self.state.broadcast_event(MixerEvent::MixLimitReached {
            sound_id: sound_id.to_string(),
            limit,
            timestamp: Utc::now(),
        });
        Err(Error::ResourceExhaustion { limit, active })
    }

    /// `play` for a sound that already has a unit: no allocation
    async fn redirect(&mut self, sound: Sound) -> Result<()> {
        let sound_id = sound.id.clone();
        let target = sound.volume;

        let Some(phase) = self.units.get(&sound_id).map(|unit| unit.phase) else {
            return Ok(());
        };

        // A fading-out unit is outside the active count, so reviving it is an admission
        let was_stopping = phase == UnitPhase::Stopping;
        if was_stopping {
            self.admit(&sound_id)?;
        }

        self.focus.set_intent(UserIntent::Playing);
        self.ensure_focus();

        let attenuation = self.focus.attenuation();
        let fading = self.fades.task(&sound_id).is_some();
        let Some(unit) = self.units.get_mut(&sound_id) else {
            return Ok(());
        };

        unit.phase = UnitPhase::Active;
        unit.sound = sound;
        self.base_volumes.insert(sound_id.clone(), target);

        let mut result = if unit.renderer.is_rendering() {
            Ok(())
        } else {
            unit.renderer.play()
        };

        if result.is_ok() {
            if fading {
                // Mid-ramp (fading in, or fading out and now revived): ramp from here
                let from = unit.volume;
                self.fades.fade_in_from(&sound_id, from, target).await;
                if was_stopping {
                    info!("Revived {} while fading out", sound_id);
                }
            } else {
                result = unit.apply_volume(target, attenuation);
            }
        }

        match result {
            Ok(()) => {
                debug!("Redirected {} to {:.2}", sound_id, target);
                self.state.broadcast_event(MixerEvent::VolumeChanged {
                    sound_id,
                    volume: target,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => Err(self.tear_down(&sound_id, e).await),
        }
    }

    async fn stop(&mut self, sound_id: &str) {
        let Some(unit) = self.units.get_mut(sound_id) else {
            debug!("Stop for {}: no unit", sound_id);
            return;
        };
        if unit.phase == UnitPhase::Stopping {
            debug!("Stop for {}: already fading out", sound_id);
            return;
        }

        unit.phase = UnitPhase::Stopping;
        let from = unit.volume;
        self.fades.fade_out(sound_id, from).await;
        info!("Stopping {} (fading out from {:.2})", sound_id, from);
    }

    async fn stop_all(&mut self) {
        let ids: Vec<String> = self.units.keys().cloned().collect();
        for sound_id in ids {
            self.stop(&sound_id).await;
        }
    }

    async fn update_volume(&mut self, sound_id: &str, volume: f32) -> Result<()> {
        let volume = checked_volume(volume)?;
        let attenuation = self.focus.attenuation();

        let Some(unit) = self.units.get_mut(sound_id) else {
            debug!("Volume for {}: no unit", sound_id);
            return Ok(());
        };
        if unit.phase == UnitPhase::Stopping {
            debug!("Volume for {} ignored while fading out", sound_id);
            return Ok(());
        }

        self.fades.cancel(sound_id).await;
        unit.sound.volume = volume;
        self.base_volumes.insert(sound_id.to_string(), volume);

        if let Err(e) = unit.apply_volume(volume, attenuation) {
            return Err(self.tear_down(sound_id, e).await);
        }

        self.state.broadcast_event(MixerEvent::VolumeChanged {
            sound_id: sound_id.to_string(),
            volume,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn pause_all(&mut self) {
        self.focus.set_intent(UserIntent::Paused);
        self.pause_units().await;
        info!("Paused all units");
    }

    async fn resume_all(&mut self) {
        self.focus.set_intent(UserIntent::Playing);
        if !self.units.is_empty() {
            self.ensure_focus();
        }
        self.resume_units().await;
        info!("Resumed all units");
    }

    fn is_any_playing(&self) -> bool {
        self.units.values().any(|unit| unit.renderer.is_rendering())
    }

    fn snapshot(&self) -> Vec<UnitSnapshot> {
        let attenuation = self.focus.attenuation();
        let mut units: Vec<UnitSnapshot> = self
            .units
            .iter()
            .map(|(sound_id, unit)| UnitSnapshot {
                sound_id: sound_id.clone(),
                volume: (unit.volume * attenuation).clamp(0.0, 1.0),
                base_volume: self.base_volumes.get(sound_id).copied().unwrap_or(unit.volume),
                rendering: unit.renderer.is_rendering(),
                stopping: unit.phase == UnitPhase::Stopping,
            })
            .collect();
        units.sort_by(|a, b| a.sound_id.cmp(&b.sound_id));
        units
    }

    async fn release(&mut self) {
        self.fades.cancel_all().await;

        let count = self.units.len();
        for (_, unit) in self.units.drain() {
            unit.discard();
        }
        self.base_volumes.clear();
        self.focus.abandon_focus();
        self.publish();

        info!("Released {} unit(s)", count);
    }

    /// Units that count against the mix limit
    fn active_count(&self) -> usize {
        self.units
            .values()
            .filter(|unit| unit.phase == UnitPhase::Active)
            .count()
    }

    fn ensure_focus(&mut self) {
        if self.focus.has_focus() {
            return;
        }
        if !self.focus.request_focus() {
            self.state.broadcast_event(MixerEvent::FocusDenied { timestamp: Utc::now() });
        }
    }

    async fn on_focus_change(&mut self, change: FocusChange) {
        self.state.broadcast_event(MixerEvent::FocusChanged {
            change,
            timestamp: Utc::now(),
        });

        let directive = self.focus.on_focus_change(change);
        debug!("Focus {} -> {:?}", change, directive);

        let failures = match directive {
            FocusDirective::None => Vec::new(),
            FocusDirective::PauseAll => self.for_each_unit(|unit, _| unit.renderer.pause()),
            FocusDirective::Duck(_) => self.reapply_volumes(),
            FocusDirective::Regain {
                restore_volumes,
                resume,
            } => {
                let mut failures = if restore_volumes {
                    self.restore_base_volumes()
                } else {
                    Vec::new()
                };
                if resume {
                    failures.extend(self.for_each_unit(|unit, _| unit.renderer.play()));
                }
                failures
            }
        };

        for (sound_id, e) in failures {
            self.tear_down(&sound_id, e).await;
        }
    }

    async fn on_fade_event(&mut self, event: FadeEvent) {
        match event {
            FadeEvent::Step {
                sound_id,
                fade_id,
                volume,
            } => {
                if !self.fades.is_current(&sound_id, fade_id) {
                    return;
                }
                let attenuation = self.focus.attenuation();
                let Some(unit) = self.units.get_mut(&sound_id) else {
                    return;
                };
                if let Err(e) = unit.apply_volume(volume, attenuation) {
                    self.tear_down(&sound_id, e).await;
                }
            }
            FadeEvent::Completed {
                sound_id,
                fade_id,
                direction,
            } => match self.fades.complete(&sound_id, fade_id) {
                Some(FadeDirection::Out) => self.finish_stop(&sound_id),
                Some(FadeDirection::In) => debug!("Fade-in complete for {}", sound_id),
                None => debug!("Stale {:?} completion #{} for {}", direction, fade_id, sound_id),
            },
        }
    }

    async fn on_renderer_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::RenderingChanged {
                sound_id,
                unit_id,
                rendering,
            } => {
                if self.is_current_unit(&sound_id, unit_id) {
                    debug!("{} rendering: {}", sound_id, rendering);
                }
            }
            RendererEvent::Failed {
                sound_id,
                unit_id,
                message,
            } => {
                if self.is_current_unit(&sound_id, unit_id) {
                    self.tear_down(&sound_id, BackendError(message)).await;
                } else {
                    debug!("Ignoring failure from released unit {} of {}", unit_id, sound_id);
                }
            }
        }
    }

    fn is_current_unit(&self, sound_id: &str, unit_id: Uuid) -> bool {
        self.units
            .get(sound_id)
            .is_some_and(|unit| unit.unit_id == unit_id)
    }

    /// Release a unit whose fade-out completed
    fn finish_stop(&mut self, sound_id: &str) {
        let stopping = self
            .units
            .get(sound_id)
            .is_some_and(|unit| unit.phase == UnitPhase::Stopping);
        if !stopping {
            return;
        }

        if let Some(unit) = self.units.remove(sound_id) {
            unit.discard();
        }
        self.base_volumes.remove(sound_id);

        info!("Stopped {}", sound_id);
        self.state.broadcast_event(MixerEvent::SoundStopped {
            sound_id: sound_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn pause_units(&mut self) {
        let failures = self.for_each_unit(|unit, _| unit.renderer.pause());
        for (sound_id, e) in failures {
            self.tear_down(&sound_id, e).await;
        }
    }

    async fn resume_units(&mut self) {
        let failures = self.for_each_unit(|unit, attenuation| {
            let logical = unit.volume;
            unit.apply_volume(logical, attenuation)?;
            unit.renderer.play()
        });
        for (sound_id, e) in failures {
            self.tear_down(&sound_id, e).await;
        }
    }

    /// Re-apply every unit's logical volume under the current attenuation
    fn reapply_volumes(&mut self) -> Vec<(String, BackendError)> {
        self.for_each_unit(|unit, attenuation| {
            let logical = unit.volume;
            unit.apply_volume(logical, attenuation)
        })
    }

    /// Put every settled unit back at its base volume
    fn restore_base_volumes(&mut self) -> Vec<(String, BackendError)> {
        let attenuation = self.focus.attenuation();
        let mut failures = Vec::new();
        for (sound_id, unit) in self.units.iter_mut() {
            let target = if self.fades.task(sound_id).is_some() {
                unit.volume
            } else {
                self.base_volumes.get(sound_id).copied().unwrap_or(unit.volume)
            };
            if let Err(e) = unit.apply_volume(target, attenuation) {
                failures.push((sound_id.clone(), e));
            }
        }
        failures
    }

    fn for_each_unit(
        &mut self,
        mut op: impl FnMut(&mut PlaybackUnit, f32) -> std::result::Result<(), BackendError>,
    ) -> Vec<(String, BackendError)> {
        let attenuation = self.focus.attenuation();
        self.units
            .iter_mut()
            .filter_map(|(sound_id, unit)| op(unit, attenuation).err().map(|e| (sound_id.clone(), e)))
            .collect()
    }

    /// Tear down a failed unit, cancelling its fade first
    async fn tear_down(&mut self, sound_id: &str, e: BackendError) -> Error {
        self.fades.cancel(sound_id).await;
        if let Some(unit) = self.units.remove(sound_id) {
            unit.discard();
        }
        self.base_volumes.remove(sound_id);
        self.report_failure(sound_id, e)
    }

    fn report_failure(&self, sound_id: &str, e: BackendError) -> Error {
        warn!("Backend failure for {}: {}", sound_id, e);
        self.state.broadcast_event(MixerEvent::PlaybackError {
            sound_id: sound_id.to_string(),
            message: e.to_string(),
            timestamp: Utc::now(),
        });
        Error::Backend {
            sound_id: sound_id.to_string(),
            message: e.0,
        }
    }

    fn publish(&self) {
        self.aggregator.publish(
            self.units
                .values()
                .filter(|unit| unit.renderer.is_rendering())
                .map(|unit| &unit.sound),
        );
    }
}
