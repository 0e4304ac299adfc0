//! Cancelable volume ramps
//!
//! Each fade runs as its own task and reports linear volume steps back to the
//! registry as `FadeEvent`s. At most one ramp exists per sound id: starting a
//! new ramp cancels (and awaits) the previous one before installing the new
//! task handle, so the last request always wins.
//!
//! A cancelled ramp leaves the volume wherever its last applied step put it;
//! the caller decides the final state. Completion is reported exactly once per
//! ramp through `complete()`, which only accepts the currently installed ramp.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::events::{FadeDirection, FadeEvent};

/// Ramp timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    /// Total ramp duration
    pub duration: Duration,

    /// Interval between volume steps
    pub step: Duration,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1000),
            step: Duration::from_millis(50),
        }
    }
}

impl FadeSettings {
    /// Number of step intervals in a ramp (at least one)
    pub fn steps(&self) -> u32 {
        let step_ms = self.step.as_millis().max(1);
        let steps = self.duration.as_millis() / step_ms;
        steps.clamp(1, u32::MAX as u128) as u32
    }
}

/// A live ramp for one sound id
#[derive(Debug)]
pub struct FadeTask {
    pub fade_id: u64,
    pub direction: FadeDirection,
    pub target: f32,
    pub started_at: Instant,
    handle: JoinHandle<()>,
}

/// Table of running ramps keyed by sound id
pub struct FadeController {
    settings: FadeSettings,
    tasks: HashMap<String, FadeTask>,
    next_fade_id: u64,
    tx: mpsc::UnboundedSender<FadeEvent>,
}

impl FadeController {
    /// Create a controller that reports ramp progress on `tx`
    pub fn new(settings: FadeSettings, tx: mpsc::UnboundedSender<FadeEvent>) -> Self {
        Self {
            settings,
            tasks: HashMap::new(),
            next_fade_id: 1,
            tx,
        }
    }

    /// Ramp from silence to `target` using the configured timing
    pub async fn fade_in(&mut self, sound_id: &str, target: f32) -> u64 {
        let settings = self.settings;
        self.fade_in_with(sound_id, target, settings).await
    }

    /// Ramp from silence to `target` with explicit timing
    pub async fn fade_in_with(&mut self, sound_id: &str, target: f32, settings: FadeSettings) -> u64 {
        self.start(sound_id, FadeDirection::In, 0.0, target, settings).await
    }

    /// Retarget a unit that is already audible: ramp from its current volume
    pub async fn fade_in_from(&mut self, sound_id: &str, from: f32, target: f32) -> u64 {
        let settings = self.settings;
        self.start(sound_id, FadeDirection::In, from, target, settings).await
    }

    /// Ramp from `from` down to silence
    pub async fn fade_out(&mut self, sound_id: &str, from: f32) -> u64 {
        let settings = self.settings;
        self.start(sound_id, FadeDirection::Out, from, 0.0, settings).await
    }

    async fn start(
        &mut self,
        sound_id: &str,
        direction: FadeDirection,
        from: f32,
        target: f32,
        settings: FadeSettings,
    ) -> u64 {
        self.cancel(sound_id).await;

        let fade_id = self.next_fade_id;
        self.next_fade_id += 1;

        let from = from.clamp(0.0, 1.0);
        let target = target.clamp(0.0, 1.0);
        debug!(
            "Fade {:?} #{} for {}: {:.2} -> {:.2} over {:?}",
            direction, fade_id, sound_id, from, target, settings.duration
        );

        let handle = tokio::spawn(run_ramp(
            self.tx.clone(),
            sound_id.to_string(),
            fade_id,
            direction,
            from,
            target,
            settings,
        ));

        self.tasks.insert(
            sound_id.to_string(),
            FadeTask {
                fade_id,
                direction,
                target,
                started_at: Instant::now(),
                handle,
            },
        );

        fade_id
    }

    /// Cancel the ramp for `sound_id` and wait for its task to stop.
    ///
    /// Returns false (and does nothing) when no ramp is running.
    pub async fn cancel(&mut self, sound_id: &str) -> bool {
        let Some(task) = self.tasks.remove(sound_id) else {
            return false;
        };

        task.handle.abort();
        // Cancelled or already finished; either way the task no longer runs
        let _ = task.handle.await;
        debug!("Fade #{} for {} cancelled", task.fade_id, sound_id);
        true
    }

    /// Cancel every ramp and wait for all tasks to stop
    pub async fn cancel_all(&mut self) {
        let tasks: Vec<(String, FadeTask)> = self.tasks.drain().collect();
        for (_, task) in &tasks {
            task.handle.abort();
        }
        for (sound_id, task) in tasks {
            let _ = task.handle.await;
            debug!("Fade #{} for {} cancelled", task.fade_id, sound_id);
        }
    }

    /// Whether `fade_id` is the ramp currently installed for `sound_id`
    pub fn is_current(&self, sound_id: &str, fade_id: u64) -> bool {
        self.tasks
            .get(sound_id)
            .is_some_and(|task| task.fade_id == fade_id)
    }

    /// The ramp currently installed for `sound_id`
    pub fn task(&self, sound_id: &str) -> Option<&FadeTask> {
        self.tasks.get(sound_id)
    }

    /// Direction of the ramp currently installed for `sound_id`
    pub fn direction(&self, sound_id: &str) -> Option<FadeDirection> {
        self.tasks.get(sound_id).map(|task| task.direction)
    }

    /// Retire a finished ramp.
    ///
    /// Returns the ramp direction only for the currently installed ramp, and
    /// only once; stale completions from replaced ramps return `None`.
    pub fn complete(&mut self, sound_id: &str, fade_id: u64) -> Option<FadeDirection> {
        if !self.is_current(sound_id, fade_id) {
            return None;
        }
        self.tasks.remove(sound_id).map(|task| task.direction)
    }

    /// Number of running ramps
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for FadeController {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.handle.abort();
        }
    }
}

/// Linear ramp: emits `steps + 1` volumes from `from` to `to`, then completes
async fn run_ramp(
    tx: mpsc::UnboundedSender<FadeEvent>,
    sound_id: String,
    fade_id: u64,
    direction: FadeDirection,
    from: f32,
    to: f32,
    settings: FadeSettings,
) {
    let steps = settings.steps();

    for i in 0..=steps {
        let progress = i as f32 / steps as f32;
        let volume = (from + (to - from) * progress).clamp(0.0, 1.0);

        let step = FadeEvent::Step {
            sound_id: sound_id.clone(),
            fade_id,
            volume,
        };
        if tx.send(step).is_err() {
            return;
        }

        if i < steps {
            tokio::time::sleep(settings.step).await;
        }
    }

    let _ = tx.send(FadeEvent::Completed {
        sound_id,
        fade_id,
        direction,
    });
}
