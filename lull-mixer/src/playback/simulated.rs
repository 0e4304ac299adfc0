//! In-memory renderer and focus host
//!
//! Used by the binary (there is no decoder) and by tests. The simulated
//! renderer models a prepare delay: `play()` returns immediately and the
//! renderer reports that it is rendering once the delay has elapsed. Like a
//! real looping source it keeps rendering until told otherwise.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lull_common::Sound;
use tracing::debug;

use super::backend::{MediaBackend, Renderer};
use super::events::RendererNotifier;
use crate::error::BackendError;
use crate::playback::focus::AudioFocusHost;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct RendererState {
    volume: f32,
    play_requested: bool,
    rendering: bool,
    released: bool,
    /// Bumped on every play/pause/stop so a pending prepare can tell it is stale
    generation: u64,
}

#[derive(Default)]
struct BackendState {
    /// Latest renderer per sound id
    renderers: HashMap<String, (Arc<Mutex<RendererState>>, RendererNotifier)>,
    created: HashMap<String, usize>,
    released: HashMap<String, usize>,
    fail_on_create: HashSet<String>,
    fail_on_play: HashSet<String>,
}

/// Renderer backend that produces no audio
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    prepare_delay: Duration,
    state: Arc<Mutex<BackendState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay between `play()` and the renderer reporting it is rendering
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    /// Make `create()` fail for this sound id
    pub fn fail_on_create(&self, sound_id: &str) {
        lock(&self.state).fail_on_create.insert(sound_id.to_string());
    }

    /// Make `play()` fail for this sound id
    pub fn fail_on_play(&self, sound_id: &str) {
        lock(&self.state).fail_on_play.insert(sound_id.to_string());
    }

    /// Report an asynchronous failure from the live renderer of `sound_id`
    pub fn inject_failure(&self, sound_id: &str, message: &str) -> bool {
        let state = lock(&self.state);
        match state.renderers.get(sound_id) {
            Some((renderer, notifier)) if !lock(renderer).released => {
                notifier.failed(message);
                true
            }
            _ => false,
        }
    }

    /// Renderers ever created for `sound_id`
    pub fn created_count(&self, sound_id: &str) -> usize {
        lock(&self.state).created.get(sound_id).copied().unwrap_or(0)
    }

    /// Renderers released for `sound_id`
    pub fn released_count(&self, sound_id: &str) -> usize {
        lock(&self.state).released.get(sound_id).copied().unwrap_or(0)
    }

    /// Renderers created but not yet released, across all sounds
    pub fn live_count(&self) -> usize {
        let state = lock(&self.state);
        let created: usize = state.created.values().sum();
        let released: usize = state.released.values().sum();
        created - released
    }

    /// Volume last applied to the live renderer of `sound_id`
    pub fn volume_of(&self, sound_id: &str) -> Option<f32> {
        self.live(sound_id).map(|renderer| lock(&renderer).volume)
    }

    /// Whether the live renderer of `sound_id` is producing audio
    pub fn is_rendering(&self, sound_id: &str) -> bool {
        self.live(sound_id).is_some_and(|renderer| lock(&renderer).rendering)
    }

    fn live(&self, sound_id: &str) -> Option<Arc<Mutex<RendererState>>> {
        let state = lock(&self.state);
        state
            .renderers
            .get(sound_id)
            .filter(|(renderer, _)| !lock(renderer).released)
            .map(|(renderer, _)| renderer.clone())
    }
}

impl MediaBackend for SimulatedBackend {
    fn create(&self, sound: &Sound, notifier: RendererNotifier) -> Result<Box<dyn Renderer>, BackendError> {
        let mut state = lock(&self.state);
        if state.fail_on_create.contains(&sound.id) {
            return Err(BackendError::new(format!("cannot open asset '{}'", sound.asset)));
        }

        let renderer = Arc::new(Mutex::new(RendererState {
            volume: 1.0,
            ..Default::default()
        }));
        state
            .renderers
            .insert(sound.id.clone(), (renderer.clone(), notifier.clone()));
        *state.created.entry(sound.id.clone()).or_default() += 1;
        debug!("Simulated renderer created for {}", sound.id);

        Ok(Box::new(SimulatedRenderer {
            sound_id: sound.id.clone(),
            fail_on_play: state.fail_on_play.contains(&sound.id),
            prepare_delay: self.prepare_delay,
            state: renderer,
            backend: self.state.clone(),
            notifier,
        }))
    }
}

struct SimulatedRenderer {
    sound_id: String,
    fail_on_play: bool,
    prepare_delay: Duration,
    state: Arc<Mutex<RendererState>>,
    backend: Arc<Mutex<BackendState>>,
    notifier: RendererNotifier,
}

impl SimulatedRenderer {
    fn set_rendering(&self, rendering: bool) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.rendering != rendering;
            state.rendering = rendering;
            changed
        };
        if changed {
            self.notifier.rendering_changed(rendering);
        }
    }

    fn halt(&mut self) {
        {
            let mut state = lock(&self.state);
            state.play_requested = false;
            state.generation += 1;
        }
        self.set_rendering(false);
    }
}

impl Renderer for SimulatedRenderer {
    fn play(&mut self) -> Result<(), BackendError> {
        if self.fail_on_play {
            return Err(BackendError::new("renderer failed to start"));
        }

        let generation = {
            let mut state = lock(&self.state);
            if state.play_requested {
                return Ok(());
            }
            state.play_requested = true;
            state.generation += 1;
            state.generation
        };

        if self.prepare_delay.is_zero() {
            self.set_rendering(true);
            return Ok(());
        }

        let delay = self.prepare_delay;
        let state = self.state.clone();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let ready = {
                let mut state = lock(&state);
                let ready = state.generation == generation && state.play_requested && !state.released;
                if ready {
                    state.rendering = true;
                }
                ready
            };
            if ready {
                notifier.rendering_changed(true);
            }
        });
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.halt();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.halt();
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError> {
        lock(&self.state).volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn is_rendering(&self) -> bool {
        lock(&self.state).rendering
    }

    fn release(self: Box<Self>) {
        {
            let mut state = lock(&self.state);
            state.released = true;
            state.rendering = false;
            state.play_requested = false;
        }
        *lock(&self.backend)
            .released
            .entry(self.sound_id.clone())
            .or_default() += 1;
        debug!("Simulated renderer released for {}", self.sound_id);
    }
}

/// Focus host that grants (or denies) on demand and counts calls
#[derive(Debug)]
pub struct SimulatedFocusHost {
    grant: AtomicBool,
    requests: AtomicUsize,
    abandons: AtomicUsize,
}

impl SimulatedFocusHost {
    pub fn new() -> Self {
        Self {
            grant: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
            abandons: AtomicUsize::new(0),
        }
    }

    /// Whether future requests are granted
    pub fn set_grant(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn abandon_count(&self) -> usize {
        self.abandons.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedFocusHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFocusHost for SimulatedFocusHost {
    fn request_focus(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.grant.load(Ordering::SeqCst)
    }

    fn abandon_focus(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
    }
}
