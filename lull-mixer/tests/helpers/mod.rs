//! Test helpers for lull-mixer integration tests
//!
//! `TestMixer` spawns a registry over the simulated backend and focus host
//! and keeps handles to both so tests can inspect renderer state directly.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lull_common::{MixerEvent, Sound, SubscriptionTier};
use lull_mixer::playback::{
    AdmissionPolicy, ChannelRegistry, FadeSettings, MixLimitPolicy, MixerHandle, RegistryConfig,
    SimulatedBackend, SimulatedFocusHost,
};
use lull_mixer::SharedState;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Longer than one default fade
pub const SETTLE: Duration = Duration::from_millis(1500);

pub struct TestMixer {
    pub mixer: MixerHandle,
    pub backend: SimulatedBackend,
    pub focus_host: Arc<SimulatedFocusHost>,
    pub state: Arc<SharedState>,
    pub tier_tx: Arc<watch::Sender<SubscriptionTier>>,
    pub tier_rx: watch::Receiver<SubscriptionTier>,
    pub task: JoinHandle<()>,
}

pub struct TestMixerBuilder {
    prepare_delay: Duration,
    policy: Arc<dyn AdmissionPolicy>,
    duck_factor: f32,
    tier: SubscriptionTier,
}

impl TestMixer {
    pub fn builder() -> TestMixerBuilder {
        TestMixerBuilder {
            prepare_delay: Duration::ZERO,
            policy: Arc::new(MixLimitPolicy::new(2)),
            duck_factor: 0.3,
            tier: SubscriptionTier::Free,
        }
    }

    pub fn start() -> Self {
        Self::builder().start()
    }

    pub fn events(&self) -> broadcast::Receiver<MixerEvent> {
        self.state.subscribe_events()
    }

    pub fn set_tier(&self, tier: SubscriptionTier) {
        self.tier_tx.send_replace(tier);
    }
}

impl TestMixerBuilder {
    pub fn prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    pub fn policy(mut self, policy: impl AdmissionPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn tier(mut self, tier: SubscriptionTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn start(self) -> TestMixer {
        let backend = SimulatedBackend::new().with_prepare_delay(self.prepare_delay);
        let focus_host = Arc::new(SimulatedFocusHost::new());
        let state = Arc::new(SharedState::new());
        let (tier_tx, tier_rx) = watch::channel(self.tier);

        let config = RegistryConfig {
            fade: FadeSettings::default(),
            duck_factor: self.duck_factor,
            policy: self.policy,
        };
        let (mixer, task) = ChannelRegistry::spawn(
            config,
            Arc::new(backend.clone()),
            focus_host.clone(),
            tier_rx.clone(),
            state.clone(),
        );

        TestMixer {
            mixer,
            backend,
            focus_host,
            state,
            tier_tx: Arc::new(tier_tx),
            tier_rx,
            task,
        }
    }
}

pub fn sound(id: &str, volume: f32) -> Sound {
    Sound::new(id, id, format!("{}.ogg", id)).with_volume(volume)
}

pub fn approx(actual: Option<f32>, expected: f32) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < 1e-4)
}

/// Event types received so far
pub fn drain_types(rx: &mut broadcast::Receiver<MixerEvent>) -> Vec<&'static str> {
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    types
}
