//! Ambient sound mixing engine
//!
//! The registry task owns every playback unit; fades, focus arbitration,
//! admission and the observable state are its collaborators. The session
//! and timer sit on top and couple the sleep timer to playback activity.

pub mod aggregator;
pub mod backend;
pub mod events;
pub mod fader;
pub mod focus;
pub mod policy;
pub mod registry;
pub mod session;
pub mod simulated;
pub mod timer;

pub use aggregator::{PlaybackStateAggregator, PlayingSounds};
pub use backend::{MediaBackend, Renderer};
pub use fader::{FadeController, FadeSettings};
pub use focus::{AudioFocusArbiter, AudioFocusHost, FocusDirective, UserIntent};
pub use policy::{AdmissionPolicy, MixLimitPolicy};
pub use registry::{ChannelRegistry, MixerHandle, RegistryConfig, UnitSnapshot};
pub use session::{MixReport, MixSession, TimerStatus};
pub use simulated::{SimulatedBackend, SimulatedFocusHost};
pub use timer::{CountdownTimer, TimerState};
