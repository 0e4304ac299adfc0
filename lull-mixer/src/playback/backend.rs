//! Renderer seam
//!
//! A `MediaBackend` turns a `Sound` into a `Renderer` handle. Handles are
//! owned exclusively by the registry task and every call on them goes
//! through that task, so a backend with per-instance thread affinity only
//! ever sees one caller.

use lull_common::Sound;

use super::events::RendererNotifier;
use crate::error::BackendError;

/// One live audio source.
///
/// Ambient sounds have no natural end: once playing, a renderer loops its
/// asset until the registry pauses or stops it, and never clears its
/// rendering flag on its own at the end of the asset.
pub trait Renderer: Send {
    /// Start or continue rendering; may complete asynchronously
    fn play(&mut self) -> Result<(), BackendError>;

    fn pause(&mut self) -> Result<(), BackendError>;

    fn stop(&mut self) -> Result<(), BackendError>;

    /// Apply an output volume in [0.0, 1.0]
    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError>;

    /// Whether audio is actually being produced right now
    fn is_rendering(&self) -> bool;

    /// Free the underlying resources; the handle is unusable afterwards
    fn release(self: Box<Self>);
}

/// Factory for renderer handles
pub trait MediaBackend: Send + Sync {
    /// Allocate a renderer for `sound`.
    ///
    /// `notifier` reports rendering-flag changes and late failures back to
    /// the registry.
    fn create(&self, sound: &Sound, notifier: RendererNotifier) -> Result<Box<dyn Renderer>, BackendError>;
}
