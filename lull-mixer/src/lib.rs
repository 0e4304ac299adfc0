//! # Lull Mixer Library (lull-mixer)
//!
//! Concurrent ambient-sound mixing engine.
//!
//! **Purpose:** Keep several ambient sounds playing at once, fade them in and
//! out, arbitrate host audio focus, limit the mix per subscription tier and
//! run a sleep timer that stops playback, with an HTTP/SSE control interface.
//!
//! **Architecture:** A single registry task owns all playback units and
//! serializes user commands with fade, renderer and focus events.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
