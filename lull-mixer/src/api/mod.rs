//! HTTP control surface
//!
//! REST endpoints for the mix, the sleep timer, host focus and the
//! subscription tier, plus an SSE stream of mixer events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
