//! HTTP server setup and routing
//!
//! Sets up the Axum router with control endpoints and SSE.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use lull_common::SubscriptionTier;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};
use crate::playback::MixSession;
use crate::state::SharedState;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub session: Arc<MixSession>,
    /// Subscription tier source; the registry and session hold receivers
    pub tier_tx: Arc<watch::Sender<SubscriptionTier>>,
    pub port: u16,
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Playback control
        .route("/playback/status", get(super::handlers::get_status))
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/toggle", post(super::handlers::toggle))
        .route("/playback/stop/:sound_id", post(super::handlers::stop))
        .route("/playback/stop_all", post(super::handlers::stop_all))
        .route("/playback/volume", post(super::handlers::set_volume))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/resume", post(super::handlers::resume))
        .route("/playback/mix", post(super::handlers::apply_mix))

        // Sleep timer
        .route(
            "/timer",
            get(super::handlers::get_timer)
                .post(super::handlers::set_timer)
                .delete(super::handlers::cancel_timer),
        )
        .route("/timer/pause", post(super::handlers::pause_timer))
        .route("/timer/resume", post(super::handlers::resume_timer))

        // Host bridges
        .route("/focus", post(super::handlers::focus_change))
        .route("/subscription", put(super::handlers::set_subscription))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())

        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run(ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = build_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
