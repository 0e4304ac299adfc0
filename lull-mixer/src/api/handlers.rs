//! HTTP request handlers
//!
//! Thin adapters from JSON requests to `MixSession` operations. Engine errors
//! map onto HTTP status codes in `error_response`.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lull_common::{FocusChange, Sound, SubscriptionTier};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{MixReport, TimerStatus, UnitSnapshot};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStatusResponse {
    playing: bool,
    tier: SubscriptionTier,
    units: Vec<UnitSnapshot>,
    selected: Vec<Sound>,
    timer: TimerStatus,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    sound_id: String,
    selected: bool,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    sound_id: String,
    volume: f32,
}

#[derive(Debug, Deserialize)]
pub struct TimerRequest {
    /// `null` clears the timer
    duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    change: FocusChange,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    tier: SubscriptionTier,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn ok() -> ApiResult<StatusResponse> {
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// Map engine errors to HTTP status codes
fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::ResourceExhaustion { .. } => StatusCode::CONFLICT,
        Error::PremiumRequired(_) => StatusCode::FORBIDDEN,
        Error::Backend { .. } => StatusCode::BAD_GATEWAY,
        Error::InvalidVolume(_) => StatusCode::BAD_REQUEST,
        Error::EngineClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "lull-mixer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// GET /playback/status - Units, selection and timer
pub async fn get_status(State(ctx): State<AppContext>) -> ApiResult<PlaybackStatusResponse> {
    let session = &ctx.session;
    let units = session.snapshot().await.map_err(error_response)?;

    Ok(Json(PlaybackStatusResponse {
        playing: units.iter().any(|unit| unit.rendering),
        tier: session.tier(),
        units,
        selected: session.selected().await,
        timer: session.timer_status(),
    }))
}

/// POST /playback/play - Select and play a sound
pub async fn play(State(ctx): State<AppContext>, Json(sound): Json<Sound>) -> ApiResult<StatusResponse> {
    info!("Play request: {}", sound.id);
    ctx.session.play_sound(sound).await.map_err(error_response)?;
    ok()
}

/// POST /playback/toggle - Flip a sound's selection
pub async fn toggle(State(ctx): State<AppContext>, Json(sound): Json<Sound>) -> ApiResult<ToggleResponse> {
    let sound_id = sound.id.clone();
    let selected = ctx.session.toggle_sound(sound).await.map_err(error_response)?;
    info!("Toggled {}: selected={}", sound_id, selected);
    Ok(Json(ToggleResponse { sound_id, selected }))
}

/// POST /playback/stop/:sound_id - Deselect and fade out one sound
pub async fn stop(State(ctx): State<AppContext>, Path(sound_id): Path<String>) -> ApiResult<StatusResponse> {
    info!("Stop request: {}", sound_id);
    ctx.session.stop_sound(&sound_id).await.map_err(error_response)?;
    ok()
}

/// POST /playback/stop_all - Fade out everything
pub async fn stop_all(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    info!("Stop-all request");
    ctx.session.stop_all().await.map_err(error_response)?;
    ok()
}

/// POST /playback/volume - Set one sound's volume immediately
pub async fn set_volume(State(ctx): State<AppContext>, Json(req): Json<VolumeRequest>) -> ApiResult<StatusResponse> {
    ctx.session
        .update_volume(&req.sound_id, req.volume)
        .await
        .map_err(error_response)?;
    ok()
}

/// POST /playback/pause - Pause every sound
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    info!("Pause request");
    ctx.session.pause().await.map_err(error_response)?;
    ok()
}

/// POST /playback/resume - Resume every sound
pub async fn resume(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    info!("Resume request");
    ctx.session.resume().await.map_err(error_response)?;
    ok()
}

/// POST /playback/mix - Replace the whole mix
pub async fn apply_mix(State(ctx): State<AppContext>, Json(sounds): Json<Vec<Sound>>) -> ApiResult<MixReport> {
    let report = ctx.session.apply_mix(sounds).await.map_err(error_response)?;
    Ok(Json(report))
}

// ============================================================================
// Timer Endpoints
// ============================================================================

/// GET /timer - Current countdown
pub async fn get_timer(State(ctx): State<AppContext>) -> Json<TimerStatus> {
    Json(ctx.session.timer_status())
}

/// POST /timer - Set or clear the sleep timer
pub async fn set_timer(State(ctx): State<AppContext>, Json(req): Json<TimerRequest>) -> ApiResult<TimerStatus> {
    info!("Timer request: {:?}s", req.duration_secs);
    ctx.session
        .set_timer(req.duration_secs.map(Duration::from_secs))
        .await
        .map_err(error_response)?;
    Ok(Json(ctx.session.timer_status()))
}

/// DELETE /timer - Cancel the sleep timer
pub async fn cancel_timer(State(ctx): State<AppContext>) -> Json<TimerStatus> {
    ctx.session.timer().cancel();
    Json(ctx.session.timer_status())
}

/// POST /timer/pause
pub async fn pause_timer(State(ctx): State<AppContext>) -> Json<TimerStatus> {
    ctx.session.pause_timer();
    Json(ctx.session.timer_status())
}

/// POST /timer/resume
pub async fn resume_timer(State(ctx): State<AppContext>) -> Json<TimerStatus> {
    ctx.session.resume_timer();
    Json(ctx.session.timer_status())
}

// ============================================================================
// Host Bridges
// ============================================================================

/// POST /focus - Deliver a host audio-focus change
pub async fn focus_change(State(ctx): State<AppContext>, Json(req): Json<FocusRequest>) -> ApiResult<StatusResponse> {
    info!("Focus change from host: {}", req.change);
    ctx.session
        .mixer()
        .focus_changed(req.change)
        .map_err(error_response)?;
    ok()
}

/// PUT /subscription - Switch the subscription tier
pub async fn set_subscription(
    State(ctx): State<AppContext>,
    Json(req): Json<SubscriptionRequest>,
) -> Json<SubscriptionRequest> {
    info!("Subscription tier set to {}", req.tier);
    ctx.tier_tx.send_replace(req.tier);
    Json(req)
}
