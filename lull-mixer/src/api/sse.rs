//! Server-Sent Events (SSE) broadcaster
//!
//! Streams mixer events to connected clients.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::api::server::AppContext;

/// GET /events - SSE event stream
pub async fn event_stream(State(ctx): State<AppContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = ctx.state.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged client; it keeps receiving newer events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}
