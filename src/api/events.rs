//! Server-Sent Events stream of roster updates.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use super::session_for;
use crate::auth::Identity;
use crate::errors::AppErrorWithRevision;
use crate::AppState;

/// SSE event name carrying a full roster model.
pub const ROSTER_EVENT: &str = "roster";

/// GET /api/events - One `roster` event per model update, starting with the
/// current model.
pub async fn roster_events(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppErrorWithRevision> {
    let session = session_for(&state, &identity).await?;
    tracing::debug!(identity = %identity.as_str(), "New SSE client connected");

    let stream = WatchStream::new(session.watch()).filter_map(|model| async move {
        match serde_json::to_string(&model) {
            Ok(json) => Some(Ok(Event::default().event(ROSTER_EVENT).data(json))),
            Err(e) => {
                tracing::warn!("Failed to serialize roster event: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
