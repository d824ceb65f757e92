//! Roster model and session endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{session_for, success, ApiResult};
use crate::auth::Identity;
use crate::session::RosterModel;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionClosed {
    pub closed: bool,
}

/// GET /api/roster - Current model: speakers, settings and notice.
pub async fn get_roster(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<RosterModel> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();
    let revision_id = model.revision;
    success(model, revision_id)
}

/// DELETE /api/roster/notice - Dismiss the current notice.
pub async fn dismiss_notice(State(state): State<AppState>, identity: Identity) -> ApiResult<()> {
    let session = session_for(&state, &identity).await?;
    session.dismiss_notice();
    success((), session.current().revision)
}

/// DELETE /api/session - Close the caller's session.
pub async fn close_session(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<SessionClosed> {
    let closed = state.sessions.close(identity.as_str()).await;
    success(SessionClosed { closed }, 0)
}
