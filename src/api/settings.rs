//! Roster configuration endpoints.

use axum::{extract::State, Json};

use super::{respond, session_for, success, ApiResult};
use crate::auth::Identity;
use crate::models::{RosterSettings, SettingsPatch};
use crate::AppState;

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<RosterSettings> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();
    success(model.settings, model.revision)
}

/// PATCH /api/settings - Apply locally, persist through the debounced writer.
pub async fn patch_settings(
    State(state): State<AppState>,
    identity: Identity,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<RosterSettings> {
    let session = session_for(&state, &identity).await?;
    let result = session.edit_settings(patch);
    respond(&session, result)
}
