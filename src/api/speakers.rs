//! Speaker and talk-assignment endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error, respond, session_for, success, ApiResult};
use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::{NewSpeaker, Speaker};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhoneRequest {
    #[serde(default)]
    pub phone: String,
}

/// Talk number as typed by the user, or already numeric.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TalkInput {
    Number(i64),
    Text(String),
}

impl TalkInput {
    fn as_text(&self) -> String {
        match self {
            TalkInput::Number(n) => n.to_string(),
            TalkInput::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTalkRequest {
    pub talk: TalkInput,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: bool,
}

/// GET /api/speakers - List the roster.
pub async fn list_speakers(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Vec<Speaker>> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();
    success(model.speakers, model.revision)
}

/// GET /api/speakers/{id} - Get a single speaker.
pub async fn get_speaker(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();

    match model.speaker(&id) {
        Some(speaker) => success(speaker.clone(), model.revision),
        None => error(
            AppError::NotFound(format!("Speaker {} not found", id)),
            model.revision,
        ),
    }
}

/// POST /api/speakers - Register a speaker.
pub async fn add_speaker(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<NewSpeaker>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let result = session.add_speaker(request).await;
    respond(&session, result)
}

/// DELETE /api/speakers/{id} - Remove a speaker with all of its talks.
pub async fn remove_speaker(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Removed> {
    let session = session_for(&state, &identity).await?;
    let result = session
        .remove_speaker(&id)
        .await
        .map(|removed| Removed { removed });
    respond(&session, result)
}

/// POST /api/speakers/{id}/availability - Flip the speaker's availability.
pub async fn toggle_speaker_availability(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let result = session.toggle_speaker_availability(&id).await;
    respond(&session, result)
}

/// PUT /api/speakers/{id}/role
pub async fn change_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<ChangeRoleRequest>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let result = session.change_role(&id, &request.role).await;
    respond(&session, result)
}

/// PUT /api/speakers/{id}/phone
pub async fn update_phone(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<UpdatePhoneRequest>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let result = session.update_phone(&id, &request.phone).await;
    respond(&session, result)
}

/// POST /api/speakers/{id}/talks - Assign a catalog talk.
pub async fn add_talk(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<AddTalkRequest>,
) -> ApiResult<Speaker> {
    let session = session_for(&state, &identity).await?;
    let result = session.add_talk(&id, &request.talk.as_text()).await;
    respond(&session, result)
}

/// DELETE /api/speakers/{id}/talks/{talk_id}
///
/// Answers `null` when the talk was not assigned.
pub async fn remove_talk(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, talk_id)): Path<(String, u32)>,
) -> ApiResult<Option<Speaker>> {
    let session = session_for(&state, &identity).await?;
    let result = session.remove_talk(&id, talk_id).await;
    respond(&session, result)
}

/// POST /api/speakers/{id}/talks/{talk_id}/availability
pub async fn toggle_talk_availability(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, talk_id)): Path<(String, u32)>,
) -> ApiResult<Option<Speaker>> {
    let session = session_for(&state, &identity).await?;
    let result = session.toggle_talk_availability(&id, talk_id).await;
    respond(&session, result)
}
