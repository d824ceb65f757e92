//! Roster import endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use super::{error, respond, session_for, ApiResult};
use crate::auth::Identity;
use crate::errors::AppError;
use crate::import::{ImportReconciler, ImportSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub confirm: bool,
    pub payload: Value,
}

/// POST /api/import/preview - Validate a payload without changing anything.
pub async fn preview_import(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<Value>,
) -> ApiResult<ImportSummary> {
    let session = session_for(&state, &identity).await?;
    let result = ImportReconciler::prepare(&payload).map(|prepared| prepared.summary());
    respond(&session, result)
}

/// POST /api/import - Replace the roster. Requires `confirm: true`.
pub async fn import_roster(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ImportRequest>,
) -> ApiResult<ImportSummary> {
    let session = session_for(&state, &identity).await?;

    let prepared = match ImportReconciler::prepare(&request.payload) {
        Ok(prepared) => prepared,
        Err(e) => return respond(&session, Err(e)),
    };

    if !request.confirm {
        return error(
            AppError::Validation(
                "Importing replaces the whole roster; resend with \"confirm\": true".to_string(),
            ),
            session.current().revision,
        );
    }

    let result = prepared.commit(&session).await;
    respond(&session, result)
}
