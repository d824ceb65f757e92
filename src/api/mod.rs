//! REST API module.
//!
//! Every roster route resolves the caller's session from the identity header
//! and answers with the `{success, data, revisionId}` envelope.

mod events;
mod roster;
mod settings;
mod speakers;
mod talks;
mod transfer;
mod views;

pub use events::*;
pub use roster::*;
pub use settings::*;
pub use speakers::*;
pub use talks::*;
pub use transfer::*;
pub use views::*;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::Identity;
use crate::errors::{AppError, AppErrorWithRevision};
use crate::session::Session;
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Resolve the caller's session, opening it on first use.
async fn session_for(
    state: &AppState,
    identity: &Identity,
) -> Result<Arc<Session>, AppErrorWithRevision> {
    state
        .sessions
        .get_or_open(identity.as_str())
        .await
        .map_err(AppErrorWithRevision::from)
}

/// Answer with the session's revision after a mutation.
fn respond<T: Serialize>(session: &Session, result: Result<T, AppError>) -> ApiResult<T> {
    let revision_id = session.current().revision;
    match result {
        Ok(data) => success(data, revision_id),
        Err(e) => error(e, revision_id),
    }
}
