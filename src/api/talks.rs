//! Talk catalog endpoints.

use axum::extract::{Path, State};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::Talk;
use crate::AppState;

/// GET /api/talks - The whole catalog ordered by number.
pub async fn list_talks(State(state): State<AppState>) -> ApiResult<Vec<Talk>> {
    success(state.catalog.all(), 0)
}

/// GET /api/talks/{id}
pub async fn get_talk(State(state): State<AppState>, Path(id): Path<u32>) -> ApiResult<Talk> {
    match state.catalog.get(id) {
        Some(talk) => success(talk, 0),
        None => error(AppError::NotFound(format!("Talk {} not found", id)), 0),
    }
}
