//! Rendered roster views.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use super::{session_for, success};
use crate::auth::Identity;
use crate::errors::AppErrorWithRevision;
use crate::views::{
    build_export, export_filename, render_document, shareable_text, DocumentLayout, TextOptions,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    /// `text` returns the plain-text rendering instead of the layout.
    #[serde(default)]
    pub format: Option<String>,
}

fn text_options(state: &AppState) -> TextOptions {
    TextOptions {
        phone_prefix: state.config.phone_prefix.clone(),
        utc_offset: state.config.utc_offset,
    }
}

/// GET /api/share - Shareable plain text.
pub async fn get_share_text(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response, AppErrorWithRevision> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();

    let text = shareable_text(
        &model.speakers,
        &model.settings,
        &state.catalog,
        &text_options(&state),
        Utc::now(),
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

/// GET /api/document - Paginated layout, or its plain text with `?format=text`.
pub async fn get_document(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, AppErrorWithRevision> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();

    let layout: DocumentLayout = render_document(
        &model.speakers,
        &model.settings,
        &state.catalog,
        state.config.utc_offset,
        Utc::now(),
    );
    tracing::debug!(
        identity = %identity.as_str(),
        pages = layout.page_count(),
        "Rendered roster document"
    );

    if query.format.as_deref() == Some("text") {
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            layout.to_plain_text(),
        )
            .into_response());
    }

    success(layout, model.revision).map(IntoResponse::into_response)
}

/// GET /api/export - Portable export file as an attachment.
pub async fn get_export(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response, AppErrorWithRevision> {
    let session = session_for(&state, &identity).await?;
    let model = session.current();

    let now = Utc::now();
    let export = build_export(&model.speakers, &model.settings, now);
    let body = export.to_json_pretty().map_err(|e| AppErrorWithRevision {
        error: e,
        revision_id: model.revision,
    })?;
    let filename = export_filename(now.with_timezone(&state.config.utc_offset).date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
