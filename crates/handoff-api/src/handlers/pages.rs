//! Phone-facing entry points. They drive the opened/action_started
//! transitions and describe the page to render.

use std::sync::Arc;

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError, IdPath};
use crate::state::AppState;
use crate::views::PageView;

#[utoipa::path(
    get,
    path = "/s/{id}",
    tag = "phone",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Intro, capture or completed view", body = PageView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse)
    )
)]
pub async fn session_entry(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<PageView>, HttpAppError> {
    Ok(Json(state.sessions.visit_entry(id).await?))
}

#[utoipa::path(
    get,
    path = "/s/{id}/action",
    tag = "phone",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Capture or completed view", body = PageView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse)
    )
)]
pub async fn session_action(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<PageView>, HttpAppError> {
    Ok(Json(state.sessions.visit_action(id).await?))
}
