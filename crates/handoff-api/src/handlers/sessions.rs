use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use handoff_core::{AppError, CreateSessionRequest, PollResponse, Session, SessionStatus, Tombstone};
use handoff_store::SessionLookup;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError, IdPath, ValidatedJson};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = Session),
        (status = 400, description = "Invalid action, output format or TTL", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state.sessions.create(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Live session, or a tombstone with status `expired`", body = Session),
        (status = 404, description = "Session never existed", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Response, HttpAppError> {
    match state.sessions.lookup(id).await {
        SessionLookup::Live(session) => Ok(Json(session).into_response()),
        SessionLookup::Expired(tombstone) => Ok(Json::<Tombstone>(tombstone).into_response()),
        SessionLookup::Absent => Err(AppError::NotFound("session not found".to_string()).into()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session removed and subscribers disconnected"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<StatusCode, HttpAppError> {
    state.sessions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/result",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session completed", body = PollResponse),
        (status = 202, description = "Session still in progress", body = PollResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.sessions.poll_result(id).await?;
    let status = if response.status == SessionStatus::Completed {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(response)))
}
