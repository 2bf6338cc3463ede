use std::sync::Arc;

use axum::{extract::State, Json};
use handoff_core::{SubmitResultRequest, SubmitResultResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ErrorResponse, HttpAppError, IdPath, ValidatedJson};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/s/{id}/result",
    tag = "phone",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    request_body = SubmitResultRequest,
    responses(
        (status = 200, description = "Result stored, session completed", body = SubmitResultResponse),
        (status = 400, description = "Invalid body or base64 data", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session already completed or not yet opened", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse),
        (status = 413, description = "Body too large", body = ErrorResponse)
    )
)]
pub async fn submit_result(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    ValidatedJson(request): ValidatedJson<SubmitResultRequest>,
) -> Result<Json<SubmitResultResponse>, HttpAppError> {
    request.validate().map_err(handoff_core::AppError::from)?;
    let items = state.sessions.submit_result(id, request.items).await?;
    Ok(Json(SubmitResultResponse { items }))
}
