use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError, IdPath};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/downloads/{download_id}",
    tag = "downloads",
    params(
        ("download_id" = Uuid, Path, description = "Download ID from a result item or scan result URL")
    ),
    responses(
        (status = 200, description = "Stored file bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown or expired download", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    IdPath(download_id): IdPath,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = state.sessions.download(download_id).await?;
    tracing::debug!(
        download_id = %download_id,
        content_type = %file.content_type,
        bytes = file.data.len(),
        "download: serving file"
    );
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, "attachment".to_string()),
        ],
        file.data,
    ))
}
