use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use handoff_core::{AppError, ScanFinalizeResponse, ScanUploadResponse};
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError, IdPath};
use crate::services::ScanUpload;
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Missing, malformed and negative indices all fall back to 0.
fn parse_index(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

async fn read_upload(mut multipart: Multipart) -> Result<ScanUpload, HttpAppError> {
    let mut file: Option<(Bytes, String)> = None;
    let mut document_index = 0;
    let mut page_index = 0;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = field.bytes().await?;
                file = Some((data, content_type));
            }
            "document_index" => document_index = parse_index(&field.text().await?),
            "page_index" => page_index = parse_index(&field.text().await?),
            _ => {}
        }
    }

    let (data, content_type) =
        file.ok_or_else(|| AppError::InvalidInput("missing file field".to_string()))?;
    Ok(ScanUpload {
        document_index,
        page_index,
        data,
        content_type,
    })
}

#[utoipa::path(
    post,
    path = "/s/{id}/scan/upload",
    tag = "phone",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    request_body(content_type = "multipart/form-data", description = "`file`, optional `document_index` and `page_index`"),
    responses(
        (status = 200, description = "Page buffered", body = ScanUploadResponse),
        (status = 400, description = "Not a scan session, missing file or page limit reached", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session already completed or not yet opened", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse)
    )
)]
pub async fn upload_scan_page(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    multipart: Multipart,
) -> Result<Json<ScanUploadResponse>, HttpAppError> {
    let upload = read_upload(multipart).await?;
    Ok(Json(state.sessions.upload_scan_page(id, upload).await?))
}

#[utoipa::path(
    post,
    path = "/s/{id}/scan/finalize",
    tag = "phone",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Scan assembled, session completed", body = ScanFinalizeResponse),
        (status = 400, description = "No pages uploaded or not a scan session", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session already completed or not yet opened", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse),
        (status = 500, description = "Document assembly failed", body = ErrorResponse)
    )
)]
pub async fn finalize_scan(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<ScanFinalizeResponse>, HttpAppError> {
    Ok(Json(state.sessions.finalize_scan(id).await?))
}
