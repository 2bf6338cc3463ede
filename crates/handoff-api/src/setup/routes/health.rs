//! Health check and version handlers.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::constants::{API_VERSION, BUILD_COMMIT};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
}

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

#[utoipa::path(
    get,
    path = "/api/v1/version",
    tag = "health",
    responses((status = 200, description = "Build information", body = VersionResponse))
)]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: API_VERSION,
        commit: BUILD_COMMIT,
    })
}
