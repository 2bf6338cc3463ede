use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Path prefix under which stored artifacts are served.
pub const DOWNLOADS_PATH: &str = "/api/v1/downloads";

pub fn download_url(download_id: Uuid) -> String {
    format!("{}/{}", DOWNLOADS_PATH, download_id)
}

/// One produced artifact of a completed photo or signature session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResultItem {
    pub download_id: Uuid,
    pub content_type: String,
    pub filename: String,
}

/// A downloadable artifact held by the store under its own TTL.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub data: Bytes,
    pub content_type: String,
}

impl StoredFile {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        StoredFile {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitResultItem {
    #[validate(length(min = 1, message = "content_type is required"))]
    pub content_type: String,
    #[validate(length(min = 1, message = "filename is required"))]
    pub filename: String,
    /// Base64-encoded file contents.
    #[validate(length(min = 1, message = "data is required"))]
    pub data: String,
}

impl SubmitResultItem {
    /// Decodes `data` as standard base64, falling back to the URL-safe alphabet.
    pub fn decode(&self) -> Result<Vec<u8>, AppError> {
        STANDARD
            .decode(self.data.as_bytes())
            .or_else(|_| URL_SAFE.decode(self.data.as_bytes()))
            .map_err(AppError::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitResultRequest {
    #[validate(length(min = 1, message = "items must not be empty"), nested)]
    pub items: Vec<SubmitResultItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResultResponse {
    pub items: Vec<ResultItem>,
}
