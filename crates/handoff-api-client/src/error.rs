//! Client error types.

use serde::Deserialize;

/// Stable classification of API error statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NotFound,
    Conflict,
    Expired,
    Unauthorized,
    Other,
}

/// A non-2xx response that survived the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("API error {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

#[derive(Deserialize)]
struct ServerErrorBody {
    error: String,
}

impl ApiError {
    /// Uses the server's `{"error": ...}` message when present, else the raw body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ServerErrorBody>(body)
            .ok()
            .map(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string());
        ApiError { status, message }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self.status {
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            410 => ApiErrorKind::Expired,
            401 => ApiErrorKind::Unauthorized,
            _ => ApiErrorKind::Other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("session closed before completion")]
    Closed,

    #[error("wait cancelled")]
    Cancelled,

    #[error("timed out waiting for result")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// The API error kind, if this is an API error.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            ClientError::Api(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
