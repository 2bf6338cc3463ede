//! API key authentication for the backend-facing routes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use handoff_core::AppError;
use subtle::ConstantTimeEq;

use crate::constants::{API_KEY_HEADER, API_KEY_QUERY};
use crate::error::HttpAppError;

#[derive(Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
}

impl AuthState {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
        }
    }

    /// Compares `candidate` against every configured key without
    /// short-circuiting on the first match.
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.api_keys
            .iter()
            .fold(false, |found, key| secure_compare(key, candidate) | found)
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Key from the `X-API-Key` header, falling back to the `api_key` query
/// parameter (browsers cannot set headers on WebSocket handshakes).
pub fn extract_api_key(request: &Request) -> Option<String> {
    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|k| !k.is_empty())
    {
        return Some(key.to_string());
    }

    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(API_KEY_QUERY))
        .filter(|k| !k.is_empty())
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let Some(key) = extract_api_key(&request) else {
        tracing::debug!(path = %path, "auth: missing API key");
        return HttpAppError(AppError::Unauthorized("missing API key".to_string())).into_response();
    };

    if !auth_state.is_valid(&key) {
        tracing::warn!(path = %path, "auth: invalid API key");
        return HttpAppError(AppError::Unauthorized("invalid API key".to_string())).into_response();
    }

    next.run(request).await
}
