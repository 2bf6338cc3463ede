//! Route configuration and setup.
//!
//! Backend routes under `/api/v1` require an API key; the phone-facing
//! routes under `/s` and the health probes are public.

pub(crate) mod health;

pub use health::{HealthResponse, VersionResponse};

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use handoff_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthState};
use crate::constants::{API_PREFIX, PHONE_PREFIX};
use crate::handlers;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the full application router.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let auth_state = AuthState::new(config.api_keys.clone());

    let protected_routes = protected_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(Arc::new(auth_state), auth_middleware),
    );

    let body_limit = config
        .result_upload_max_bytes
        .max(config.scan_upload_max_bytes)
        + MULTIPART_OVERHEAD_BYTES;

    public_routes(config, state.clone())
        .merge(protected_routes)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

fn public_routes(config: &Config, state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/health", API_PREFIX), get(health::health_check))
        .route(&format!("{}/version", API_PREFIX), get(health::version))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .route(
            &format!("{}/{{id}}", PHONE_PREFIX),
            get(handlers::pages::session_entry),
        )
        .route(
            &format!("{}/{{id}}/action", PHONE_PREFIX),
            get(handlers::pages::session_action),
        )
        .route(
            &format!("{}/{{id}}/result", PHONE_PREFIX),
            post(handlers::results::submit_result)
                .layer(DefaultBodyLimit::max(config.result_upload_max_bytes)),
        )
        .route(
            &format!("{}/{{id}}/scan/upload", PHONE_PREFIX),
            post(handlers::scan::upload_scan_page)
                .layer(DefaultBodyLimit::max(config.scan_upload_max_bytes)),
        )
        .route(
            &format!("{}/{{id}}/scan/finalize", PHONE_PREFIX),
            post(handlers::scan::finalize_scan),
        )
        .with_state(state)
}

fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/sessions", API_PREFIX),
            post(handlers::sessions::create_session),
        )
        .route(
            &format!("{}/sessions/{{id}}", API_PREFIX),
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            &format!("{}/sessions/{{id}}/result", API_PREFIX),
            get(handlers::sessions::get_result),
        )
        .route(
            &format!("{}/sessions/{{id}}/ws", API_PREFIX),
            get(handlers::events::session_events),
        )
        .route(
            &format!("{}/downloads/{{download_id}}", API_PREFIX),
            get(handlers::downloads::download_file),
        )
        .with_state(state)
}
