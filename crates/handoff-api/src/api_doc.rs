//! OpenAPI documentation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::constants::{API_KEY_HEADER, API_VERSION};
use crate::error;
use crate::handlers;
use crate::setup::routes::{HealthResponse, VersionResponse};
use crate::views;
use handoff_core::models;

/// Returns the OpenAPI document with the running build's version filled in.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info.version = API_VERSION.to_string();
    spec
}

struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Handoff API",
        description = "Delegates photo, signature and scan tasks to a phone through a short-lived session URL. Backend endpoints live under /api/v1/ and require an API key; phone endpoints live under /s/."
    ),
    modifiers(&ApiKeyAddon),
    paths(
        // Health
        crate::setup::routes::health::health_check,
        crate::setup::routes::health::version,
        // Sessions
        handlers::sessions::create_session,
        handlers::sessions::get_session,
        handlers::sessions::delete_session,
        handlers::sessions::get_result,
        handlers::events::session_events,
        handlers::downloads::download_file,
        // Phone
        handlers::pages::session_entry,
        handlers::pages::session_action,
        handlers::results::submit_result,
        handlers::scan::upload_scan_page,
        handlers::scan::finalize_scan,
    ),
    components(
        schemas(
            // Session models
            models::Session,
            models::Tombstone,
            models::CreateSessionRequest,
            models::ActionType,
            models::SessionStatus,
            models::OutputFormat,
            models::ScanDocumentMode,
            models::ScanOutputFormat,
            // Results
            models::ResultItem,
            models::SubmitResultItem,
            models::SubmitResultRequest,
            models::SubmitResultResponse,
            models::PollResponse,
            models::HubMessage,
            models::HubMessageType,
            models::CompletionPayload,
            // Scan
            models::ScanPage,
            models::ScanDocument,
            models::ScanResult,
            models::ScanUploadResponse,
            models::ScanFinalizeResponse,
            // Phone views
            views::PageView,
            views::ActionView,
            views::ScanView,
            // Health
            HealthResponse,
            VersionResponse,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "sessions", description = "Session creation, status, results and real-time events"),
        (name = "downloads", description = "Stored result artifacts"),
        (name = "phone", description = "Endpoints driven by the phone page"),
        (name = "health", description = "Liveness and build information")
    )
)]
pub struct ApiDoc;
