//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p handoff-api`.

#![allow(dead_code)]

pub mod auth;
pub mod fixtures;
pub mod workflows;

use std::sync::Arc;

use axum_test::TestServer;
use handoff_api::constants;
use handoff_api::setup::routes;
use handoff_api::state::AppState;
use handoff_core::Config;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Phone-facing path for a session (e.g. `/s/{id}/action`).
pub fn phone_path(id: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        format!("{}/{}", constants::PHONE_PREFIX, id)
    } else {
        format!("{}/{}/{}", constants::PHONE_PREFIX, id, suffix)
    }
}

/// Test application: server plus the state behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config() -> Config {
    Config::new("http://localhost:8080", vec![auth::TEST_API_KEY.to_string()])
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config())
}

pub fn setup_test_app_with(config: Config) -> TestApp {
    let state = Arc::new(AppState::new(config.clone()));
    let router = routes::setup_routes(&config, state.clone());
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");
    TestApp { server, state }
}
