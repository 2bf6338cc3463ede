//! API key helpers.

#![allow(dead_code)]

use axum_test::{TestRequest, TestServer};

pub const TEST_API_KEY: &str = "test-api-key-0123456789";

pub fn authed_get(client: &TestServer, path: &str) -> TestRequest {
    client.get(path).add_header("X-API-Key", TEST_API_KEY)
}

pub fn authed_post(client: &TestServer, path: &str) -> TestRequest {
    client.post(path).add_header("X-API-Key", TEST_API_KEY)
}

pub fn authed_delete(client: &TestServer, path: &str) -> TestRequest {
    client.delete(path).add_header("X-API-Key", TEST_API_KEY)
}
