//! Multi-step flows shared by the integration tests.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use handoff_core::Session;
use serde_json::{json, Value};

use super::auth::authed_post;
use super::fixtures::create_test_png;
use super::{api_path, phone_path};

/// Creates a session and returns it as the backend sees it.
pub async fn create_session(client: &TestServer, body: Value) -> Session {
    let response = authed_post(client, &api_path("/sessions")).json(&body).await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Session>()
}

pub async fn create_photo_session(client: &TestServer, output_format: &str) -> Session {
    create_session(
        client,
        json!({ "action_type": "photo", "output_format": output_format }),
    )
    .await
}

pub async fn create_scan_session(client: &TestServer, document_mode: &str) -> Session {
    create_session(
        client,
        json!({ "action_type": "scan", "document_mode": document_mode, "output_format": "pdf" }),
    )
    .await
}

/// Drives the phone through the capture screen.
pub async fn open_action(client: &TestServer, session: &Session) -> Value {
    let response = client
        .get(&phone_path(&session.id.to_string(), "action"))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json::<Value>()
}

pub fn scan_page_form(document_index: u32, page_index: u32) -> MultipartForm {
    MultipartForm::new()
        .add_text("document_index", document_index.to_string())
        .add_text("page_index", page_index.to_string())
        .add_part(
            "file",
            Part::bytes(create_test_png(12, 16))
                .file_name("page.png")
                .mime_type("image/png"),
        )
}

pub async fn upload_scan_page(
    client: &TestServer,
    session: &Session,
    document_index: u32,
    page_index: u32,
) -> Value {
    let response = client
        .post(&phone_path(&session.id.to_string(), "scan/upload"))
        .multipart(scan_page_form(document_index, page_index))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json::<Value>()
}
