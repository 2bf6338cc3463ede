//! Domain methods for the Handoff API client.
//!
//! Response types come from `handoff_core::models`; [`SessionRecord`] and
//! [`Download`] wrap the shapes that have no server-side struct of their own.

use handoff_core::{CreateSessionRequest, PollResponse, Session, Tombstone};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiClient, ClientError, API_PREFIX};

/// GET /sessions/{id}: either the live session or its expiry tombstone.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SessionRecord {
    Live(Box<Session>),
    Expired(Tombstone),
}

/// A downloaded result file.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl ApiClient {
    pub async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session, ClientError> {
        self.post_json(&format!("{}/sessions", API_PREFIX), request)
            .await
    }

    /// Current state of a session.
    pub async fn get_session(&self, id: Uuid) -> Result<SessionRecord, ClientError> {
        self.get(&format!("{}/sessions/{}", API_PREFIX, id)).await
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<(), ClientError> {
        self.delete(&format!("{}/sessions/{}", API_PREFIX, id))
            .await
    }

    /// Synchronous result check; `status` is `completed` once a result exists.
    pub async fn poll_result(&self, id: Uuid) -> Result<PollResponse, ClientError> {
        self.get(&format!("{}/sessions/{}/result", API_PREFIX, id))
            .await
    }

    /// Downloads a result file by its download ID.
    pub async fn download_file(&self, download_id: Uuid) -> Result<Download, ClientError> {
        self.download_url(&format!("{}/downloads/{}", API_PREFIX, download_id))
            .await
    }

    /// Downloads from a server-relative URL such as a scan result's `pdf_url`.
    pub async fn download_url(&self, path: &str) -> Result<Download, ClientError> {
        let response = self.get_raw(path).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = response.bytes().await?.to_vec();
        Ok(Download { data, content_type })
    }
}
