use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::result::ResultItem;
use super::scan::ScanResult;
use super::session::{Session, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HubMessageType {
    StatusUpdate,
    Completed,
}

/// Result payload of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CompletionPayload {
    Items(Vec<ResultItem>),
    Scan(ScanResult),
}

/// Message pushed to real-time subscribers of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HubMessage {
    #[serde(rename = "type")]
    pub kind: HubMessageType,
    pub session_id: Uuid,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CompletionPayload>,
    pub timestamp: DateTime<Utc>,
}

impl HubMessage {
    pub fn status_update(session_id: Uuid, status: SessionStatus) -> Self {
        HubMessage {
            kind: HubMessageType::StatusUpdate,
            session_id,
            status,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn completed(session_id: Uuid, data: CompletionPayload) -> Self {
        HubMessage {
            kind: HubMessageType::Completed,
            session_id,
            status: SessionStatus::Completed,
            data: Some(data),
            timestamp: Utc::now(),
        }
    }
}

/// Body of the synchronous result endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PollResponse {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ResultItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanResult>,
}

impl PollResponse {
    /// Status-only body for sessions that have not completed yet.
    pub fn in_progress(status: SessionStatus) -> Self {
        PollResponse {
            status,
            completed_at: None,
            items: None,
            scan_result: None,
        }
    }

    pub fn completed(session: &Session) -> Self {
        PollResponse {
            status: SessionStatus::Completed,
            completed_at: session.completed_at,
            items: Some(session.result.clone()),
            scan_result: session.scan_result.clone(),
        }
    }
}
