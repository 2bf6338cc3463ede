//! Real-time session events over WebSocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use handoff_core::{AppError, HubMessage, SessionStatus};
use handoff_store::SessionLookup;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError, IdPath};
use crate::hub::EventSink;
use crate::state::AppState;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Write half of a subscriber's socket.
pub struct WsSink {
    writer: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn new(writer: SplitSink<WebSocket, Message>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl EventSink for WsSink {
    async fn send(&self, message: &HubMessage) -> anyhow::Result<()> {
        let text = serde_json::to_string(message)?;
        self.writer.lock().await.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&self) {
        let close = async {
            let mut writer = self.writer.lock().await;
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
            tracing::debug!("ws: close handshake timed out");
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/ws",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("api_key" = Option<String>, Query, description = "API key, for clients that cannot set headers")
    ),
    responses(
        (status = 101, description = "Upgraded; lifecycle messages follow"),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 410, description = "Session expired", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn session_events(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, HttpAppError> {
    match state.sessions.lookup(id).await {
        SessionLookup::Live(_) => {}
        SessionLookup::Expired(_) => {
            return Err(AppError::Expired("session expired".to_string()).into())
        }
        SessionLookup::Absent => {
            return Err(AppError::NotFound("session not found".to_string()).into())
        }
    }

    let upgrade = upgrade.map_err(|rejection| {
        HttpAppError(AppError::InvalidInput(format!(
            "websocket upgrade required: {}",
            rejection.body_text()
        )))
    })?;

    Ok(upgrade.on_upgrade(move |socket| serve_subscriber(socket, state, id)))
}

async fn serve_subscriber(socket: WebSocket, state: Arc<AppState>, id: Uuid) {
    let (writer, mut reader) = socket.split();
    let sink = Arc::new(WsSink::new(writer));
    let subscriber: Arc<dyn EventSink> = sink.clone();
    let hub = state.sessions.hub().clone();

    hub.subscribe(id, subscriber.clone()).await;
    tracing::info!(session_id = %id, "ws: client connected");

    // read after subscribing so a transition in between is not lost
    let status = state
        .sessions
        .lookup(id)
        .await
        .status()
        .unwrap_or(SessionStatus::Expired);
    if let Err(e) = sink.send(&HubMessage::status_update(id, status)).await {
        tracing::debug!(session_id = %id, error = %e, "ws: failed to send initial status");
        hub.unsubscribe(id, &subscriber).await;
        sink.close().await;
        return;
    }

    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    hub.unsubscribe(id, &subscriber).await;
    tracing::info!(session_id = %id, "ws: client disconnected");
}
