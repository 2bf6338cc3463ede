//! Transports feeding the delivery task.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use handoff_core::{HubMessage, PollResponse};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::{ApiClient, ClientError};

/// Decoded lifecycle messages from one connection; ends when the connection does.
pub type EventStream = BoxStream<'static, Result<HubMessage, ClientError>>;

/// Opens real-time connections scoped to one session.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self, session_id: Uuid) -> Result<EventStream, ClientError>;
}

/// Synchronous status/result endpoint used while polling.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn poll(&self, session_id: Uuid) -> Result<PollResponse, ClientError>;
}

#[async_trait]
impl ResultSource for ApiClient {
    async fn poll(&self, session_id: Uuid) -> Result<PollResponse, ClientError> {
        self.poll_result(session_id).await
    }
}

/// WebSocket transport against `/api/v1/sessions/{id}/ws`.
pub struct WsTransport {
    client: ApiClient,
}

impl WsTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTransport for WsTransport {
    async fn connect(&self, session_id: Uuid) -> Result<EventStream, ClientError> {
        let url = self.client.ws_url(session_id)?;
        let (socket, _) = connect_async(url).await?;
        tracing::debug!(session_id = %session_id, "ws: connected");

        let events = socket.filter_map(move |frame| async move {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<HubMessage>(&text) {
                    Ok(message) => Some(Ok(message)),
                    Err(e) => {
                        tracing::debug!(session_id = %session_id, error = %e, "ws: skipping undecodable message");
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            }
        });
        Ok(events.boxed())
    }
}
