//! Per-session fan-out of lifecycle events to live subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use handoff_core::HubMessage;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// A connected subscriber that lifecycle messages are written to.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, message: &HubMessage) -> anyhow::Result<()>;

    /// Disconnects the subscriber. Called at most once by the hub.
    async fn close(&self);
}

/// Subscriber registry keyed by session id.
pub struct Hub {
    subscribers: Mutex<HashMap<Uuid, Vec<Arc<dyn EventSink>>>>,
    write_timeout: Duration,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

impl Hub {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            write_timeout,
        }
    }

    pub async fn subscribe(&self, session_id: Uuid, sink: Arc<dyn EventSink>) {
        let mut subscribers = self.subscribers.lock().await;
        let sinks = subscribers.entry(session_id).or_default();
        sinks.push(sink);
        tracing::info!(session_id = %session_id, subscribers = sinks.len(), "hub: subscriber added");
    }

    /// Removes `sink` from the session; unknown sinks are ignored.
    pub async fn unsubscribe(&self, session_id: Uuid, sink: &Arc<dyn EventSink>) {
        let mut subscribers = self.subscribers.lock().await;
        if let Some(sinks) = subscribers.get_mut(&session_id) {
            let before = sinks.len();
            sinks.retain(|s| !Arc::ptr_eq(s, sink));
            if sinks.len() != before {
                tracing::info!(session_id = %session_id, remaining = sinks.len(), "hub: subscriber removed");
            }
            if sinks.is_empty() {
                subscribers.remove(&session_id);
            }
        }
    }

    pub async fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.subscribers
            .lock()
            .await
            .get(&session_id)
            .map_or(0, Vec::len)
    }

    /// Delivers `message` to every sink currently subscribed to the session.
    ///
    /// Writes run concurrently, each bounded by the write timeout. Sinks whose
    /// write fails or times out are unsubscribed and closed; the remaining
    /// sinks still receive the message and no error reaches the caller.
    pub async fn broadcast(&self, session_id: Uuid, message: &HubMessage) {
        let sinks = match self.subscribers.lock().await.get(&session_id) {
            Some(sinks) => sinks.clone(),
            None => return,
        };

        let timeout = self.write_timeout;
        let results = join_all(sinks.iter().map(|sink| async move {
            match tokio::time::timeout(timeout, sink.send(message)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("write timed out after {:?}", timeout)),
            }
        }))
        .await;

        let failed: Vec<Arc<dyn EventSink>> = sinks
            .into_iter()
            .zip(results)
            .filter_map(|(sink, result)| match result {
                Ok(()) => None,
                Err(error) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %error,
                        "hub: dropping subscriber after failed write"
                    );
                    Some(sink)
                }
            })
            .collect();

        tracing::debug!(
            session_id = %session_id,
            kind = ?message.kind,
            status = %message.status,
            failed = failed.len(),
            "hub: broadcast delivered"
        );

        if failed.is_empty() {
            return;
        }
        for sink in &failed {
            self.unsubscribe(session_id, sink).await;
        }
        for sink in failed {
            sink.close().await;
        }
    }

    /// Disconnects and forgets every subscriber of the session.
    pub async fn close_session(&self, session_id: Uuid) {
        let sinks = self
            .subscribers
            .lock()
            .await
            .remove(&session_id)
            .unwrap_or_default();
        if sinks.is_empty() {
            return;
        }
        tracing::info!(session_id = %session_id, closed = sinks.len(), "hub: closing session subscribers");
        for sink in sinks {
            sink.close().await;
        }
    }
}
