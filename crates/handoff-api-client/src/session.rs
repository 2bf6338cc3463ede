//! Session creation and the handle application code holds on to.

use std::sync::Arc;
use std::time::Duration;

use handoff_core::{
    ActionType, CreateSessionRequest, HubMessage, OutputFormat, ResultItem, ScanDocumentMode,
    ScanOutputFormat, ScanResult, Session,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::delivery::{
    Completion, Delivery, DeliverySettings, EventTransport, Listeners, ResultSource, WsTransport,
};
use crate::{ApiClient, ClientError};

/// Fluent builder for a new session.
pub struct SessionBuilder {
    client: ApiClient,
    action: Option<ActionType>,
    intro_text: Option<String>,
    output_format: Option<OutputFormat>,
    document_mode: Option<ScanDocumentMode>,
    scan_output: Option<ScanOutputFormat>,
    session_ttl: Option<Duration>,
    result_ttl: Option<Duration>,
    settings: DeliverySettings,
}

impl SessionBuilder {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            action: None,
            intro_text: None,
            output_format: None,
            document_mode: None,
            scan_output: None,
            session_ttl: None,
            result_ttl: None,
            settings: DeliverySettings::default(),
        }
    }

    /// Required.
    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_intro(mut self, text: impl Into<String>) -> Self {
        self.intro_text = Some(text.into());
        self
    }

    /// Required for photo and signature sessions.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Scan sessions only.
    pub fn with_document_mode(mut self, mode: ScanDocumentMode) -> Self {
        self.document_mode = Some(mode);
        self
    }

    /// Scan sessions only.
    pub fn with_scan_output(mut self, format: ScanOutputFormat) -> Self {
        self.scan_output = Some(format);
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = Some(ttl);
        self
    }

    pub fn with_delivery_settings(mut self, settings: DeliverySettings) -> Self {
        self.settings = settings;
        self
    }

    fn request(&self) -> Result<CreateSessionRequest, ClientError> {
        let action = self.action.ok_or_else(|| {
            ClientError::InvalidRequest("action type is required (use with_action)".to_string())
        })?;

        let output_format = match action {
            ActionType::Scan => self.scan_output.map(|f| f.as_str().to_string()),
            ActionType::Photo | ActionType::Signature => {
                let format = self.output_format.ok_or_else(|| {
                    ClientError::InvalidRequest(
                        "output format is required (use with_output_format)".to_string(),
                    )
                })?;
                Some(format.as_str().to_string())
            }
        };
        let document_mode = match action {
            ActionType::Scan => self.document_mode.map(|m| m.as_str().to_string()),
            _ => None,
        };

        Ok(CreateSessionRequest {
            action_type: action.as_str().to_string(),
            intro_text: self.intro_text.clone(),
            output_format,
            document_mode,
            session_ttl: self.session_ttl.map(ttl_string),
            result_ttl: self.result_ttl.map(ttl_string),
        })
    }

    /// Validates the builder, creates the session and starts event delivery.
    pub async fn invoke(self) -> Result<SessionHandle, ClientError> {
        let request = self.request()?;
        let session = self.client.create_session(&request).await?;
        tracing::info!(session_id = %session.id, action = %session.action_type, "client: session created");

        let transport = Arc::new(WsTransport::new(self.client.clone()));
        let source = Arc::new(self.client);
        Ok(SessionHandle::start(session, transport, source, self.settings))
    }
}

fn ttl_string(ttl: Duration) -> String {
    format!("{}ms", ttl.as_millis())
}

/// A created session with its delivery task running in the background.
///
/// Dropping the handle closes it.
pub struct SessionHandle {
    session: Session,
    listeners: Arc<Listeners>,
    results: Mutex<mpsc::Receiver<Completion>>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Starts delivery for an existing session over the given transports.
    pub fn start(
        session: Session,
        transport: Arc<dyn EventTransport>,
        source: Arc<dyn ResultSource>,
        settings: DeliverySettings,
    ) -> Self {
        let (slot, results) = mpsc::channel(1);
        let listeners = Arc::new(Listeners::default());
        let cancel = CancellationToken::new();

        Delivery {
            session_id: session.id,
            transport,
            source,
            listeners: listeners.clone(),
            slot,
            cancel: cancel.clone(),
            settings,
        }
        .spawn();

        Self {
            session,
            listeners,
            results: Mutex::new(results),
            cancel,
        }
    }

    /// The session as returned by the server at creation.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// URL the phone user should open.
    pub fn url(&self) -> &str {
        &self.session.url
    }

    /// Registers a callback for every future lifecycle message.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&HubMessage) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener));
    }

    /// Waits for the terminal result, the timeout, a close, or `cancel`.
    pub async fn wait_for_completion(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Completion, ClientError> {
        // another waiter may hold the receiver; the deadline still applies
        let next = async { self.results.lock().await.recv().await };
        tokio::select! {
            biased;
            completion = next => completion.ok_or(ClientError::Closed),
            _ = self.cancel.cancelled() => Err(ClientError::Closed),
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(ClientError::Timeout),
        }
    }

    /// Result items of a photo or signature session.
    pub async fn wait_for_result(&self, timeout: Duration) -> Result<Vec<ResultItem>, ClientError> {
        match self
            .wait_for_completion(timeout, &CancellationToken::new())
            .await?
        {
            Completion::Items(items) => Ok(items),
            Completion::Scan(_) => Err(ClientError::InvalidRequest(
                "scan session: use wait_for_scan_result".to_string(),
            )),
        }
    }

    /// Assembled documents of a scan session.
    pub async fn wait_for_scan_result(&self, timeout: Duration) -> Result<ScanResult, ClientError> {
        match self
            .wait_for_completion(timeout, &CancellationToken::new())
            .await?
        {
            Completion::Scan(scan) => Ok(scan),
            Completion::Items(_) => Err(ClientError::InvalidRequest(
                "no scan result available".to_string(),
            )),
        }
    }

    /// Stops delivery. Safe to call more than once.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(session_id = %self.session.id, "client: closing session handle");
        }
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::EventStream;
    use async_trait::async_trait;
    use futures::StreamExt;
    use handoff_core::{OutputSelection, PollResponse, SessionStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;
    use uuid::Uuid;

    struct Unreachable;

    #[async_trait]
    impl EventTransport for Unreachable {
        async fn connect(&self, _session_id: Uuid) -> Result<EventStream, ClientError> {
            Err(ClientError::Transport("connection refused".to_string()))
        }
    }

    struct Silent;

    #[async_trait]
    impl EventTransport for Silent {
        async fn connect(&self, _session_id: Uuid) -> Result<EventStream, ClientError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    struct CompletesOnThirdPoll {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl ResultSource for CompletesOnThirdPoll {
        async fn poll(&self, _session_id: Uuid) -> Result<PollResponse, ClientError> {
            if self.polls.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                return Ok(PollResponse::in_progress(SessionStatus::Opened));
            }
            Ok(PollResponse {
                status: SessionStatus::Completed,
                completed_at: None,
                items: Some(Vec::new()),
                scan_result: None,
            })
        }
    }

    fn session(action: ActionType) -> Session {
        let output = match action {
            ActionType::Scan => OutputSelection::Scan {
                document_mode: ScanDocumentMode::Single,
                output_format: ScanOutputFormat::Pdf,
            },
            _ => OutputSelection::File(OutputFormat::Png),
        };
        Session::new(
            action,
            output,
            None,
            Duration::from_secs(60),
            Duration::from_secs(60),
            "http://localhost:8080",
        )
    }

    fn builder() -> SessionBuilder {
        SessionBuilder::new(ApiClient::new("http://localhost:8080", "key").unwrap())
    }

    #[test]
    fn test_builder_requires_action_and_output_format() {
        assert!(matches!(
            builder().request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            builder().with_action(ActionType::Photo).request(),
            Err(ClientError::InvalidRequest(_))
        ));

        let request = builder()
            .with_action(ActionType::Signature)
            .with_output_format(OutputFormat::Svg)
            .with_session_ttl(Duration::from_secs(90))
            .request()
            .unwrap();
        assert_eq!(request.action_type, "signature");
        assert_eq!(request.output_format.as_deref(), Some("svg"));
        assert_eq!(request.session_ttl.as_deref(), Some("90000ms"));
        assert_eq!(request.document_mode, None);
    }

    #[test]
    fn test_scan_builder_needs_no_output_format() {
        let request = builder()
            .with_action(ActionType::Scan)
            .with_document_mode(ScanDocumentMode::Multi)
            .request()
            .unwrap();
        assert_eq!(request.document_mode.as_deref(), Some("multi"));
        assert_eq!(request.output_format, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_through_polling_fallback() {
        let handle = SessionHandle::start(
            session(ActionType::Photo),
            Arc::new(Unreachable),
            Arc::new(CompletesOnThirdPoll {
                polls: AtomicUsize::new(0),
            }),
            DeliverySettings::default(),
        );
        let events = Arc::new(AtomicUsize::new(0));
        let counter = events.clone();
        handle.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let started = Instant::now();
        let items = handle
            .wait_for_result(Duration::from_secs(60))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(items.is_empty());
        assert!(elapsed >= Duration::from_secs(6) && elapsed <= Duration::from_secs(8));
        // one status_update from polling, then the completed message
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_unblocks_waiter() {
        let handle = Arc::new(SessionHandle::start(
            session(ActionType::Photo),
            Arc::new(Silent),
            Arc::new(CompletesOnThirdPoll {
                polls: AtomicUsize::new(0),
            }),
            DeliverySettings::default(),
        ));

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_for_result(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;
        handle.close();
        handle.close();

        assert!(matches!(waiter.await.unwrap(), Err(ClientError::Closed)));
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_and_honours_caller_cancellation() {
        let handle = SessionHandle::start(
            session(ActionType::Scan),
            Arc::new(Silent),
            Arc::new(CompletesOnThirdPoll {
                polls: AtomicUsize::new(0),
            }),
            DeliverySettings::default(),
        );

        assert!(matches!(
            handle.wait_for_scan_result(Duration::from_secs(5)).await,
            Err(ClientError::Timeout)
        ));

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            handle
                .wait_for_completion(Duration::from_secs(5), &cancel)
                .await,
            Err(ClientError::Cancelled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_waiter_keeps_its_own_deadline() {
        let handle = Arc::new(SessionHandle::start(
            session(ActionType::Photo),
            Arc::new(Silent),
            Arc::new(CompletesOnThirdPoll {
                polls: AtomicUsize::new(0),
            }),
            DeliverySettings::default(),
        ));

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_for_result(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;

        let started = Instant::now();
        assert!(matches!(
            handle.wait_for_result(Duration::from_millis(200)).await,
            Err(ClientError::Timeout)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!first.is_finished());

        handle.close();
        assert!(matches!(first.await.unwrap(), Err(ClientError::Closed)));
    }
}
