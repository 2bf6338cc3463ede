//! Session event delivery.
//!
//! One background task per session moves through three modes: real-time over
//! an [`EventTransport`], polling a [`ResultSource`] once the reconnect budget
//! is spent, and closed. Listeners see every message in arrival order; the
//! terminal result is also handed to a single waiter through a one-slot channel.

mod transport;

pub use transport::{EventStream, EventTransport, ResultSource, WsTransport};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use handoff_core::{
    CompletionPayload, HubMessage, HubMessageType, PollResponse, ResultItem, ScanResult,
    SessionStatus,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ApiErrorKind;

/// Callback invoked for every lifecycle message of a session.
pub type EventListener = Arc<dyn Fn(&HubMessage) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Connection attempts before falling back to polling.
    pub connect_attempts: usize,
    /// Delay before the n-th reconnect; the last entry repeats.
    pub reconnect_delays: Vec<Duration>,
    pub poll_interval: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            reconnect_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl DeliverySettings {
    fn reconnect_delay(&self, attempt: usize) -> Duration {
        self.reconnect_delays
            .get(attempt - 1)
            .or_else(|| self.reconnect_delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Items(Vec<ResultItem>),
    Scan(ScanResult),
}

impl Completion {
    fn from_payload(payload: Option<CompletionPayload>) -> Self {
        match payload {
            Some(CompletionPayload::Scan(scan)) => Completion::Scan(scan),
            Some(CompletionPayload::Items(items)) => Completion::Items(items),
            None => Completion::Items(Vec::new()),
        }
    }

    fn from_poll(poll: PollResponse) -> Self {
        match poll.scan_result {
            Some(scan) => Completion::Scan(scan),
            None => Completion::Items(poll.items.unwrap_or_default()),
        }
    }

    fn payload(&self) -> CompletionPayload {
        match self {
            Completion::Items(items) => CompletionPayload::Items(items.clone()),
            Completion::Scan(scan) => CompletionPayload::Scan(scan.clone()),
        }
    }
}

/// Append-only listener list; callbacks run outside the lock.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: Mutex<Vec<EventListener>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: EventListener) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    fn dispatch(&self, message: &HubMessage) {
        let snapshot: Vec<EventListener> = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in snapshot {
            listener(message);
        }
    }
}

enum Mode {
    Realtime,
    Polling,
    Closed,
}

/// Whether a handled message ended the session.
enum Outcome {
    Continue,
    Finished,
}

pub(crate) struct Delivery {
    pub(crate) session_id: Uuid,
    pub(crate) transport: Arc<dyn EventTransport>,
    pub(crate) source: Arc<dyn ResultSource>,
    pub(crate) listeners: Arc<Listeners>,
    pub(crate) slot: mpsc::Sender<Completion>,
    pub(crate) cancel: CancellationToken,
    pub(crate) settings: DeliverySettings,
}

impl Delivery {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut mode = Mode::Realtime;
        loop {
            mode = match mode {
                Mode::Realtime => self.realtime().await,
                Mode::Polling => self.polling().await,
                Mode::Closed => break,
            };
        }
        tracing::debug!(session_id = %self.session_id, "delivery: stopped");
    }

    async fn realtime(&self) -> Mode {
        for attempt in 0..self.settings.connect_attempts {
            if attempt > 0 {
                let delay = self.settings.reconnect_delay(attempt);
                tokio::select! {
                    _ = self.cancel.cancelled() => return Mode::Closed,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                return Mode::Closed;
            }

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return Mode::Closed,
                connected = self.transport.connect(self.session_id) => connected,
            };
            let mut events = match connected {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, attempt, error = %e, "delivery: connect failed");
                    continue;
                }
            };

            loop {
                let next = tokio::select! {
                    _ = self.cancel.cancelled() => return Mode::Closed,
                    next = events.next() => next,
                };
                match next {
                    Some(Ok(message)) => {
                        if let Outcome::Finished = self.handle(message).await {
                            return Mode::Closed;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %self.session_id, error = %e, "delivery: connection error");
                        break;
                    }
                    None => break,
                }
            }

            if self.cancel.is_cancelled() {
                return Mode::Closed;
            }
            tracing::info!(session_id = %self.session_id, attempt, "delivery: connection lost");
        }

        tracing::warn!(session_id = %self.session_id, "delivery: reconnect budget exhausted, polling");
        Mode::Polling
    }

    async fn handle(&self, message: HubMessage) -> Outcome {
        match (message.kind, message.status) {
            (HubMessageType::Completed, _) => {
                let completion = Completion::from_payload(message.data.clone());
                self.listeners.dispatch(&message);
                self.deliver(completion);
                Outcome::Finished
            }
            (HubMessageType::StatusUpdate, SessionStatus::Completed) => {
                // completed before we subscribed; the payload has to be fetched
                self.listeners.dispatch(&message);
                match self.source.poll(self.session_id).await {
                    Ok(poll) if poll.status == SessionStatus::Completed => {
                        self.finish(Completion::from_poll(poll));
                        Outcome::Finished
                    }
                    Ok(_) => Outcome::Continue,
                    Err(e) => {
                        tracing::warn!(session_id = %self.session_id, error = %e, "delivery: failed to fetch result");
                        Outcome::Continue
                    }
                }
            }
            (HubMessageType::StatusUpdate, SessionStatus::Expired) => {
                self.listeners.dispatch(&message);
                Outcome::Finished
            }
            _ => {
                self.listeners.dispatch(&message);
                Outcome::Continue
            }
        }
    }

    async fn polling(&self) -> Mode {
        let mut last_status = None;
        loop {
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => return Mode::Closed,
                polled = self.source.poll(self.session_id) => polled,
            };

            match polled {
                Ok(poll) if poll.status == SessionStatus::Completed => {
                    self.finish(Completion::from_poll(poll));
                    return Mode::Closed;
                }
                Ok(poll) => {
                    if last_status != Some(poll.status) {
                        last_status = Some(poll.status);
                        self.listeners
                            .dispatch(&HubMessage::status_update(self.session_id, poll.status));
                    }
                }
                Err(e) => match e.api_kind() {
                    Some(ApiErrorKind::Expired) | Some(ApiErrorKind::NotFound) => {
                        tracing::info!(session_id = %self.session_id, error = %e, "delivery: session gone, polling stopped");
                        self.listeners.dispatch(&HubMessage::status_update(
                            self.session_id,
                            SessionStatus::Expired,
                        ));
                        return Mode::Closed;
                    }
                    _ => {
                        tracing::debug!(session_id = %self.session_id, error = %e, "delivery: poll failed");
                    }
                },
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Mode::Closed,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// Emits a synthesized completed message and hands the result to the waiter.
    fn finish(&self, completion: Completion) {
        self.listeners.dispatch(&HubMessage::completed(
            self.session_id,
            completion.payload(),
        ));
        self.deliver(completion);
    }

    /// Returns `false` when a result was already handed over.
    fn deliver(&self, completion: Completion) -> bool {
        match self.slot.try_send(completion) {
            Ok(()) => {
                tracing::info!(session_id = %self.session_id, "delivery: session completed");
                true
            }
            Err(_) => {
                tracing::debug!(session_id = %self.session_id, "delivery: result slot already filled");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ClientError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Hands out scripted connections; an exhausted script fails to connect.
    #[derive(Default)]
    struct ScriptedTransport {
        connections: Mutex<VecDeque<Vec<HubMessage>>>,
        attempts: AtomicUsize,
    }

    impl ScriptedTransport {
        fn with(connections: Vec<Vec<HubMessage>>) -> Self {
            Self {
                connections: Mutex::new(connections.into()),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EventTransport for ScriptedTransport {
        async fn connect(&self, _session_id: Uuid) -> Result<EventStream, ClientError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.connections.lock().unwrap().pop_front() {
                Some(messages) => Ok(futures::stream::iter(messages.into_iter().map(Ok)).boxed()),
                None => Err(ClientError::Transport("connection refused".to_string())),
            }
        }
    }

    /// A connection that stays open without sending anything.
    struct SilentTransport;

    #[async_trait]
    impl EventTransport for SilentTransport {
        async fn connect(&self, _session_id: Uuid) -> Result<EventStream, ClientError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    /// Completes on the n-th poll.
    struct CountingSource {
        complete_on: usize,
        polls: AtomicUsize,
        items: Vec<ResultItem>,
    }

    impl CountingSource {
        fn new(complete_on: usize) -> Self {
            Self {
                complete_on,
                polls: AtomicUsize::new(0),
                items: vec![ResultItem {
                    download_id: Uuid::nil(),
                    content_type: "image/png".to_string(),
                    filename: "photo.png".to_string(),
                }],
            }
        }
    }

    #[async_trait]
    impl ResultSource for CountingSource {
        async fn poll(&self, _session_id: Uuid) -> Result<PollResponse, ClientError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.complete_on {
                Ok(PollResponse {
                    status: SessionStatus::Completed,
                    completed_at: None,
                    items: Some(self.items.clone()),
                    scan_result: None,
                })
            } else {
                Ok(PollResponse::in_progress(SessionStatus::ActionStarted))
            }
        }
    }

    struct GoneSource;

    #[async_trait]
    impl ResultSource for GoneSource {
        async fn poll(&self, _session_id: Uuid) -> Result<PollResponse, ClientError> {
            Err(ApiError::from_body(410, r#"{"error":"session expired"}"#).into())
        }
    }

    fn delivery(
        transport: Arc<dyn EventTransport>,
        source: Arc<dyn ResultSource>,
        listeners: Arc<Listeners>,
    ) -> (Delivery, mpsc::Receiver<Completion>, CancellationToken) {
        let (slot, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let delivery = Delivery {
            session_id: Uuid::new_v4(),
            transport,
            source,
            listeners,
            slot,
            cancel: cancel.clone(),
            settings: DeliverySettings::default(),
        };
        (delivery, rx, cancel)
    }

    fn recorder(listeners: &Listeners, tag: &'static str, log: Arc<Mutex<Vec<String>>>) {
        listeners.add(Arc::new(move |message: &HubMessage| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", tag, message.status));
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_polling_after_failed_connects() {
        let transport = Arc::new(ScriptedTransport::default());
        let source = Arc::new(CountingSource::new(3));
        let (delivery, mut rx, _cancel) =
            delivery(transport.clone(), source.clone(), Arc::new(Listeners::default()));

        let started = Instant::now();
        delivery.spawn();
        let completion = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("result within deadline")
            .expect("result delivered");
        let elapsed = started.elapsed();

        assert!(matches!(completion, Completion::Items(ref items) if items.len() == 1));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_secs(6), "resolved too early: {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(8), "resolved too late: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_realtime_messages_reach_listeners_in_order() {
        let session_id = Uuid::new_v4();
        let transport = Arc::new(ScriptedTransport::with(vec![vec![
            HubMessage::status_update(session_id, SessionStatus::Opened),
            HubMessage::status_update(session_id, SessionStatus::ActionStarted),
            HubMessage::completed(session_id, CompletionPayload::Items(Vec::new())),
        ]]));
        let listeners = Arc::new(Listeners::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&listeners, "a", log.clone());
        recorder(&listeners, "b", log.clone());

        let (delivery, mut rx, _cancel) =
            delivery(transport.clone(), Arc::new(CountingSource::new(1)), listeners);
        delivery.spawn().await.unwrap();

        assert_eq!(rx.recv().await, Some(Completion::Items(Vec::new())));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:opened",
                "b:opened",
                "a:action_started",
                "b:action_started",
                "a:completed",
                "b:completed",
            ]
        );
        // terminal event observed: no reconnect
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_status_on_connect_fetches_result() {
        let session_id = Uuid::new_v4();
        let transport = Arc::new(ScriptedTransport::with(vec![vec![HubMessage::status_update(
            session_id,
            SessionStatus::Completed,
        )]]));
        let (delivery, mut rx, _cancel) = delivery(
            transport,
            Arc::new(CountingSource::new(1)),
            Arc::new(Listeners::default()),
        );
        delivery.spawn().await.unwrap();

        assert!(matches!(rx.recv().await, Some(Completion::Items(items)) if items.len() == 1));
    }

    #[tokio::test]
    async fn test_close_stops_delivery_without_result() {
        let (delivery, mut rx, cancel) = delivery(
            Arc::new(SilentTransport),
            Arc::new(CountingSource::new(1)),
            Arc::new(Listeners::default()),
        );
        let task = delivery.spawn();

        cancel.cancel();
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_session_is_gone() {
        let listeners = Arc::new(Listeners::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&listeners, "l", log.clone());
        let (delivery, mut rx, _cancel) = delivery(
            Arc::new(ScriptedTransport::default()),
            Arc::new(GoneSource),
            listeners,
        );
        delivery.spawn().await.unwrap();

        assert_eq!(rx.recv().await, None);
        assert_eq!(*log.lock().unwrap(), vec!["l:expired"]);
    }

    #[tokio::test]
    async fn test_second_delivery_is_dropped() {
        let (delivery, mut rx, _cancel) = delivery(
            Arc::new(SilentTransport),
            Arc::new(CountingSource::new(1)),
            Arc::new(Listeners::default()),
        );
        assert!(delivery.deliver(Completion::Items(Vec::new())));
        assert!(!delivery.deliver(Completion::Scan(ScanResult::default())));
        drop(delivery);

        assert_eq!(rx.recv().await, Some(Completion::Items(Vec::new())));
        assert_eq!(rx.recv().await, None);
    }
}
