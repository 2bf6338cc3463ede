//! Session lifecycle: the state machine layered over the store.
//!
//! Keeps handler logic thin and allows unit testing without HTTP. Every
//! state-changing call holds the session's lock for its whole duration, so
//! two requests racing on one session id are applied one after the other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use handoff_core::{
    download_url, AppError, CompletionPayload, Config, CreateSessionRequest, HubMessage,
    PollResponse, ResultItem, ScanDocument, ScanFinalizeResponse, ScanPage, ScanPageData,
    ScanResult, ScanUploadResponse, Session, SessionStatus, StoredFile, SubmitResultItem,
};
use handoff_processing::{
    assemble, convert_for_output, effective_document_index, Artifact, AssembledDocument,
    DocumentCodec,
};
use handoff_store::{SessionLookup, SessionStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use validator::Validate;

use crate::hub::Hub;
use crate::views::PageView;

/// One page as received from the phone.
#[derive(Debug, Clone)]
pub struct ScanUpload {
    pub document_index: u32,
    pub page_index: u32,
    pub data: Bytes,
    pub content_type: String,
}

/// Server-wide defaults applied to new sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_url: String,
    pub session_ttl: Duration,
    pub result_ttl: Duration,
    pub scan_max_pages: usize,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            session_ttl: config.session_ttl,
            result_ttl: config.result_ttl,
            scan_max_pages: config.scan_max_pages,
        }
    }
}

#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // only the map holds these, nobody is waiting on them
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct SessionService {
    store: Arc<SessionStore>,
    hub: Arc<Hub>,
    codec: Arc<dyn DocumentCodec>,
    settings: SessionSettings,
    locks: SessionLocks,
}

impl SessionService {
    pub fn new(
        store: Arc<SessionStore>,
        hub: Arc<Hub>,
        codec: Arc<dyn DocumentCodec>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            hub,
            codec,
            settings,
            locks: SessionLocks::default(),
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub async fn create(&self, request: CreateSessionRequest) -> Result<Session, AppError> {
        request.validate()?;
        let action = request.action()?;
        let output = request.output_selection(action)?;
        let session_ttl = request.session_ttl_or(self.settings.session_ttl)?;
        let result_ttl = request.result_ttl_or(self.settings.result_ttl)?;

        let session = Session::new(
            action,
            output,
            request.intro_text,
            session_ttl,
            result_ttl,
            &self.settings.base_url,
        );
        self.store.create(session.clone()).await?;

        tracing::info!(
            session_id = %session.id,
            action_type = %action,
            session_ttl = ?session_ttl,
            result_ttl = ?result_ttl,
            "session created"
        );
        Ok(session)
    }

    pub async fn lookup(&self, id: Uuid) -> SessionLookup {
        self.store.get(id).await
    }

    /// Removes the session and its tombstone and disconnects its subscribers.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let _guard = self.locks.acquire(id).await;
        if matches!(self.store.get(id).await, SessionLookup::Absent) {
            return Err(AppError::NotFound("session not found".to_string()));
        }
        self.store.delete(id).await;
        self.store.clear_pages(id).await;
        self.hub.close_session(id).await;
        tracing::info!(session_id = %id, "session deleted");
        Ok(())
    }

    async fn live(&self, id: Uuid) -> Result<Session, AppError> {
        match self.store.get(id).await {
            SessionLookup::Live(session) => Ok(session),
            SessionLookup::Expired(_) => Err(AppError::Expired("session expired".to_string())),
            SessionLookup::Absent => Err(AppError::NotFound("session not found".to_string())),
        }
    }

    /// Live session that may still accept a result.
    async fn writable(&self, id: Uuid) -> Result<Session, AppError> {
        let session = self.live(id).await?;
        if session.status == SessionStatus::Completed {
            return Err(AppError::Conflict("session already completed".to_string()));
        }
        if !session.opened {
            return Err(AppError::Conflict("session not yet opened".to_string()));
        }
        Ok(session)
    }

    async fn scan_writable(&self, id: Uuid) -> Result<Session, AppError> {
        let session = self.writable(id).await?;
        if !session.is_scan() {
            return Err(AppError::InvalidInput(
                "session is not a scan session".to_string(),
            ));
        }
        Ok(session)
    }

    async fn open_if_pending(&self, session: Session) -> Result<Session, AppError> {
        if session.status != SessionStatus::Pending {
            return Ok(session);
        }
        let session = self.store.mark_opened(session.id).await?;
        tracing::info!(session_id = %session.id, "session opened");
        self.hub
            .broadcast(
                session.id,
                &HubMessage::status_update(session.id, SessionStatus::Opened),
            )
            .await;
        Ok(session)
    }

    async fn start_action(&self, session: Session) -> Result<Session, AppError> {
        if !session.status.can_advance_to(SessionStatus::ActionStarted) {
            return Ok(session);
        }
        let session = self.store.mark_action_started(session.id).await?;
        tracing::info!(session_id = %session.id, "session action started");
        self.hub
            .broadcast(
                session.id,
                &HubMessage::status_update(session.id, SessionStatus::ActionStarted),
            )
            .await;
        Ok(session)
    }

    /// First phone visit: opens the session and picks the intro or capture view.
    pub async fn visit_entry(&self, id: Uuid) -> Result<PageView, AppError> {
        let _guard = self.locks.acquire(id).await;
        let session = self.live(id).await?;
        if session.status == SessionStatus::Completed {
            return Ok(PageView::completed(&session));
        }

        let session = self.open_if_pending(session).await?;
        if let Some(intro) = session.intro_text.as_deref() {
            return Ok(PageView::intro(&session, intro));
        }
        let session = self.start_action(session).await?;
        Ok(PageView::action(&session))
    }

    /// The capture screen, reached directly or from the intro view.
    pub async fn visit_action(&self, id: Uuid) -> Result<PageView, AppError> {
        let _guard = self.locks.acquire(id).await;
        let session = self.live(id).await?;
        if session.status == SessionStatus::Completed {
            return Ok(PageView::completed(&session));
        }

        let session = self.open_if_pending(session).await?;
        let session = self.start_action(session).await?;
        Ok(PageView::action(&session))
    }

    /// Stores the submitted files and completes a photo or signature session.
    ///
    /// All files are decoded and converted before anything is written, so a
    /// bad payload or codec failure leaves the session untouched.
    pub async fn submit_result(
        &self,
        id: Uuid,
        items: Vec<SubmitResultItem>,
    ) -> Result<Vec<ResultItem>, AppError> {
        let _guard = self.locks.acquire(id).await;
        let session = self.writable(id).await?;

        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            let data = item.decode()?;
            decoded.push((item.content_type, item.filename, data));
        }

        let codec = self.codec.clone();
        let wants_pdf = session.wants_pdf();
        let artifacts = tokio::task::spawn_blocking(move || {
            decoded
                .into_iter()
                .map(|(content_type, filename, data)| {
                    convert_for_output(codec.as_ref(), wants_pdf, &content_type, &filename, data)
                })
                .collect::<Result<Vec<Artifact>, _>>()
        })
        .await
        .map_err(|e| AppError::Internal(format!("conversion task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(session_id = %id, error = %e, "submit: conversion failed");
            AppError::from(e)
        })?;

        let mut result = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let download_id = self.store_artifact(&artifact, session.result_ttl).await;
            result.push(ResultItem {
                download_id,
                content_type: artifact.content_type,
                filename: artifact.filename,
            });
        }

        self.store.mark_completed(id, result.clone()).await?;
        self.hub
            .broadcast(
                id,
                &HubMessage::completed(id, CompletionPayload::Items(result.clone())),
            )
            .await;

        tracing::info!(session_id = %id, items = result.len(), "submit: session completed");
        Ok(result)
    }

    async fn store_artifact(&self, artifact: &Artifact, ttl: Duration) -> Uuid {
        let download_id = Uuid::new_v4();
        self.store
            .store_file(
                download_id,
                StoredFile::new(artifact.data.clone(), artifact.content_type.clone()),
                ttl,
            )
            .await;
        download_id
    }

    /// Buffers one scan page until finalize.
    pub async fn upload_scan_page(
        &self,
        id: Uuid,
        upload: ScanUpload,
    ) -> Result<ScanUploadResponse, AppError> {
        let _guard = self.locks.acquire(id).await;
        let session = self.scan_writable(id).await?;

        let limit = self.settings.scan_max_pages;
        let current = self.store.page_count(id).await;
        if current >= limit {
            return Err(AppError::InvalidInput(format!(
                "page limit exceeded (limit {}, current {})",
                limit, current
            )));
        }

        let remaining = session.remaining_ttl(Utc::now());
        if remaining.is_zero() {
            return Err(AppError::Expired("session expired".to_string()));
        }

        let document_index =
            effective_document_index(session.document_mode(), upload.document_index);
        let bytes = upload.data.len();
        self.store
            .add_page(
                id,
                ScanPageData {
                    document_index,
                    page_index: upload.page_index,
                    data: upload.data,
                    content_type: upload.content_type,
                },
                remaining,
            )
            .await;

        tracing::info!(
            session_id = %id,
            document_index,
            page_index = upload.page_index,
            bytes,
            "scan_upload: page accepted"
        );
        Ok(ScanUploadResponse {
            status: "page accepted".to_string(),
            document_index,
            page_index: upload.page_index,
        })
    }

    /// Assembles the buffered pages and completes the scan session.
    pub async fn finalize_scan(&self, id: Uuid) -> Result<ScanFinalizeResponse, AppError> {
        let _guard = self.locks.acquire(id).await;
        let session = self.scan_writable(id).await?;

        let pages = self.store.get_pages(id).await;
        if pages.is_empty() {
            return Err(AppError::InvalidInput("no pages uploaded".to_string()));
        }

        let codec = self.codec.clone();
        let mode = session.document_mode();
        let output = session.scan_output_format();
        let documents =
            tokio::task::spawn_blocking(move || assemble(codec.as_ref(), &pages, mode, output))
                .await
                .map_err(|e| AppError::Internal(format!("assembly task failed: {}", e)))??;

        let mut scan_result = ScanResult {
            documents: Vec::with_capacity(documents.len()),
        };
        for document in documents {
            let entry = match document {
                AssembledDocument::Combined(pdf) => {
                    let download_id = self.store_artifact(&pdf, session.result_ttl).await;
                    ScanDocument::combined(download_url(download_id))
                }
                AssembledDocument::Discrete(pages) => {
                    let mut stored = Vec::with_capacity(pages.len());
                    for page in pages {
                        let download_id = self.store_artifact(&page, session.result_ttl).await;
                        stored.push(ScanPage {
                            url: download_url(download_id),
                            content_type: page.content_type,
                        });
                    }
                    ScanDocument::discrete(stored)
                }
            };
            scan_result.documents.push(entry);
        }

        self.store
            .mark_scan_completed(id, scan_result.clone())
            .await?;
        self.hub
            .broadcast(
                id,
                &HubMessage::completed(id, CompletionPayload::Scan(scan_result.clone())),
            )
            .await;
        self.store.clear_pages(id).await;

        tracing::info!(
            session_id = %id,
            documents = scan_result.documents.len(),
            "scan_finalize: session completed"
        );
        Ok(ScanFinalizeResponse {
            status: "completed".to_string(),
            scan_result,
        })
    }

    /// Result endpoint body; `status` tells completed apart from in progress.
    pub async fn poll_result(&self, id: Uuid) -> Result<PollResponse, AppError> {
        let session = self.live(id).await?;
        if session.status == SessionStatus::Completed {
            return Ok(PollResponse::completed(&session));
        }
        Ok(PollResponse::in_progress(session.status))
    }

    pub async fn download(&self, download_id: Uuid) -> Result<StoredFile, AppError> {
        self.store.get_file(download_id).await.ok_or_else(|| {
            tracing::debug!(download_id = %download_id, "download: file not found or expired");
            AppError::NotFound("download not found or expired".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventSink;
    use async_trait::async_trait;
    use base64::Engine;
    use handoff_core::HubMessageType;
    use handoff_processing::{CodecError, PageSource};
    use std::sync::Mutex as StdMutex;

    /// Emits a fake PDF naming the pages it was given.
    struct FakeCodec;

    impl DocumentCodec for FakeCodec {
        fn images_to_pdf(&self, pages: &[PageSource<'_>]) -> Result<Vec<u8>, CodecError> {
            if pages.iter().any(|p| p.data == b"corrupt") {
                return Err(CodecError::Decode("corrupt page".to_string()));
            }
            let mut out = b"%PDF".to_vec();
            for page in pages {
                out.push(b'|');
                out.extend_from_slice(page.data);
            }
            Ok(out)
        }

        fn svg_to_pdf(&self, _svg: &[u8]) -> Result<Vec<u8>, CodecError> {
            Ok(b"%PDF|svg".to_vec())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        messages: StdMutex<Vec<HubMessage>>,
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn send(&self, message: &HubMessage) -> anyhow::Result<()> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn close(&self) {}
    }

    impl CollectingSink {
        fn kinds(&self) -> Vec<(HubMessageType, SessionStatus)> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|m| (m.kind, m.status))
                .collect()
        }
    }

    fn service() -> SessionService {
        service_with_limit(3)
    }

    fn service_with_limit(scan_max_pages: usize) -> SessionService {
        SessionService::new(
            Arc::new(SessionStore::default()),
            Arc::new(Hub::default()),
            Arc::new(FakeCodec),
            SessionSettings {
                base_url: "http://phone.test".to_string(),
                session_ttl: Duration::from_secs(60),
                result_ttl: Duration::from_secs(60),
                scan_max_pages,
            },
        )
    }

    fn request(action: &str, output: Option<&str>) -> CreateSessionRequest {
        CreateSessionRequest {
            action_type: action.to_string(),
            output_format: output.map(String::from),
            ..Default::default()
        }
    }

    fn item(content_type: &str, filename: &str, data: &[u8]) -> SubmitResultItem {
        SubmitResultItem {
            content_type: content_type.to_string(),
            filename: filename.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    fn page(document_index: u32, page_index: u32, tag: &'static str) -> ScanUpload {
        ScanUpload {
            document_index,
            page_index,
            data: Bytes::from_static(tag.as_bytes()),
            content_type: "image/jpeg".to_string(),
        }
    }

    async fn watch(svc: &SessionService, id: Uuid) -> Arc<CollectingSink> {
        let sink = Arc::new(CollectingSink::default());
        svc.hub().subscribe(id, sink.clone()).await;
        sink
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_action() {
        let err = service().create(request("video", None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_requires_output_format_for_photo() {
        let err = service().create(request("photo", None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_entry_visit_opens_once() {
        let svc = service();
        let mut req = request("photo", Some("jpg"));
        req.intro_text = Some("Take a picture of your ID".to_string());
        let session = svc.create(req).await.unwrap();
        let sink = watch(&svc, session.id).await;

        let first = svc.visit_entry(session.id).await.unwrap();
        let second = svc.visit_entry(session.id).await.unwrap();

        assert!(matches!(first, PageView::Intro { .. }));
        assert!(matches!(second, PageView::Intro { .. }));
        assert_eq!(
            sink.kinds(),
            vec![(HubMessageType::StatusUpdate, SessionStatus::Opened)]
        );
    }

    #[tokio::test]
    async fn test_entry_without_intro_goes_straight_to_action() {
        let svc = service();
        let session = svc.create(request("signature", Some("svg"))).await.unwrap();
        let sink = watch(&svc, session.id).await;

        let view = svc.visit_entry(session.id).await.unwrap();

        assert!(matches!(view, PageView::Action(_)));
        assert_eq!(
            sink.kinds(),
            vec![
                (HubMessageType::StatusUpdate, SessionStatus::Opened),
                (HubMessageType::StatusUpdate, SessionStatus::ActionStarted),
            ]
        );
        let lookup = svc.lookup(session.id).await;
        assert_eq!(lookup.status(), Some(SessionStatus::ActionStarted));
    }

    #[tokio::test]
    async fn test_submit_before_open_is_conflict_and_changes_nothing() {
        let svc = service();
        let session = svc.create(request("photo", Some("png"))).await.unwrap();

        let err = svc
            .submit_result(session.id, vec![item("image/png", "a.png", b"png")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        let after = svc.lookup(session.id).await.live().unwrap();
        assert_eq!(after.status, SessionStatus::Pending);
        assert!(after.result.is_empty());
    }

    #[tokio::test]
    async fn test_submit_completes_and_broadcasts() {
        let svc = service();
        let session = svc.create(request("signature", Some("pdf"))).await.unwrap();
        svc.visit_action(session.id).await.unwrap();
        let sink = watch(&svc, session.id).await;

        let items = svc
            .submit_result(
                session.id,
                vec![item("image/svg+xml", "signature.svg", b"<svg/>")],
            )
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content_type, "application/pdf");
        assert_eq!(items[0].filename, "signature.pdf");

        let file = svc.download(items[0].download_id).await.unwrap();
        assert_eq!(file.data.as_ref(), b"%PDF|svg");

        let poll = svc.poll_result(session.id).await.unwrap();
        assert_eq!(poll.status, SessionStatus::Completed);
        assert_eq!(poll.items.unwrap(), items);
        assert_eq!(
            sink.kinds(),
            vec![(HubMessageType::Completed, SessionStatus::Completed)]
        );

        let again = svc
            .submit_result(session.id, vec![item("image/png", "b.png", b"x")])
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bad_base64_leaves_session_open() {
        let svc = service();
        let session = svc.create(request("photo", Some("jpg"))).await.unwrap();
        svc.visit_action(session.id).await.unwrap();

        let bad = SubmitResultItem {
            content_type: "image/jpeg".to_string(),
            filename: "a.jpg".to_string(),
            data: "***".to_string(),
        };
        let err = svc.submit_result(session.id, vec![bad]).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        let poll = svc.poll_result(session.id).await.unwrap();
        assert_eq!(poll.status, SessionStatus::ActionStarted);
    }

    async fn open_scan(svc: &SessionService, mode: &str, output: &str) -> Uuid {
        let mut req = request("scan", Some(output));
        req.document_mode = Some(mode.to_string());
        let session = svc.create(req).await.unwrap();
        svc.visit_action(session.id).await.unwrap();
        session.id
    }

    #[tokio::test]
    async fn test_scan_finalize_orders_documents_and_pages() {
        let svc = service_with_limit(10);
        let id = open_scan(&svc, "multi", "pdf").await;
        for p in [page(1, 2, "d1p2"), page(0, 1, "d0p1"), page(1, 1, "d1p1"), page(0, 0, "d0p0")] {
            svc.upload_scan_page(id, p).await.unwrap();
        }

        let response = svc.finalize_scan(id).await.unwrap();
        let docs = &response.scan_result.documents;
        assert_eq!(docs.len(), 2);

        let mut bodies = Vec::new();
        for doc in docs {
            let url = doc.pdf_url.as_deref().unwrap();
            let download_id: Uuid = url.rsplit('/').next().unwrap().parse().unwrap();
            bodies.push(svc.download(download_id).await.unwrap().data);
        }
        assert_eq!(bodies[0].as_ref(), b"%PDF|d0p0|d0p1");
        assert_eq!(bodies[1].as_ref(), b"%PDF|d1p1|d1p2");

        assert_eq!(svc.store.page_count(id).await, 0);
        let again = svc.finalize_scan(id).await.unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_finalize_without_pages_fails() {
        let svc = service();
        let id = open_scan(&svc, "single", "images").await;
        let err = svc.finalize_scan(id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("no pages")));
    }

    #[tokio::test]
    async fn test_single_mode_forces_document_zero() {
        let svc = service();
        let id = open_scan(&svc, "single", "images").await;
        let ack = svc.upload_scan_page(id, page(4, 1, "p")).await.unwrap();
        assert_eq!(ack.document_index, 0);
        assert_eq!(ack.page_index, 1);
    }

    #[tokio::test]
    async fn test_page_limit_is_enforced() {
        let svc = service();
        let id = open_scan(&svc, "multi", "images").await;
        for n in 0..3 {
            svc.upload_scan_page(id, page(0, n, "p")).await.unwrap();
        }
        let err = svc.upload_scan_page(id, page(0, 3, "p")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("limit 3")));
    }

    #[tokio::test]
    async fn test_codec_failure_keeps_pages_and_status() {
        let svc = service();
        let id = open_scan(&svc, "single", "pdf").await;
        svc.upload_scan_page(id, page(0, 0, "corrupt")).await.unwrap();

        let err = svc.finalize_scan(id).await.unwrap_err();
        assert!(matches!(err, AppError::Codec(_)));

        let poll = svc.poll_result(id).await.unwrap();
        assert_eq!(poll.status, SessionStatus::ActionStarted);
        assert_eq!(svc.store.page_count(id).await, 1);
    }

    #[tokio::test]
    async fn test_scan_upload_on_photo_session_is_invalid() {
        let svc = service();
        let session = svc.create(request("photo", Some("jpg"))).await.unwrap();
        svc.visit_action(session.id).await.unwrap();
        let err = svc
            .upload_scan_page(session.id, page(0, 0, "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let svc = service();
        let err = svc.visit_entry(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = svc.download(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_session_rejects_submission() {
        let svc = service();
        let mut req = request("photo", Some("jpg"));
        req.session_ttl = Some("100ms".to_string());
        let session = svc.create(req).await.unwrap();
        svc.visit_action(session.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let err = svc
            .submit_result(session.id, vec![item("image/jpeg", "a.jpg", b"x")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
        assert!(matches!(
            svc.lookup(session.id).await,
            SessionLookup::Expired(_)
        ));
    }

    /// Status, buffered page count and whether a scan result is recorded.
    async fn scan_state(svc: &SessionService, id: Uuid) -> (Option<SessionStatus>, usize, bool) {
        let lookup = svc.lookup(id).await;
        let status = lookup.status();
        let has_result = lookup.live().is_some_and(|s| s.scan_result.is_some());
        (status, svc.store.page_count(id).await, has_result)
    }

    #[tokio::test]
    async fn test_finalize_before_open_is_conflict_and_changes_nothing() {
        let svc = service();
        let mut req = request("scan", Some("pdf"));
        req.document_mode = Some("single".to_string());
        let session = svc.create(req).await.unwrap();

        let before = scan_state(&svc, session.id).await;
        assert_eq!(before, (Some(SessionStatus::Pending), 0, false));

        let err = svc.finalize_scan(session.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("not yet opened")));
        assert_eq!(scan_state(&svc, session.id).await, before);
    }

    #[tokio::test]
    async fn test_finalize_after_expiry_is_rejected_and_changes_nothing() {
        let svc = service();
        let mut req = request("scan", Some("pdf"));
        req.document_mode = Some("single".to_string());
        req.session_ttl = Some("100ms".to_string());
        let session = svc.create(req).await.unwrap();
        svc.visit_action(session.id).await.unwrap();
        svc.upload_scan_page(session.id, page(0, 0, "p0"))
            .await
            .unwrap();
        assert_eq!(
            scan_state(&svc, session.id).await,
            (Some(SessionStatus::ActionStarted), 1, false)
        );

        tokio::time::sleep(Duration::from_millis(150)).await;

        let before = scan_state(&svc, session.id).await;
        assert_eq!(before, (Some(SessionStatus::Expired), 0, false));

        let err = svc.finalize_scan(session.id).await.unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
        assert_eq!(scan_state(&svc, session.id).await, before);
    }

    #[tokio::test]
    async fn test_delete_removes_session_entirely() {
        let svc = service();
        let session = svc.create(request("scan", None)).await.unwrap();
        svc.delete(session.id).await.unwrap();
        assert!(matches!(svc.lookup(session.id).await, SessionLookup::Absent));
        assert!(matches!(
            svc.delete(session.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
