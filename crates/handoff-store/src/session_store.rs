//! In-memory session repository with tombstones, artifacts and scan buffers.
//!
//! Every session is written as two independently expiring records: the live
//! session under its own TTL and a minimal tombstone under the longer grace
//! window. A lookup that misses the live record but hits the tombstone is an
//! expired session; a lookup that misses both never existed (or is past
//! the grace window).

use std::time::Duration;

use chrono::Utc;
use handoff_core::{ResultItem, ScanPageData, ScanResult, Session, SessionStatus, StoredFile, Tombstone};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::ttl_cache::TtlCache;

/// How long a tombstone outlives session creation by default.
pub const DEFAULT_TOMBSTONE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a session lookup. Not an error in any of its variants.
#[derive(Debug, Clone)]
pub enum SessionLookup {
    Live(Session),
    Expired(Tombstone),
    Absent,
}

impl SessionLookup {
    pub fn live(self) -> Option<Session> {
        match self {
            SessionLookup::Live(session) => Some(session),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<SessionStatus> {
        match self {
            SessionLookup::Live(session) => Some(session.status),
            SessionLookup::Expired(tombstone) => Some(tombstone.status),
            SessionLookup::Absent => None,
        }
    }
}

/// Counts of entries reclaimed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sessions: usize,
    pub tombstones: usize,
    pub files: usize,
    pub scan_buffers: usize,
}

impl SweepStats {
    pub fn total(&self) -> usize {
        self.sessions + self.tombstones + self.files + self.scan_buffers
    }
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: TtlCache<Uuid, Session>,
    tombstones: TtlCache<Uuid, Tombstone>,
    files: TtlCache<Uuid, StoredFile>,
    scan_pages: TtlCache<Uuid, Vec<ScanPageData>>,
    tombstone_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOMBSTONE_TTL)
    }
}

impl SessionStore {
    pub fn new(tombstone_ttl: Duration) -> Self {
        Self {
            sessions: TtlCache::new(),
            tombstones: TtlCache::new(),
            files: TtlCache::new(),
            scan_pages: TtlCache::new(),
            tombstone_ttl,
        }
    }

    /// Inserts the live session and its tombstone.
    ///
    /// The live record is written first so a concurrent lookup never sees a
    /// tombstone without the session it stands for.
    pub async fn create(&self, session: Session) -> StoreResult<()> {
        let id = session.id;
        let ttl = session.session_ttl;

        tracing::debug!(session_id = %id, ttl = ?ttl, "store: creating session");

        if !self.sessions.insert_new(id, session, ttl).await {
            return Err(StoreError::AlreadyExists(id));
        }
        self.tombstones
            .insert(id, Tombstone::for_session(id), self.tombstone_lifetime(ttl))
            .await;
        Ok(())
    }

    /// Tombstones normally live `tombstone_ttl` from creation; a session that
    /// would outlive that still gets a full grace window after it expires.
    fn tombstone_lifetime(&self, session_ttl: Duration) -> Duration {
        if session_ttl < self.tombstone_ttl {
            self.tombstone_ttl
        } else {
            session_ttl.saturating_add(self.tombstone_ttl)
        }
    }

    pub async fn get(&self, id: Uuid) -> SessionLookup {
        if let Some(session) = self.sessions.get(&id).await {
            tracing::debug!(session_id = %id, status = %session.status, "store: session found");
            return SessionLookup::Live(session);
        }
        if let Some(tombstone) = self.tombstones.get(&id).await {
            tracing::debug!(session_id = %id, "store: tombstone found, session expired");
            return SessionLookup::Expired(tombstone);
        }
        tracing::debug!(session_id = %id, "store: session not found");
        SessionLookup::Absent
    }

    /// Re-inserts `session` with whatever is left of its original lifetime.
    ///
    /// Returns false, writing nothing, once that lifetime has elapsed.
    pub async fn update(&self, session: Session) -> bool {
        let remaining = session.remaining_ttl(Utc::now());
        if remaining.is_zero() {
            tracing::debug!(session_id = %session.id, "store: update skipped, session already expired");
            return false;
        }
        tracing::debug!(session_id = %session.id, remaining_ttl = ?remaining, "store: updating session");
        self.sessions.insert(session.id, session, remaining).await;
        true
    }

    /// Removes both the live record and the tombstone.
    pub async fn delete(&self, id: Uuid) {
        tracing::debug!(session_id = %id, "store: deleting session");
        self.sessions.remove(&id).await;
        self.tombstones.remove(&id).await;
    }

    async fn mutate(&self, id: Uuid, f: impl FnOnce(&mut Session)) -> StoreResult<Session> {
        let mut session = match self.get(id).await {
            SessionLookup::Live(session) => session,
            SessionLookup::Expired(_) => return Err(StoreError::Expired(id)),
            SessionLookup::Absent => return Err(StoreError::NotFound(id)),
        };
        f(&mut session);
        if !self.update(session.clone()).await {
            return Err(StoreError::Expired(id));
        }
        Ok(session)
    }

    pub async fn mark_opened(&self, id: Uuid) -> StoreResult<Session> {
        tracing::debug!(session_id = %id, "store: marking session opened");
        self.mutate(id, |session| {
            session.opened = true;
            if session.status.can_advance_to(SessionStatus::Opened) {
                session.status = SessionStatus::Opened;
            }
        })
        .await
    }

    pub async fn mark_action_started(&self, id: Uuid) -> StoreResult<Session> {
        tracing::debug!(session_id = %id, "store: marking action started");
        self.mutate(id, |session| {
            if session.status.can_advance_to(SessionStatus::ActionStarted) {
                session.status = SessionStatus::ActionStarted;
            }
        })
        .await
    }

    pub async fn mark_completed(&self, id: Uuid, result: Vec<ResultItem>) -> StoreResult<Session> {
        tracing::debug!(session_id = %id, result_items = result.len(), "store: marking session completed");
        self.mutate(id, |session| {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(Utc::now());
            session.result = result;
        })
        .await
    }

    pub async fn mark_scan_completed(
        &self,
        id: Uuid,
        scan_result: ScanResult,
    ) -> StoreResult<Session> {
        tracing::debug!(
            session_id = %id,
            documents = scan_result.documents.len(),
            "store: marking scan session completed"
        );
        self.mutate(id, |session| {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(Utc::now());
            session.scan_result = Some(scan_result);
        })
        .await
    }

    pub async fn store_file(&self, download_id: Uuid, file: StoredFile, ttl: Duration) {
        tracing::debug!(
            download_id = %download_id,
            ttl = ?ttl,
            bytes = file.data.len(),
            content_type = %file.content_type,
            "store: storing file"
        );
        self.files.insert(download_id, file, ttl).await;
    }

    pub async fn get_file(&self, download_id: Uuid) -> Option<StoredFile> {
        let file = self.files.get(&download_id).await;
        match &file {
            Some(f) => {
                tracing::debug!(download_id = %download_id, bytes = f.data.len(), "store: file retrieved")
            }
            None => tracing::debug!(download_id = %download_id, "store: file not found or expired"),
        }
        file
    }

    /// Appends a page to the session's buffer and refreshes the buffer TTL.
    /// Returns the number of buffered pages after the append.
    pub async fn add_page(&self, session_id: Uuid, page: ScanPageData, ttl: Duration) -> usize {
        let document_index = page.document_index;
        let page_index = page.page_index;
        let total = self
            .scan_pages
            .upsert(session_id, ttl, Vec::new, |pages| {
                pages.push(page);
                pages.len()
            })
            .await;
        tracing::debug!(
            session_id = %session_id,
            document_index,
            page_index,
            total_pages = total,
            "store: scan page added"
        );
        total
    }

    /// Buffered pages in arrival order.
    pub async fn get_pages(&self, session_id: Uuid) -> Vec<ScanPageData> {
        self.scan_pages.get(&session_id).await.unwrap_or_default()
    }

    pub async fn page_count(&self, session_id: Uuid) -> usize {
        self.scan_pages
            .read_with(&session_id, Vec::len)
            .await
            .unwrap_or(0)
    }

    pub async fn clear_pages(&self, session_id: Uuid) {
        self.scan_pages.remove(&session_id).await;
        tracing::debug!(session_id = %session_id, "store: scan pages cleared");
    }

    /// Reclaims every expired entry across all record kinds.
    pub async fn purge_expired(&self) -> SweepStats {
        SweepStats {
            sessions: self.sessions.purge_expired().await,
            tombstones: self.tombstones.purge_expired().await,
            files: self.files.purge_expired().await,
            scan_buffers: self.scan_pages.purge_expired().await,
        }
    }
}
