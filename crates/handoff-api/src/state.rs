//! Application state shared by every handler.

use std::sync::Arc;

use handoff_core::Config;
use handoff_processing::{DocumentCodec, PdfCodec};
use handoff_store::SessionStore;

use crate::hub::Hub;
use crate::services::session_lifecycle::SessionSettings;
use crate::services::SessionService;

pub struct AppState {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub hub: Arc<Hub>,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_codec(config, Arc::new(PdfCodec::new()))
    }

    /// State with its own store and hub, rendering through `codec`.
    pub fn with_codec(config: Config, codec: Arc<dyn DocumentCodec>) -> Self {
        let store = Arc::new(SessionStore::new(config.tombstone_ttl));
        let hub = Arc::new(Hub::new(config.hub_write_timeout));
        let sessions = SessionService::new(
            store.clone(),
            hub.clone(),
            codec,
            SessionSettings::from_config(&config),
        );
        Self {
            config,
            store,
            hub,
            sessions,
        }
    }
}
