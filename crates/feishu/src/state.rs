use std::sync::{
    Arc, Mutex, RwLock,
    atomic::{AtomicU64, Ordering},
};

use {serde::Serialize, tracing::warn};

use crate::{dedup::DedupCache, history::HistoryStore, transport::FeishuConnection};

/// Where the connection controller currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPhase {
    #[default]
    Idle,
    Probing,
    Connecting,
    Running,
    Stopped,
    Failed,
}

impl GatewayPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

struct ActiveConnection {
    session_id: u64,
    handle: Arc<dyn FeishuConnection>,
}

/// Runtime state shared by the controller and the dispatch handlers.
///
/// All locks are `std::sync` and are only held for map/field updates, never
/// across `.await` points.
#[derive(Default)]
pub struct GatewayState {
    bot_open_id: RwLock<Option<String>>,
    connection: RwLock<Option<ActiveConnection>>,
    phase: RwLock<GatewayPhase>,
    history: HistoryStore,
    dedup: Mutex<DedupCache>,
    next_session: AtomicU64,
}

impl GatewayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bot_open_id(&self) -> Option<String> {
        self.bot_open_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn set_bot_open_id(&self, bot_open_id: Option<String>) {
        *self.bot_open_id.write().unwrap_or_else(|e| e.into_inner()) = bot_open_id;
    }

    pub fn phase(&self) -> GatewayPhase {
        *self.phase.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_phase(&self, phase: GatewayPhase) {
        *self.phase.write().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Shared handle to the conversation history.
    pub fn history(&self) -> HistoryStore {
        self.history.clone()
    }

    pub fn has_connection(&self) -> bool {
        self.connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn connection(&self) -> Option<Arc<dyn FeishuConnection>> {
        self.connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|active| Arc::clone(&active.handle))
    }

    /// Make `handle` the active connection and return its session id.
    pub(crate) fn install_connection(&self, handle: Arc<dyn FeishuConnection>) -> u64 {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slot = self.connection.write().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.as_ref() {
            warn!(
                previous_session = previous.session_id,
                session_id, "replacing active feishu connection"
            );
        }
        *slot = Some(ActiveConnection { session_id, handle });
        session_id
    }

    /// Drop the active connection if it still belongs to `session_id`.
    pub(crate) fn clear_connection(&self, session_id: u64) -> bool {
        let mut slot = self.connection.write().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|a| a.session_id == session_id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Record a message ID. Returns `false` if it was already processed.
    pub fn record_message(&self, message_id: &str) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(message_id)
    }

    pub fn is_processed(&self, message_id: &str) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seen(message_id)
    }

    pub fn processed_count(&self) -> usize {
        self.dedup.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Clear connection handle, identity, history and dedup cache.
    ///
    /// The phase is left alone: it belongs to the controller, which keeps
    /// waiting on its cancellation token.
    pub(crate) fn reset(&self) {
        *self.connection.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_bot_open_id(None);
        self.history.clear();
        self.dedup.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
