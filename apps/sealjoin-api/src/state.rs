//! Shared application state and per-session locking

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use sealjoin_core::{
    CancelFlag, ObjectStore, PlacementSuggester, SealCatalog, SealJoinError, Workflow,
    WorkflowSession,
};
use tokio::sync::{Mutex, RwLock};

use crate::error::ApiError;

/// Idle time after which a session is dropped unless configured otherwise
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// One live workflow session
struct SessionSlot {
    session: Arc<Mutex<WorkflowSession>>,
    cancel: CancelFlag,
    last_used: StdMutex<Instant>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(WorkflowSession::new())),
            cancel: CancelFlag::new(),
            last_used: StdMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Idle past `ttl` with no request holding the session
    fn is_expired(&self, ttl: Duration) -> bool {
        let last_used = *self.last_used.lock().unwrap_or_else(PoisonError::into_inner);
        last_used.elapsed() > ttl && self.session.try_lock().is_ok()
    }
}

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub catalog: Arc<dyn SealCatalog>,
    pub suggester: Arc<dyn PlacementSuggester>,
    /// Largest decoded upload accepted
    pub max_upload_bytes: usize,
    session_ttl: Duration,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn SealCatalog>,
        suggester: Arc<dyn PlacementSuggester>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            suggester,
            max_upload_bytes,
            session_ttl: DEFAULT_SESSION_TTL,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn create_session(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(SessionSlot::new()));
        id
    }

    /// Drop a session, cancelling any merge or stamp still running for it
    pub async fn close_session(&self, id: &str) -> Result<(), ApiError> {
        let slot = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))?;
        slot.cancel.cancel();
        tracing::debug!(session = id, "session closed");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every idle session past its TTL, cancelling its work
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let expired = slot.is_expired(self.session_ttl);
            if expired {
                slot.cancel.cancel();
                tracing::info!(session = %id, "session expired");
            }
            !expired
        });
        before - sessions.len()
    }

    async fn slot(&self, id: &str) -> Result<Arc<SessionSlot>, ApiError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))?;

        if slot.is_expired(self.session_ttl) {
            if let Some(slot) = self.sessions.write().await.remove(id) {
                slot.cancel.cancel();
            }
            tracing::info!(session = id, "session expired");
            return Err(ApiError::SessionExpired(id.to_string()));
        }
        slot.touch();
        Ok(slot)
    }
}

/// Run `op` against one session on the blocking pool.
///
/// Calls for the same session are serialized by the session mutex; calls
/// for different sessions run concurrently.
pub async fn with_session<T, F>(state: &Arc<AppState>, id: &str, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Workflow<'_>, &mut WorkflowSession) -> Result<T, SealJoinError> + Send + 'static,
{
    let slot = state.slot(id).await?;
    let mut session = Arc::clone(&slot.session).lock_owned().await;
    let state = Arc::clone(state);
    let used = Arc::clone(&slot);

    let result = tokio::task::spawn_blocking(move || {
        let workflow = Workflow::new(&*state.store, &*state.catalog)
            .with_suggester(&*state.suggester)
            .with_cancel(&slot.cancel);
        op(&workflow, &mut *session)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Session task failed: {}", e)))?;

    used.touch();
    Ok(result?)
}
