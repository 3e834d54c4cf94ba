//! Server-side sessions keyed by an opaque cookie value.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::models::auth::SessionData;
use crate::store::StoreError;
use crate::ttl::{TtlMap, spawn_sweeper};

/// Session lifetime: 7 days.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Generate an unguessable session id (32 random bytes, URL-safe).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Backend for browser sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `data` under a new session id and return the id.
    async fn create(&self, data: SessionData) -> Result<String, StoreError>;

    /// Load a live session. Unknown and expired ids yield `None`.
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Remove a session. Unknown ids are ignored.
    async fn destroy(&self, session_id: &str) -> Result<(), StoreError>;
}

/// In-memory session store with a fixed TTL.
pub struct MemorySessionStore {
    sessions: TtlMap<SessionData>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: TtlMap::new(ttl),
        }
    }

    /// Evict expired entries.
    pub fn cleanup(&self) -> usize {
        self.sessions.cleanup()
    }

    /// Spawn a periodic cleanup task that stops when `shutdown` is cancelled.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        spawn_sweeper("sessions", shutdown, move || store.cleanup())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, data: SessionData) -> Result<String, StoreError> {
        let session_id = generate_session_id();
        self.sessions.insert(session_id.clone(), data);
        Ok(session_id)
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        Ok(self.sessions.get(session_id))
    }

    async fn destroy(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
