//! In-memory session store.
//!
//! One [`ChatSession`] per browser session, each behind its own async mutex
//! so a session has at most one adapter call outstanding while other
//! sessions proceed independently. Sessions idle for longer than the
//! configured timeout are evicted, both on insert and by the server's
//! periodic sweep.

use std::sync::Arc;
use std::time::Duration;

use askdesk_core::config::ChatConfig;
use askdesk_core::session::ChatSession;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::middleware::session::SessionId;

/// Handle to one session's controller.
pub type SharedSession = Arc<Mutex<ChatSession>>;

struct Slot {
    session: SharedSession,
    last_seen: Instant,
}

/// Sessions keyed by cookie id. Nothing is persisted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, Slot>>,
    chat: ChatConfig,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(chat: ChatConfig, idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            chat,
            idle_timeout,
        }
    }

    /// The existing session for `id`, if any. Refreshes its idle clock.
    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        let mut slot = self.sessions.get_mut(&id.0)?;
        slot.last_seen = Instant::now();
        Some(slot.session.clone())
    }

    /// The session for `id`, created on first use.
    pub fn get_or_create(&self, id: SessionId) -> SharedSession {
        if let Some(session) = self.get(id) {
            return session;
        }
        self.evict_idle();
        self.sessions
            .entry(id.0)
            .or_insert_with(|| Slot {
                session: Arc::new(Mutex::new(ChatSession::new(&self.chat))),
                last_seen: Instant::now(),
            })
            .session
            .clone()
    }

    /// Drops sessions idle for longer than the timeout. A session a handler
    /// still holds is kept regardless of age. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions.retain(|_, slot| {
            Arc::strong_count(&slot.session) > 1
                || now.duration_since(slot.last_seen) < self.idle_timeout
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
