//! In-flight authentication sessions
//!
//! Each interactive login registers its presentation context under a fresh
//! [`SessionId`]. The registry only holds a [`Weak`] reference: the host owns
//! the context, and a login whose context has been dropped fails with a
//! recoverable error instead of keeping the surface alive.
//!
//! Entries are removed by [`SessionGuard`] when it goes out of scope, which
//! covers success, failure, cancellation and the login future being dropped.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use driveport_core::{
    domain::{DriveError, DriveResult, SessionId},
    ports::IPresentationContext,
};
use tracing::debug;

/// Registry of presentation contexts for logins in progress
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Weak<dyn IPresentationContext>>,
}

impl SessionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `context` under a new session id
    ///
    /// The returned guard removes the entry when dropped.
    pub fn register(
        self: &Arc<Self>,
        context: &Arc<dyn IPresentationContext>,
    ) -> SessionGuard {
        let id = SessionId::new();
        self.sessions.insert(id, Arc::downgrade(context));
        debug!(session_id = %id, "Registered authentication session");
        SessionGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Resolves the context of a session
    ///
    /// # Errors
    /// [`DriveError::General`] if the session is unknown or its context has
    /// been released.
    pub fn lookup(&self, id: SessionId) -> DriveResult<Arc<dyn IPresentationContext>> {
        let weak = self
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DriveError::general(format!("unknown authentication session {id}")))?;

        weak.upgrade().ok_or_else(|| {
            DriveError::general(format!(
                "presentation context for session {id} was released"
            ))
        })
    }

    /// Returns true while `id` is registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of sessions in flight
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true when no session is in flight
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn remove(&self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            debug!(session_id = %id, "Removed authentication session");
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

/// Keeps a session registered for as long as it lives
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    /// The session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Resolves this session's presentation context
    pub fn context(&self) -> DriveResult<Arc<dyn IPresentationContext>> {
        self.registry.lookup(self.id)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
