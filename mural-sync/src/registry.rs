//! The set of live sessions and best-effort fan-out to them.
//!
//! Each session is one connected client: an opaque identity plus the
//! bounded queue its writer task drains. The registry never talks to a
//! socket itself — `broadcast` only enqueues, so callers may hold the
//! relay's state lock across it without blocking on peer I/O.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Opaque per-connection identity.
pub type SessionId = Uuid;

/// Live sessions keyed by identity.
///
/// Failure policy: a send that cannot be enqueued (queue full or writer
/// gone) is logged and skipped — it neither aborts delivery to the
/// remaining sessions nor removes the session. Detecting a dead session is
/// the read loop's job, which calls [`SessionRegistry::leave`] on its way
/// out.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, mpsc::Sender<Message>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Register a session for broadcast delivery, effective immediately.
    ///
    /// The caller is responsible for enqueueing the canvas snapshot to the
    /// session's queue first, so the snapshot precedes every broadcast the
    /// session will observe.
    pub fn join(&mut self, id: SessionId, tx: mpsc::Sender<Message>) {
        self.sessions.insert(id, tx);
    }

    /// Deregister a session. Idempotent: removing an absent session is a
    /// no-op. Returns whether the session was present.
    pub fn leave(&mut self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Enqueue `message` to every session except `exclude`. Returns the
    /// number of sessions it was enqueued to.
    pub fn broadcast(&self, exclude: &SessionId, message: &Message) -> usize {
        let mut delivered = 0;
        for (id, tx) in &self.sessions {
            if id == exclude {
                continue;
            }
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("session {id}: outbound queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::warn!("session {id}: outbound queue closed, dropping message");
                }
            }
        }
        delivered
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
