//! Concurrent session registry
//!
//! One [`SigningSession`] per `(llmq_type, quorum_hash, id, msg_hash)`.
//! Get-or-create is atomic on the key; each session carries its own lock so
//! unrelated sessions never contend.

use super::session::{SessionStatus, SigningSession};
use super::sig_share::SessionKey;
use super::types::Hash;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

pub type SessionHandle = Arc<Mutex<SigningSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session for `key`, or a fresh one created atomically.
    pub fn get_or_create(&self, key: SessionKey, threshold: usize, now: u64) -> SessionHandle {
        let entry = self
            .sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(SigningSession::new(key, threshold, now))));
        Arc::clone(entry.value())
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.get(key).map(|s| Arc::clone(s.value()))
    }

    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    pub fn status(&self, key: &SessionKey) -> Option<SessionStatus> {
        self.get(key).map(|s| s.lock().status())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Expire and drop every session idle for longer than `timeout_secs`.
    pub fn expire_idle(&self, now: u64, timeout_secs: u64) -> Vec<SessionKey> {
        let mut expired = Vec::new();
        self.sessions.retain(|key, session| {
            if session.lock().expire_if_idle(now, timeout_secs) {
                expired.push(*key);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Drop all sessions for the given request, under any quorum.
    pub fn remove_request(&self, id: &Hash, msg_hash: &Hash) -> usize {
        let mut removed = 0;
        self.sessions.retain(|key, _| {
            if &key.id == id && &key.msg_hash == msg_hash {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}
