//! In-memory session registry for the live server.
//!
//! Every session sits behind its own lock, so work on one session never
//! blocks another. The registry lock is only held to look sessions up.
//!
//! Session ids are `session-<epoch>-<n>`, where `epoch` is the store's
//! creation time in milliseconds. Slice URLs embed the id and are cached by
//! browsers, so an id must never name a different volume after a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tracing::info;

use crate::session::Session;

/// A session shared between request handlers.
pub type SharedSession = Arc<RwLock<Session>>;

/// Last epoch handed to a store in this process.
static LAST_EPOCH: AtomicU64 = AtomicU64::new(0);

/// Current time in milliseconds, strictly greater than any earlier epoch.
fn next_epoch() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut last = LAST_EPOCH.load(Ordering::Relaxed);
    loop {
        let epoch = now.max(last + 1);
        match LAST_EPOCH.compare_exchange_weak(last, epoch, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return epoch,
            Err(current) => last = current,
        }
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
    epoch: u64,
    next_id: AtomicU64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            epoch: next_epoch(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Store `session` under a fresh id and return the id.
    pub async fn insert(&self, session: Session) -> String {
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("session-{}-{}", self.epoch, sequence);
        let slices = session.volume().slice_count();

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(RwLock::new(session)));
        info!(session = %id, slices, "Created session");
        id
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session = %id, "Deleted session");
        }
        removed
    }

    /// Ids of all sessions, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
