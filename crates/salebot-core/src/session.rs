//! In-memory session store with per-user exclusion.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{conversation::UserSession, domain::UserId};

/// Exclusive handle on one user's session. Events for that user wait until it drops.
pub type SessionGuard = OwnedMutexGuard<UserSession>;

/// One session per user, created lazily in `Idle`.
///
/// The outer map lock is held only for lookups, so users never block each other.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Arc<Mutex<UserSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, user_id: UserId) -> Arc<Mutex<UserSession>> {
        let mut map = self.inner.lock().await;
        map.entry(user_id)
            .or_insert_with(|| {
                tracing::debug!(user_id = user_id.0, "new session");
                Arc::new(Mutex::new(UserSession::new(user_id)))
            })
            .clone()
    }

    pub async fn get_or_create(&self, user_id: UserId) -> SessionGuard {
        self.slot(user_id).await.lock_owned().await
    }

    pub async fn put(&self, user_id: UserId, session: UserSession) {
        let mut guard = self.get_or_create(user_id).await;
        *guard = session;
    }

    /// Clone of the current session, waiting for any in-flight event to finish.
    pub async fn snapshot(&self, user_id: UserId) -> Option<UserSession> {
        let slot = self.inner.lock().await.get(&user_id).cloned()?;
        let guard = slot.lock().await;
        Some(guard.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
