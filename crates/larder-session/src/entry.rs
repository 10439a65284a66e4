//! Cache entries and the guard handed to request handlers.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tokio::time::Instant;

use crate::persistence::Persist;

/// One logged-in user's session.
///
/// `data` is `None` while the session is unloaded: the token is still valid
/// but the data only lives in storage until the next access.
pub(crate) struct SessionEntry<P: Persist> {
    pub(crate) token: String,
    pub(crate) user: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) persist: P,
    pub(crate) data: Arc<Mutex<Option<P::Value>>>,
    last_access: parking_lot::Mutex<Instant>,
    /// Set (under the map lock) once the entry left the map for good.
    removed: AtomicBool,
}

impl<P: Persist> SessionEntry<P> {
    pub(crate) fn new(token: String, user: &str, persist: P, data: P::Value) -> Self {
        Self {
            token,
            user: user.to_string(),
            created_at: Utc::now(),
            persist,
            data: Arc::new(Mutex::new(Some(data))),
            last_access: parking_lot::Mutex::new(Instant::now()),
            removed: AtomicBool::new(false),
        }
    }

    /// Mark the entry as used now.
    pub(crate) fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    /// Time since the last use.
    pub(crate) fn idle(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Save the data if loaded. Unloaded data is already in storage.
    pub(crate) fn save(&self, data: &Option<P::Value>) -> crate::Result<()> {
        match data {
            Some(value) => self.persist.save(value),
            None => Ok(()),
        }
    }

    /// Whether the data is in memory. Entries currently locked count as loaded.
    pub(crate) fn is_loaded(&self) -> bool {
        self.data.try_lock().map(|data| data.is_some()).unwrap_or(true)
    }
}

/// Exclusive access to one user's data for the duration of a request.
///
/// Holding a `Session` blocks the background sweep and other requests of the
/// same user from touching the data; drop it when the request is done.
pub struct Session<V> {
    user: String,
    data: OwnedMappedMutexGuard<Option<V>, V>,
}

impl<V> Session<V> {
    /// Wrap a locked, loaded entry. Returns the guard back if nothing is loaded.
    pub(crate) fn new(
        user: String,
        guard: OwnedMutexGuard<Option<V>>,
    ) -> Result<Self, OwnedMutexGuard<Option<V>>> {
        let data = OwnedMutexGuard::try_map(guard, |data| data.as_mut())?;
        Ok(Self { user, data })
    }

    /// The user owning this session.
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl<V> Deref for Session<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.data
    }
}

impl<V> DerefMut for Session<V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.data
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Session<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("data", &*self.data)
            .finish()
    }
}
