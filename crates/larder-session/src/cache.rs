//! The session cache: token → lazily loaded user data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::entry::{Session, SessionEntry};
use crate::error::{Error, Result};
use crate::persistence::{Manager, Persist};
use crate::sweep;
use crate::token::generate_token;

pub(crate) type Entry<M> = SessionEntry<<M as Manager>::Persist>;
pub(crate) type SessionMap<M> = HashMap<String, Arc<Entry<M>>>;

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of valid tokens.
    pub sessions: usize,
    /// Sessions whose data is currently in memory.
    pub loaded: usize,
}

/// Public view of one session. Never includes the token.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// User owning the session.
    pub user: String,
    /// When the user logged in.
    pub created_at: DateTime<Utc>,
    /// Time since the last request.
    pub idle: Duration,
    /// Whether the data is in memory.
    pub loaded: bool,
}

pub(crate) struct CacheInner<M: Manager> {
    /// Cleared by [`SessionCache::close`].
    pub(crate) manager: RwLock<Option<Arc<M>>>,
    pub(crate) sessions: Mutex<SessionMap<M>>,
    pub(crate) config: CacheConfig,
    pub(crate) shutdown: CancellationToken,
    pub(crate) sweep_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<M: Manager> Drop for CacheInner<M> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Outcome of expiring one entry.
pub(crate) enum Expiry {
    /// Saved and removed from the map.
    Removed,
    /// Used again (by a new login) while it was being saved; kept.
    Revived,
}

/// Concurrent session cache with two-tier idle eviction.
///
/// Each token maps to one user's data. Data idle for longer than the data
/// lifetime is saved and dropped from memory but the token stays valid;
/// tokens idle for longer than the token lifetime are saved and removed.
/// A user has at most one session: logging in again returns the live token.
///
/// Two lock levels: the map lock guards the token table, a per-entry lock
/// guards that entry's data. An entry lock may be held while taking the map
/// lock, never the other way around.
///
/// Cloning is cheap; clones share the same cache.
pub struct SessionCache<M: Manager> {
    pub(crate) inner: Arc<CacheInner<M>>,
}

impl<M: Manager> Clone for SessionCache<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> std::fmt::Debug for SessionCache<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<M: Manager> SessionCache<M> {
    /// Create a cache over `manager`.
    ///
    /// Starts the background sweep if enabled and a tokio runtime is
    /// running; without a runtime, call [`check_sessions`](Self::check_sessions)
    /// periodically instead.
    pub fn new(manager: M, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let cache = Self {
            inner: Arc::new(CacheInner {
                manager: RwLock::new(Some(Arc::new(manager))),
                sessions: Mutex::new(HashMap::new()),
                config,
                shutdown: CancellationToken::new(),
                sweep_task: parking_lot::Mutex::new(None),
            }),
        };

        if cache.inner.config.enable_sweep_task {
            match Handle::try_current() {
                Ok(handle) => {
                    let task = sweep::spawn(&handle, &cache);
                    *cache.inner.sweep_task.lock() = Some(task);
                }
                Err(_) => warn!("No tokio runtime, session sweep task not started"),
            }
        }

        Ok(cache)
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.manager.read().is_none()
    }

    pub(crate) fn manager(&self) -> Result<Arc<M>> {
        self.inner
            .manager
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::ManagerClosed)
    }

    /// Log in and return a session token.
    ///
    /// If the user already has a session, its token is returned and kept
    /// alive instead of opening a second one. The password is checked either
    /// way.
    pub async fn create_session_token(&self, user: &str, password: &str) -> Result<String> {
        let manager = self.manager()?;
        if !manager.check_password(user, password) {
            warn!(user = %user, "Login failed");
            return Err(Error::WrongPassword);
        }

        let mut sessions = self.inner.sessions.lock().await;
        // close() takes the manager before draining the map
        let manager = self.manager()?;
        if let Some(token) = Self::existing_token(&sessions, user) {
            info!(user = %user, "Reusing existing session");
            return Ok(token);
        }

        let persist = manager.create_persist(user, password)?;
        let data = persist.load()?;
        let token = Self::insert(&mut sessions, user, persist, data);
        info!(user = %user, sessions = sessions.len(), "Logged in");
        Ok(token)
    }

    /// Create a user and log them in.
    pub async fn register_user(&self, user: &str, password: &str, password2: &str) -> Result<String> {
        if password != password2 {
            return Err(Error::PasswordMismatch);
        }

        let manager = self.manager()?;
        let data = manager.create_user(user, password)?;

        // Persist handles are only opened under the map lock, like in login.
        let mut sessions = self.inner.sessions.lock().await;
        let manager = self.manager()?;
        // A login may have raced in right after the user was created.
        if let Some(token) = Self::existing_token(&sessions, user) {
            return Ok(token);
        }
        let persist = manager.create_persist(user, password)?;
        let token = Self::insert(&mut sessions, user, persist, data);
        info!(user = %user, "Registered user");
        Ok(token)
    }

    fn existing_token(sessions: &SessionMap<M>, user: &str) -> Option<String> {
        let entry = sessions.values().find(|entry| entry.user == user)?;
        entry.touch();
        Some(entry.token.clone())
    }

    fn insert(sessions: &mut SessionMap<M>, user: &str, persist: M::Persist, data: M::Value) -> String {
        let token = loop {
            let token = generate_token();
            if !sessions.contains_key(&token) {
                break token;
            }
        };
        let entry = SessionEntry::new(token.clone(), user, persist, data);
        sessions.insert(token.clone(), Arc::new(entry));
        token
    }

    async fn lookup(&self, token: &str) -> Option<Arc<Entry<M>>> {
        self.inner.sessions.lock().await.get(token).cloned()
    }

    /// Resolve a token to its user's data.
    ///
    /// Returns `Ok(None)` if the token is unknown or expired; the caller must
    /// log in again. Unloaded data is reloaded from storage. The returned
    /// guard holds the session's lock until dropped.
    pub async fn get_session(&self, token: &str) -> Result<Option<Session<M::Value>>> {
        self.manager()?;
        let Some(entry) = self.lookup(token).await else {
            return Ok(None);
        };

        let mut data = Arc::clone(&entry.data).lock_owned().await;
        if entry.is_removed() {
            return Ok(None);
        }

        if entry.idle() >= self.inner.config.token_lifetime {
            match self.expire(&entry, &mut data).await {
                Ok(Expiry::Removed) => return Ok(None),
                Ok(Expiry::Revived) => {}
                Err(e) => {
                    warn!(user = %entry.user, error = %e, "Failed to save expired session, keeping it");
                    return Ok(None);
                }
            }
        }

        if data.is_none() {
            *data = Some(entry.persist.load()?);
            debug!(user = %entry.user, "Reloaded session data");
        }
        entry.touch();

        match Session::new(entry.user.clone(), data) {
            Ok(session) => Ok(Some(session)),
            Err(_) => Ok(None),
        }
    }

    /// Save an expired entry and remove it from the map.
    ///
    /// Must be called with the entry's data lock held. If the save fails the
    /// entry stays so a later sweep can retry.
    pub(crate) async fn expire(&self, entry: &Arc<Entry<M>>, data: &mut Option<M::Value>) -> Result<Expiry> {
        entry.save(data)?;

        let mut sessions = self.inner.sessions.lock().await;
        // A login touches entries under the map lock; re-check here.
        if entry.idle() < self.inner.config.token_lifetime {
            return Ok(Expiry::Revived);
        }
        if sessions
            .get(&entry.token)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            sessions.remove(&entry.token);
        }
        entry.mark_removed();
        drop(sessions);

        *data = None;
        debug!(user = %entry.user, "Session expired");
        Ok(Expiry::Removed)
    }

    /// End a session.
    ///
    /// The data is saved first, but the token is revoked even if saving
    /// fails; the save error is returned. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.manager()?;
        let Some(entry) = self.lookup(token).await else {
            return Ok(());
        };

        let mut data = Arc::clone(&entry.data).lock_owned().await;
        if entry.is_removed() {
            return Ok(());
        }
        let saved = entry.save(&data);

        {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.remove(&entry.token);
            entry.mark_removed();
        }
        *data = None;

        match saved {
            Ok(()) => info!(user = %entry.user, "Logged out"),
            Err(ref e) => warn!(user = %entry.user, error = %e, "Logged out, but saving failed"),
        }
        saved
    }

    /// Stop the sweep, save every session and refuse further operations.
    ///
    /// Waits for requests holding a [`Session`] to finish. Sessions that
    /// could not be saved stay in memory and are reported as
    /// [`Error::Flush`]; calling `close` again retries them. Once nothing is
    /// left to save, `close` returns [`Error::ManagerClosed`].
    pub async fn close(&self) -> Result<()> {
        let was_open = self.inner.manager.write().take().is_some();
        if was_open {
            self.inner.shutdown.cancel();
            let task = self.inner.sweep_task.lock().take();
            if let Some(task) = task
                && let Err(e) = task.await
            {
                warn!(error = %e, "Session sweep task failed");
            }
        } else if self.is_empty().await {
            return Err(Error::ManagerClosed);
        } else {
            info!("Retrying sessions left unsaved by an earlier close");
        }

        let entries: Vec<_> = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.drain().map(|(_, entry)| entry).collect()
        };
        let total = entries.len();

        let mut retained = Vec::new();
        for entry in entries {
            let mut data = entry.data.lock().await;
            match entry.save(&data) {
                Ok(()) => {
                    entry.mark_removed();
                    *data = None;
                }
                Err(e) => {
                    error!(user = %entry.user, error = %e, "Failed to save session on close");
                    drop(data);
                    retained.push(entry);
                }
            }
        }

        let failed = retained.len();
        if failed > 0 {
            let mut sessions = self.inner.sessions.lock().await;
            for entry in retained {
                sessions.insert(entry.token.clone(), entry);
            }
        }

        info!(saved = total - failed, failed, "Session cache closed");
        if failed > 0 {
            return Err(Error::Flush { failed });
        }
        Ok(())
    }

    /// Number of valid tokens.
    pub async fn len(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Whether no session is open.
    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.lock().await.is_empty()
    }

    /// Occupancy counters.
    pub async fn stats(&self) -> CacheStats {
        let sessions = self.inner.sessions.lock().await;
        CacheStats {
            sessions: sessions.len(),
            loaded: sessions.values().filter(|entry| entry.is_loaded()).count(),
        }
    }

    /// Describe all open sessions.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .values()
            .map(|entry| SessionInfo {
                user: entry.user.clone(),
                created_at: entry.created_at,
                idle: entry.idle(),
                loaded: entry.is_loaded(),
            })
            .collect()
    }
}
