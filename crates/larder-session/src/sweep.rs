//! Periodic eviction of idle sessions.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::cache::{Expiry, SessionCache};
use crate::persistence::Manager;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions saved and removed because the token expired.
    pub expired: usize,
    /// Sessions saved and dropped from memory; their tokens stay valid.
    pub unloaded: usize,
    /// Sessions whose save failed; they are kept for the next sweep.
    pub failed: usize,
}

impl<M: Manager> SessionCache<M> {
    /// Save and evict idle sessions.
    ///
    /// Sessions idle for the token lifetime are removed; sessions idle for
    /// the data lifetime lose their in-memory data. Sessions currently held
    /// by a request are skipped. Does nothing once the cache is closed.
    pub async fn check_sessions(&self) -> SweepReport {
        let mut report = SweepReport::default();
        if self.is_closed() {
            return report;
        }

        let entries: Vec<_> = self.inner.sessions.lock().await.values().cloned().collect();
        let config = &self.inner.config;

        for entry in entries {
            let Ok(mut data) = Arc::clone(&entry.data).try_lock_owned() else {
                continue;
            };
            if entry.is_removed() {
                continue;
            }

            let idle = entry.idle();
            if idle >= config.token_lifetime {
                match self.expire(&entry, &mut data).await {
                    Ok(Expiry::Removed) => report.expired += 1,
                    Ok(Expiry::Revived) => {}
                    Err(e) => {
                        warn!(user = %entry.user, error = %e, "Failed to save expired session, keeping it");
                        report.failed += 1;
                    }
                }
            } else if idle >= config.data_lifetime && data.is_some() {
                match entry.save(&data) {
                    Ok(()) => {
                        *data = None;
                        report.unloaded += 1;
                        debug!(user = %entry.user, "Unloaded idle session data");
                    }
                    Err(e) => {
                        warn!(user = %entry.user, error = %e, "Failed to save idle session, keeping it loaded");
                        report.failed += 1;
                    }
                }
            }
        }

        if report != SweepReport::default() {
            debug!(
                expired = report.expired,
                unloaded = report.unloaded,
                failed = report.failed,
                "Session sweep finished"
            );
        }
        report
    }
}

/// Start the background sweep for `cache`.
///
/// Runs every [`sweep_interval`](crate::CacheConfig::sweep_interval) until the
/// cache's shutdown token is cancelled or the cache is dropped.
pub(crate) fn spawn<M: Manager>(handle: &Handle, cache: &SessionCache<M>) -> JoinHandle<()> {
    let weak = Arc::downgrade(&cache.inner);
    let shutdown = cache.inner.shutdown.clone();
    let period = cache.inner.config.sweep_interval();

    handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    SessionCache { inner }.check_sessions().await;
                }
            }
        }
        debug!("Session sweep stopped");
    })
}
