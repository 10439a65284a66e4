//! Configuration for the session cache.

use std::time::Duration;

use larder_config::SessionConfig;

use crate::error::{Error, Result};

/// Default idle time after which a token becomes invalid.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Default idle time after which session data is evicted from memory.
pub const DEFAULT_DATA_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// Configuration for the session cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an idle token stays valid at all.
    pub token_lifetime: Duration,

    /// How long an idle session keeps its data in memory.
    /// After that the data is saved and dropped, and reloaded on next use.
    pub data_lifetime: Duration,

    /// Whether to run the periodic background sweep.
    /// If false, expiry is only enforced on access and by explicit
    /// [`SessionCache::check_sessions`](crate::SessionCache::check_sessions) calls.
    pub enable_sweep_task: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            data_lifetime: DEFAULT_DATA_LIFETIME,
            enable_sweep_task: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token lifetime.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Set the data lifetime.
    pub fn with_data_lifetime(mut self, lifetime: Duration) -> Self {
        self.data_lifetime = lifetime;
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }

    /// Interval of the background sweep: the shorter of both lifetimes.
    pub fn sweep_interval(&self) -> Duration {
        self.token_lifetime.min(self.data_lifetime)
    }

    /// Reject configurations the cache cannot honour.
    ///
    /// Both lifetimes must be non-zero and data may not outlive its token.
    pub fn validate(&self) -> Result<()> {
        if self.token_lifetime.is_zero() || self.data_lifetime.is_zero() {
            return Err(Error::InvalidConfig(
                "token and data lifetimes must be non-zero".to_string(),
            ));
        }
        if self.data_lifetime > self.token_lifetime {
            return Err(Error::InvalidConfig(format!(
                "data lifetime ({:?}) exceeds token lifetime ({:?})",
                self.data_lifetime, self.token_lifetime
            )));
        }
        Ok(())
    }
}

impl From<&SessionConfig> for CacheConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            token_lifetime: config.token_lifetime(),
            data_lifetime: config.data_lifetime(),
            enable_sweep_task: config.sweep,
        }
    }
}
