//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [session]                  # token and data lifetimes
//! [storage]                  # data directory and encryption
//! [storage.password_hash]    # Argon2id cost parameters
//! [logging]                  # filters and JSON log files
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarderConfig {
    /// Session cache configuration.
    pub session: Option<SessionConfig>,

    /// User storage configuration.
    pub storage: Option<StorageConfig>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl LarderConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: LarderConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.storage.is_some() {
            self.storage = other.storage;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Session section, or defaults.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Storage section, or defaults.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache configuration.
///
/// ```toml
/// [session]
/// token_lifetime_secs = 1800
/// data_lifetime_secs = 600
/// sweep = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle seconds after which a session token stops being valid.
    pub token_lifetime_secs: u64,
    /// Idle seconds after which a session's data is evicted from memory.
    pub data_lifetime_secs: u64,
    /// Whether to run the periodic background sweep.
    pub sweep: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_lifetime_secs: 30 * 60,
            data_lifetime_secs: 10 * 60,
            sweep: true,
        }
    }
}

impl SessionConfig {
    /// Token lifetime as a duration.
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    /// Data lifetime as a duration.
    pub fn data_lifetime(&self) -> Duration {
        Duration::from_secs(self.data_lifetime_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// User storage configuration.
///
/// ```toml
/// [storage]
/// root = "data"
/// encrypt = true
///
/// [storage.password_hash]
/// memory_kib = 19456
/// iterations = 2
/// parallelism = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per user.
    pub root: PathBuf,
    /// Encrypt user data at rest with a password-derived key.
    pub encrypt: bool,
    /// Password hashing cost.
    pub password_hash: PasswordHashConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            encrypt: false,
            password_hash: PasswordHashConfig::default(),
        }
    }
}

/// Argon2id cost parameters for stored password hashes.
///
/// Only affects newly created users; existing hashes carry their own
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// filter = "larder_session=debug,info"
/// json_dir = "logs"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives for console output. `RUST_LOG` wins if set.
    pub filter: String,
    /// Directory for daily-rolling JSON log files; disabled when unset.
    pub json_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json_dir: None,
        }
    }
}
