//! Session cache with lazily loaded, per-user data and idle eviction.
//!
//! This crate provides the session layer of Larder:
//! - [`SessionCache`], mapping opaque tokens to one user's in-memory data,
//!   generic over the data type
//! - two-tier idle eviction: data is unloaded after the data lifetime, the
//!   token dies after the token lifetime; both save through [`Persist`]
//! - [`DataManager`], a [`Manager`] keeping each user in its own storage
//!   namespace with an Argon2id password hash and optional encryption at rest
//! - cookie helpers for the HTTP layer
//!
//! # Example
//!
//! ```rust,ignore
//! use larder_session::{CacheConfig, DataManager, SessionCache};
//! use larder_storage::DirNamespaces;
//!
//! let manager = DataManager::new(DirNamespaces::new("data"), MyPersist).with_encryption(true);
//! let cache = SessionCache::new(manager, CacheConfig::default())?;
//!
//! let token = cache.register_user("bob", "secret", "secret").await?;
//! if let Some(mut session) = cache.get_session(&token).await? {
//!     session.items.push("milk".into());
//! }
//! cache.close().await?;
//! ```

mod cache;
mod config;
pub mod cookie;
mod data_manager;
mod entry;
mod error;
mod password;
mod persistence;
mod sweep;
mod token;

pub use cache::{CacheStats, SessionCache, SessionInfo};
pub use config::{CacheConfig, DEFAULT_DATA_LIFETIME, DEFAULT_TOKEN_LIFETIME};
pub use data_manager::{DataManager, FilePersist, UserPersist, validate_username};
pub use entry::Session;
pub use error::{Error, Result};
pub use password::PasswordHashing;
pub use persistence::{Manager, Persist};
pub use sweep::SweepReport;
pub use token::{TOKEN_LEN, generate_token};
