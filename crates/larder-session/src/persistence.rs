//! Capabilities the session cache consumes.
//!
//! The cache never inspects or serializes user data. It only moves values
//! between memory and a [`Persist`] handle obtained from a [`Manager`].

use crate::error::Result;

/// Load/save capability bound to one user's storage.
pub trait Persist: Send + Sync {
    /// The in-memory user data.
    type Value: Send + 'static;

    /// Read the user's data from storage.
    fn load(&self) -> Result<Self::Value>;

    /// Write the user's data back to storage, replacing what was there.
    fn save(&self, value: &Self::Value) -> Result<()>;
}

/// User administration the cache delegates to.
///
/// Implementations must not reveal whether a user exists: unknown users
/// fail exactly like wrong passwords.
pub trait Manager: Send + Sync + 'static {
    /// The in-memory user data.
    type Value: Send + 'static;

    /// Persist handle bound to one user.
    type Persist: Persist<Value = Self::Value> + 'static;

    /// Create storage for a new user and return its initial (empty) data.
    fn create_user(&self, user: &str, password: &str) -> Result<Self::Value>;

    /// Check a user's password. Never fails: any problem yields `false`.
    fn check_password(&self, user: &str, password: &str) -> bool;

    /// Open the storage of an existing user.
    fn create_persist(&self, user: &str, password: &str) -> Result<Self::Persist>;
}
