//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The user name contains characters other than letters and digits.
    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    /// A user with this name already exists.
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// Unknown user or wrong password; deliberately not distinguished.
    #[error("Wrong username or password")]
    WrongPassword,

    /// Password and confirmation differ at registration.
    #[error("Passwords are not equal")]
    PasswordMismatch,

    /// The cache was closed; no further storage access is allowed.
    #[error("Session manager closed")]
    ManagerClosed,

    /// Error from the storage layer.
    #[error("Storage error: {0}")]
    Storage(#[from] larder_storage::Error),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Error from the application's persistence code.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The cache configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Some sessions could not be persisted on close and were retained.
    #[error("{failed} session(s) could not be persisted")]
    Flush { failed: usize },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
