//! Error types for storage operations.

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named file does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The user namespace does not exist.
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// The user namespace already exists.
    #[error("Namespace already exists: {0}")]
    AlreadyExists(String),

    /// The name cannot be used as a file or namespace name.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// The name is reserved for internal bookkeeping.
    #[error("Reserved name: {0}")]
    Reserved(String),

    /// Encrypting data failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decrypting data failed (corrupt data or wrong password).
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the requested file is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
