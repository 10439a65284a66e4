//! Named-blob storage for per-user data.
//!
//! This crate provides the storage seam beneath the session layer:
//! - [`FileSystem`], a minimal "open reader / open writer" blob store
//! - [`DirFileSystem`] and [`MemoryFileSystem`] backends
//! - [`CryptFileSystem`], a decorator encrypting everything at rest with a
//!   key derived from the user's password
//! - [`Namespaces`], factories handing out one isolated file system per user
//!
//! # Example
//!
//! ```rust,ignore
//! use larder_storage::{CryptFileSystem, MemoryFileSystem, read_file, write_file};
//!
//! let plain = MemoryFileSystem::new();
//! let crypt = CryptFileSystem::new(Arc::new(plain.clone()), "secret")?;
//! write_file(&crypt, "items", b"milk")?;
//! assert_eq!(read_file(&crypt, "items")?, b"milk");
//! ```

mod crypt;
mod dir;
mod error;
mod fs;
mod memory;
mod namespace;
pub mod reserved;

pub use crypt::{CryptFileSystem, KdfParams, SALT_LEN, decrypt, encrypt};
pub use dir::DirFileSystem;
pub use error::{Error, Result};
pub use fs::{FileSystem, FileWriter, SharedFileSystem, read_file, validate_name, write_file};
pub use memory::MemoryFileSystem;
pub use namespace::{DirNamespaces, MemoryNamespaces, Namespaces};
pub use reserved::GuardedFileSystem;
