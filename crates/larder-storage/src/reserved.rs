//! Names reserved for internal bookkeeping inside a user namespace.

use std::io::Read;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FileWriter, SharedFileSystem};

/// Unencrypted salt used to derive the encryption key.
pub const SALT: &str = "salt";

/// Password hash of the namespace owner.
pub const PASSWORD_HASH: &str = "password-hash";

/// All reserved names.
pub const RESERVED: &[&str] = &[SALT, PASSWORD_HASH];

/// Check whether `name` is reserved.
pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Fail with [`Error::Reserved`] if `name` is reserved.
pub fn ensure_not_reserved(name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(Error::Reserved(name.to_string()));
    }
    Ok(())
}

/// File system view handed to application code.
///
/// Refuses every reserved name so application data can never clobber (or
/// read) the password hash or the salt, whatever names it picks.
#[derive(Debug, Clone)]
pub struct GuardedFileSystem {
    inner: SharedFileSystem,
}

impl GuardedFileSystem {
    /// Wrap a file system.
    pub fn new(inner: SharedFileSystem) -> Self {
        Self { inner }
    }
}

impl FileSystem for GuardedFileSystem {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        ensure_not_reserved(name)?;
        self.inner.reader(name)
    }

    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>> {
        ensure_not_reserved(name)?;
        self.inner.writer(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::{read_file, write_file};
    use crate::memory::MemoryFileSystem;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved(SALT));
        assert!(is_reserved(PASSWORD_HASH));
        assert!(!is_reserved("items"));
    }

    #[test]
    fn test_guard_blocks_reserved_names() {
        let raw = MemoryFileSystem::new();
        write_file(&raw, PASSWORD_HASH, b"hash").unwrap();
        let guarded = GuardedFileSystem::new(Arc::new(raw.clone()));

        for name in RESERVED {
            assert!(matches!(guarded.writer(name), Err(Error::Reserved(_))));
            assert!(matches!(guarded.reader(name), Err(Error::Reserved(_))));
        }
        assert_eq!(read_file(&raw, PASSWORD_HASH).unwrap(), b"hash");
    }

    #[test]
    fn test_guard_passes_other_names_through() {
        let raw = MemoryFileSystem::new();
        let guarded = GuardedFileSystem::new(Arc::new(raw.clone()));

        write_file(&guarded, "items", b"milk").unwrap();
        assert_eq!(read_file(&raw, "items").unwrap(), b"milk");
    }
}
