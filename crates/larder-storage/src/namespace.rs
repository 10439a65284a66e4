//! Per-user storage namespaces.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dir::DirFileSystem;
use crate::error::{Error, Result};
use crate::fs::{SharedFileSystem, validate_name};
use crate::memory::MemoryFileSystem;

/// Factory handing out one isolated file system per user.
pub trait Namespaces: Send + Sync + std::fmt::Debug {
    /// Create a fresh, empty namespace.
    ///
    /// Fails with [`Error::AlreadyExists`] if the namespace exists. Creation
    /// is atomic: of two concurrent calls for the same name, one fails.
    fn create(&self, name: &str) -> Result<SharedFileSystem>;

    /// Open an existing namespace.
    ///
    /// Fails with [`Error::NamespaceNotFound`] if it was never created.
    fn open(&self, name: &str) -> Result<SharedFileSystem>;

    /// Delete a namespace and everything in it.
    ///
    /// Fails with [`Error::NamespaceNotFound`] if it does not exist.
    fn remove(&self, name: &str) -> Result<()>;
}

/// Namespaces stored as sub-directories of a root directory.
#[derive(Debug, Clone)]
pub struct DirNamespaces {
    root: PathBuf,
}

impl DirNamespaces {
    /// Use `root` as parent directory; it is created on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory containing all namespaces.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Namespaces for DirNamespaces {
    fn create(&self, name: &str) -> Result<SharedFileSystem> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)?;
        let dir = self.root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => {
                debug!(namespace = %name, path = %dir.display(), "Created namespace directory");
                Ok(Arc::new(DirFileSystem::new(dir)))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(Error::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self, name: &str) -> Result<SharedFileSystem> {
        validate_name(name)?;
        let dir = self.root.join(name);
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Arc::new(DirFileSystem::new(dir))),
            Ok(_) => Err(Error::NamespaceNotFound(name.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NamespaceNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.root.join(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(namespace = %name, path = %dir.display(), "Removed namespace directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NamespaceNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Namespaces held in memory, mainly used for testing.
///
/// Clones share the same namespaces.
#[derive(Debug, Clone, Default)]
pub struct MemoryNamespaces {
    spaces: Arc<Mutex<HashMap<String, MemoryFileSystem>>>,
}

impl MemoryNamespaces {
    /// Create an empty set of namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access to a namespace, bypassing any decorator.
    pub fn get(&self, name: &str) -> Option<MemoryFileSystem> {
        self.spaces.lock().get(name).cloned()
    }
}

impl Namespaces for MemoryNamespaces {
    fn create(&self, name: &str) -> Result<SharedFileSystem> {
        validate_name(name)?;
        match self.spaces.lock().entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(name.to_string())),
            Entry::Vacant(entry) => {
                let fs = entry.insert(MemoryFileSystem::new());
                Ok(Arc::new(fs.clone()))
            }
        }
    }

    fn open(&self, name: &str) -> Result<SharedFileSystem> {
        self.spaces
            .lock()
            .get(name)
            .map(|fs| Arc::new(fs.clone()) as SharedFileSystem)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.spaces
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))
    }
}
