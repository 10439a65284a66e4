//! In-memory file system, mainly used for testing.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FileWriter, validate_name};

/// File system keeping every blob in a shared map.
///
/// Clones share the same content, so a test can keep a handle and inspect
/// what higher layers wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create an empty in-memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Check if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Names of all stored blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl FileSystem for MemoryFileSystem {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let files = self.files.read();
        let data = files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>> {
        validate_name(name)?;
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            buf: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }
}

struct MemoryWriter {
    name: String,
    buf: Vec<u8>,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for MemoryWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let MemoryWriter { name, buf, files } = *self;
        files.write().insert(name, buf);
        Ok(())
    }
}
