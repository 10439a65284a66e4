//! The file system abstraction shared by all backends.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A minimal store of named blobs.
///
/// Names are flat: no directories, no path separators. Writing a name
/// replaces its previous content once the returned writer is finished.
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Open the named blob for reading.
    ///
    /// Returns [`Error::NotFound`] if nothing was ever written under `name`.
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>>;

    /// Open the named blob for writing.
    ///
    /// Nothing becomes visible to readers until [`FileWriter::finish`] is
    /// called. Dropping the writer without finishing discards the data.
    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>>;
}

/// Byte sink returned by [`FileSystem::writer`].
pub trait FileWriter: Write + Send {
    /// Commit everything written so far under the writer's name.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// A file system shared between owners (cache entries, decorators).
pub type SharedFileSystem = Arc<dyn FileSystem>;

impl<F: FileSystem + ?Sized> FileSystem for Arc<F> {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        (**self).reader(name)
    }

    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>> {
        (**self).writer(name)
    }
}

/// Read the whole content of a named blob.
pub fn read_file<F: FileSystem + ?Sized>(fs: &F, name: &str) -> Result<Vec<u8>> {
    let mut reader = fs.reader(name)?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}

/// Replace the content of a named blob.
pub fn write_file<F: FileSystem + ?Sized>(fs: &F, name: &str, data: &[u8]) -> Result<()> {
    let mut writer = fs.writer(name)?;
    writer.write_all(data)?;
    writer.finish()
}

/// Check that `name` is usable as a flat blob or namespace name.
///
/// Rejects empty names, names with path separators or NUL bytes, and names
/// starting with `.` (which covers `.`/`..` and the temporary files of
/// [`DirFileSystem`](crate::DirFileSystem)).
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
