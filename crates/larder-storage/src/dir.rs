//! Directory-backed file system.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FileWriter, validate_name};

/// File system mapping each name to a file inside one directory.
///
/// Writes go to a hidden temporary file which is renamed over the target on
/// [`FileWriter::finish`], so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct DirFileSystem {
    root: PathBuf,
}

impl DirFileSystem {
    /// Create a file system rooted at an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSystem for DirFileSystem {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        validate_name(name)?;
        let path = self.root.join(name);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>> {
        validate_name(name)?;
        let dest = self.root.join(name);
        let tmp = self.root.join(format!(".{name}.tmp"));
        let file = File::create(&tmp)?;
        trace!(path = %dest.display(), "Opened file for writing");
        Ok(Box::new(DirWriter {
            file: Some(BufWriter::new(file)),
            tmp,
            dest,
        }))
    }
}

struct DirWriter {
    file: Option<BufWriter<File>>,
    tmp: PathBuf,
    dest: PathBuf,
}

impl Write for DirWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(data),
            None => Err(io::Error::other("writer already finished")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl FileWriter for DirWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp, &self.dest)?;
        Ok(())
    }
}

impl Drop for DirWriter {
    fn drop(&mut self) {
        // Not finished: throw the partial write away.
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
