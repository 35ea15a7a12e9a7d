//! Scratch space for runs, partitions and materialized join inputs.
//!
//! Every scratch file is owned by a [`ScratchFile`] handle and removed from
//! disk when that handle is dropped, whether the consuming operator ran to
//! completion, was abandoned half-way or failed.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{Builder, TempDir, TempPath};
use tracing::trace;

use crate::error::Result;
use crate::types::{Record, TABLE_EXTENSION};

use super::file::{RecordReader, RecordWriter};

/// A directory that hands out uniquely named scratch files.
///
/// Cheap to clone. When created with [`ScratchDir::temporary`], the
/// directory itself is removed once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    inner: Arc<ScratchInner>,
}

#[derive(Debug)]
struct ScratchInner {
    path: PathBuf,
    _owned: Option<TempDir>,
}

impl ScratchDir {
    /// Create a private scratch directory under the system temp dir.
    pub fn temporary() -> Result<Self> {
        let dir = Builder::new().prefix("spooldb-scratch-").tempdir()?;
        Ok(Self {
            inner: Arc::new(ScratchInner {
                path: dir.path().to_path_buf(),
                _owned: Some(dir),
            }),
        })
    }

    /// Use (and create if needed) the directory at `path`.
    ///
    /// The directory is left in place when the handle is dropped; only the
    /// files handed out by it are removed.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            inner: Arc::new(ScratchInner { path, _owned: None }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Allocate a new empty scratch file named `<prefix>_<random>.jsonl`.
    pub fn create(&self, prefix: &str) -> Result<ScratchFile> {
        let (_file, path) = self.named(prefix)?.into_parts();
        trace!(path = %path.display(), "allocated scratch file");
        Ok(ScratchFile { path })
    }

    /// Drain a record stream into a new scratch file.
    ///
    /// Returns the file and the number of records written. If the stream
    /// fails, the partially written file is removed before returning.
    pub fn materialize<I>(&self, prefix: &str, records: I) -> Result<(ScratchFile, usize)>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let (file, path) = self.named(prefix)?.into_parts();
        let scratch = ScratchFile { path };
        let mut writer = RecordWriter::new(file);
        writer.write_all(records)?;
        let count = writer.finish()?;
        trace!(path = %scratch.path().display(), records = count, "materialized scratch file");
        Ok((scratch, count))
    }

    fn named(&self, prefix: &str) -> Result<tempfile::NamedTempFile> {
        Ok(Builder::new()
            .prefix(&format!("{prefix}_"))
            .suffix(&format!(".{TABLE_EXTENSION}"))
            .tempfile_in(self.path())?)
    }
}

/// An owned scratch file, deleted on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Opens the file per call so that many partitions
    /// can be open at once without holding a descriptor each.
    pub fn append(&self, record: &Record) -> Result<()> {
        let file = OpenOptions::new().append(true).open(self.path())?;
        let mut writer = RecordWriter::new(file);
        writer.write(record)?;
        writer.finish()?;
        Ok(())
    }

    /// Open a buffered writer that replaces the file's contents.
    pub fn writer(&self) -> Result<RecordWriter<File>> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path())?;
        Ok(RecordWriter::new(file))
    }

    /// Open a fresh reader over the file; the file stays owned by `self`.
    pub fn reader(&self) -> Result<RecordReader> {
        RecordReader::open(self.path())
    }

    /// Turn the file into a reader that deletes it when dropped.
    pub fn into_reader(self) -> Result<RecordReader> {
        RecordReader::owning(self)
    }
}
