//! Line-delimited record files: streaming reads, whole-file writes, appends
//! and atomic replacement.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::Builder;

use crate::error::{Error, Result, StorageError};
use crate::types::{Record, TABLE_EXTENSION, is_scalar};

use super::scratch::ScratchFile;

/// Lazy, forward-only reader over a record file.
///
/// Parses one line per call to `next`. The first error fuses the reader.
/// When constructed from an owned [`ScratchFile`], the file is deleted as
/// soon as the reader is dropped.
#[derive(Debug)]
pub struct RecordReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
    path: PathBuf,
    line: usize,
    done: bool,
    _owner: Option<ScratchFile>,
}

impl RecordReader {
    /// Open a reader over the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::from(StorageError::FileNotFound(path.to_path_buf())),
            _ => Error::from(e),
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
            path: path.to_path_buf(),
            line: 0,
            done: false,
            _owner: None,
        })
    }

    /// Open a reader that takes ownership of a scratch file.
    pub(crate) fn owning(file: ScratchFile) -> Result<Self> {
        let mut reader = Self::open(file.path())?;
        reader._owner = Some(file);
        Ok(reader)
    }

    /// Path of the file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        }
        self.line += 1;
        let parsed = parse_line(trim_newline(&self.buf), &self.path, self.line);
        if parsed.is_err() {
            self.done = true;
        }
        Some(parsed)
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse a single stored line into a record.
fn parse_line(line: &[u8], path: &Path, line_no: usize) -> Result<Record> {
    let malformed = |reason: String| StorageError::MalformedRecord {
        path: path.to_path_buf(),
        line: line_no,
        reason,
    };

    let line = std::str::from_utf8(line).map_err(|e| malformed(e.to_string()))?;
    let record: Record = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    if let Some((name, _)) = record.iter().find(|(_, v)| !is_scalar(v)) {
        return Err(malformed(format!("field '{name}' is not a scalar")).into());
    }
    Ok(record)
}

/// Buffered writer producing one compact JSON object per line.
pub struct RecordWriter<W: Write> {
    inner: BufWriter<W>,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            written: 0,
        }
    }

    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, value).map_err(io::Error::from)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Drain a record stream into the writer, stopping at the first error.
    pub fn write_all<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        for record in records {
            self.write(&record?)?;
        }
        Ok(())
    }

    /// Flush buffered output and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.inner.flush()?;
        Ok(self.written)
    }
}

/// Write a record stream to `path`, truncating any existing file.
///
/// Returns the number of records written.
pub fn write_records<I>(records: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let mut writer = RecordWriter::new(File::create(path)?);
    writer.write_all(records)?;
    writer.finish()
}

/// Append a single record to the file at `path`, creating it if needed.
pub fn append_record(record: &Record, path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = RecordWriter::new(file);
    writer.write(record)?;
    writer.finish()?;
    Ok(())
}

/// Replace the file at `path` with whatever `fill` writes.
///
/// The new contents go to a hidden temp file next to `path` (same
/// filesystem), which is renamed over `path` only if `fill` succeeds. On
/// error the temp file is removed and `path` is left untouched.
pub fn replace_atomically<T, F>(path: &Path, prefix: &str, fill: F) -> Result<T>
where
    F: FnOnce(&mut RecordWriter<&File>) -> Result<T>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = Builder::new()
        .prefix(&format!(".{prefix}_"))
        .suffix(&format!(".{TABLE_EXTENSION}"))
        .tempfile_in(dir)?;

    let out = {
        let mut writer = RecordWriter::new(temp.as_file());
        let out = fill(&mut writer)?;
        writer.finish()?;
        out
    };
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(out)
}
