//! External merge sort over scratch runs.
//!
//! [`make_runs`] cuts the input into sorted runs of at most `chunk_size`
//! records, [`merge`] combines two runs into one, and [`sort_merge`] chains
//! them: run 1 is merged with run 2, the result with run 3, and so on,
//! until a single run remains to be streamed back.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use crate::api::filter::compare_values;
use crate::error::{QueryError, Result};
use crate::storage::{RecordReader, ScratchDir, ScratchFile};
use crate::types::{Record, field};

/// Sort direction and key shared by every step of one sort.
#[derive(Debug, Clone, Copy)]
struct SortKey<'a> {
    name: &'a str,
    ascending: bool,
}

impl SortKey<'_> {
    /// Order `a` against `b` in the requested direction.
    fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        let ord = compare_values(a, b).ok_or_else(|| QueryError::IncomparableValues {
            field: self.name.to_string(),
            left: a.clone(),
            right: b.clone(),
        })?;
        Ok(if self.ascending { ord } else { ord.reverse() })
    }
}

/// Consume `input` in batches of `chunk_size`, sort each batch stably by
/// `key` and write it to its own run.
///
/// Returns the runs in input order. An empty input yields no runs.
pub fn make_runs<I>(
    input: I,
    key: &str,
    ascending: bool,
    chunk_size: usize,
    scratch: &ScratchDir,
) -> Result<Vec<ScratchFile>>
where
    I: IntoIterator<Item = Result<Record>>,
{
    if chunk_size == 0 {
        return Err(QueryError::InvalidChunkSize.into());
    }
    let key = SortKey {
        name: key,
        ascending,
    };

    let mut runs = Vec::new();
    let mut batch: Vec<Record> = Vec::with_capacity(chunk_size);
    for record in input {
        batch.push(record?);
        if batch.len() == chunk_size {
            runs.push(flush_run(&mut batch, key, scratch)?);
        }
    }
    if !batch.is_empty() {
        runs.push(flush_run(&mut batch, key, scratch)?);
    }
    Ok(runs)
}

fn flush_run(
    batch: &mut Vec<Record>,
    key: SortKey<'_>,
    scratch: &ScratchDir,
) -> Result<ScratchFile> {
    // Validate every key up front so the comparator below cannot fail.
    let mut keys = Vec::with_capacity(batch.len());
    for record in batch.iter() {
        let value = field(record, key.name)?;
        if let Some(first) = keys.first() {
            key.compare(first, value)?;
        }
        keys.push(value.clone());
    }

    let mut order: Vec<usize> = (0..batch.len()).collect();
    order.sort_by(|&a, &b| key.compare(&keys[a], &keys[b]).unwrap_or(Ordering::Equal));

    let mut records: Vec<Option<Record>> = batch.drain(..).map(Some).collect();
    let sorted = order.into_iter().filter_map(|i| records[i].take()).map(Ok);
    let (run, count) = scratch.materialize("sort", sorted)?;
    debug!(records = count, path = %run.path().display(), "wrote sorted run");
    Ok(run)
}

/// Merge two sorted runs into a new one.
///
/// On equal keys the record from `run_a` goes first, so merging runs cut
/// from consecutive input preserves input order for ties. Both inputs are
/// consumed and deleted.
pub fn merge(
    run_a: ScratchFile,
    run_b: ScratchFile,
    key: &str,
    ascending: bool,
    scratch: &ScratchDir,
) -> Result<ScratchFile> {
    let key = SortKey {
        name: key,
        ascending,
    };
    let out = scratch.create("merge")?;
    let mut writer = out.writer()?;
    let mut a = run_a.into_reader()?;
    let mut b = run_b.into_reader()?;

    let mut head_a = a.next().transpose()?;
    let mut head_b = b.next().transpose()?;
    loop {
        match (head_a.take(), head_b.take()) {
            (Some(ra), Some(rb)) => {
                let ord = key.compare(field(&ra, key.name)?, field(&rb, key.name)?)?;
                if ord == Ordering::Greater {
                    writer.write(&rb)?;
                    head_a = Some(ra);
                    head_b = b.next().transpose()?;
                } else {
                    writer.write(&ra)?;
                    head_a = a.next().transpose()?;
                    head_b = Some(rb);
                }
            }
            (Some(ra), None) => {
                writer.write(&ra)?;
                writer.write_all(&mut a)?;
                break;
            }
            (None, Some(rb)) => {
                writer.write(&rb)?;
                writer.write_all(&mut b)?;
                break;
            }
            (None, None) => break,
        }
    }
    let count = writer.finish()?;
    debug!(records = count, path = %out.path().display(), "merged runs");
    Ok(out)
}

/// Sort a record stream by `key` using bounded memory.
///
/// Nothing happens until the first pull. The sorted output is then read
/// lazily from the final run, which is deleted once the stream is
/// exhausted or dropped. Created by [`sort_merge`].
pub struct SortMerge<I> {
    state: SortState<I>,
    key: String,
    ascending: bool,
    chunk_size: usize,
    scratch: ScratchDir,
}

enum SortState<I> {
    Pending(I),
    Streaming(RecordReader),
    Done,
}

pub fn sort_merge<I>(
    input: I,
    key: impl Into<String>,
    ascending: bool,
    chunk_size: usize,
    scratch: &ScratchDir,
) -> SortMerge<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    SortMerge {
        state: SortState::Pending(input.into_iter()),
        key: key.into(),
        ascending,
        chunk_size,
        scratch: scratch.clone(),
    }
}

impl<I> SortMerge<I>
where
    I: Iterator<Item = Result<Record>>,
{
    fn sort(&self, input: I) -> Result<Option<RecordReader>> {
        let runs = make_runs(input, &self.key, self.ascending, self.chunk_size, &self.scratch)?;
        debug!(runs = runs.len(), key = %self.key, "generated sorted runs");

        let mut runs = runs.into_iter();
        let Some(mut acc) = runs.next() else {
            return Ok(None);
        };
        for run in runs {
            acc = merge(acc, run, &self.key, self.ascending, &self.scratch)?;
        }
        acc.into_reader().map(Some)
    }
}

impl<I> Iterator for SortMerge<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let SortState::Pending(_) = self.state
            && let SortState::Pending(input) = std::mem::replace(&mut self.state, SortState::Done)
        {
            match self.sort(input) {
                Ok(Some(reader)) => self.state = SortState::Streaming(reader),
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }

        let SortState::Streaming(reader) = &mut self.state else {
            return None;
        };
        match reader.next() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.state = SortState::Done;
                Some(Err(e))
            }
            None => {
                self.state = SortState::Done;
                None
            }
        }
    }
}
