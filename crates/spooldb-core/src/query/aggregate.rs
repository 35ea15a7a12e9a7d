//! Folding aggregates and group-by over scratch partitions.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, trace};
use xxhash_rust::xxh64::xxh64;

use crate::api::filter::compare_values;
use crate::error::{Error, QueryError, Result};
use crate::storage::{ScratchDir, ScratchFile};
use crate::types::{Record, field};

/// A binary fold step: combine the accumulator with the next value.
pub trait Fold {
    fn fold(&self, acc: Value, next: Value) -> Result<Value>;
}

impl<F> Fold for F
where
    F: Fn(Value, Value) -> Result<Value>,
{
    fn fold(&self, acc: Value, next: Value) -> Result<Value> {
        self(acc, next)
    }
}

/// Built-in fold functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    Sum,
    Min,
    Max,
}

impl Aggregator {
    /// Pair this aggregator with the field it folds.
    pub fn over(self, name: impl Into<String>) -> AggregateSpec {
        (name.into(), Box::new(self))
    }
}

impl Fold for Aggregator {
    fn fold(&self, acc: Value, next: Value) -> Result<Value> {
        match self {
            Aggregator::Sum => sum(acc, next),
            Aggregator::Min => pick(acc, next, std::cmp::Ordering::Less),
            Aggregator::Max => pick(acc, next, std::cmp::Ordering::Greater),
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregator::Sum => "sum",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
        };
        f.write_str(name)
    }
}

impl FromStr for Aggregator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregator::Sum),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            other => {
                Err(QueryError::InvalidAggregate(format!("unknown aggregator '{other}'")).into())
            }
        }
    }
}

fn sum(acc: Value, next: Value) -> Result<Value> {
    let (Value::Number(a), Value::Number(b)) = (&acc, &next) else {
        return Err(QueryError::InvalidAggregate(format!("cannot sum {acc} and {next}")).into());
    };
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.checked_add(y).map(Value::from).ok_or_else(|| {
            QueryError::InvalidAggregate(format!("integer overflow in {x} + {y}")).into()
        });
    }
    let total = a.as_f64().zip(b.as_f64()).map(|(x, y)| x + y);
    total
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            QueryError::InvalidAggregate(format!("non-finite sum of {acc} and {next}")).into()
        })
}

/// Keep `acc` unless `next` orders `wanted` relative to it.
fn pick(acc: Value, next: Value, wanted: std::cmp::Ordering) -> Result<Value> {
    match compare_values(&next, &acc) {
        Some(ord) if ord == wanted => Ok(next),
        Some(_) => Ok(acc),
        None => {
            Err(QueryError::InvalidAggregate(format!("cannot compare {acc} and {next}")).into())
        }
    }
}

/// Left-fold the values of `name` across a stream, seeded with the first.
///
/// There is no identity element: an empty stream fails with
/// `EmptyAggregate`.
pub fn aggregate<I, F>(input: I, name: &str, fold: &F) -> Result<Value>
where
    I: IntoIterator<Item = Result<Record>>,
    F: Fold + ?Sized,
{
    let mut acc: Option<Value> = None;
    for record in input {
        let record = record?;
        let value = field(&record, name)?.clone();
        acc = Some(match acc {
            None => value,
            Some(acc) => fold.fold(acc, value)?,
        });
    }
    acc.ok_or_else(|| QueryError::EmptyAggregate(name.to_string()).into())
}

/// One aggregate output column: the field to fold and the fold to apply.
pub type AggregateSpec = (String, Box<dyn Fold>);

struct Partition {
    key: Record,
    file: ScratchFile,
}

/// Group-by-and-aggregate over a record stream. Created by
/// [`group_by_and_aggregate`].
///
/// The input is partitioned on the first pull, one scratch file per
/// distinct key. Groups are emitted in first-seen order and each
/// partition is deleted right after its group is emitted; whatever is left
/// goes when the operator is dropped.
pub struct GroupAggregate<I> {
    input: Option<I>,
    group_by: Vec<String>,
    aggregates: Vec<AggregateSpec>,
    scratch: ScratchDir,
    pending: VecDeque<Partition>,
    whole_input: bool,
    done: bool,
}

pub fn group_by_and_aggregate<I>(
    input: I,
    group_by: Vec<String>,
    aggregates: Vec<AggregateSpec>,
    scratch: &ScratchDir,
) -> GroupAggregate<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    GroupAggregate {
        input: Some(input.into_iter()),
        group_by,
        aggregates,
        scratch: scratch.clone(),
        pending: VecDeque::new(),
        whole_input: false,
        done: false,
    }
}

/// Fold every aggregate over the whole input, yielding exactly one record.
///
/// Unlike a grouping with no key fields, an empty input is an error
/// (`EmptyAggregate`), matching [`aggregate`].
pub fn aggregate_all<I>(
    input: I,
    aggregates: Vec<AggregateSpec>,
    scratch: &ScratchDir,
) -> GroupAggregate<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    GroupAggregate {
        whole_input: true,
        ..group_by_and_aggregate(input, Vec::new(), aggregates, scratch)
    }
}

impl<I> GroupAggregate<I>
where
    I: Iterator<Item = Result<Record>>,
{
    fn partition(&mut self, input: I) -> Result<()> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut records = 0usize;
        for record in input {
            let record = record?;
            let key = self.group_key(&record)?;
            let canonical = serde_json::to_string(&key).map_err(std::io::Error::from)?;
            let slot = match index.get(&canonical) {
                Some(&slot) => slot,
                None => {
                    let digest = xxh64(canonical.as_bytes(), 0);
                    let file = self
                        .scratch
                        .create(&format!("group_by_and_aggregate_{digest:016x}"))?;
                    trace!(key = %canonical, path = %file.path().display(), "new group partition");
                    self.pending.push_back(Partition { key, file });
                    index.insert(canonical, self.pending.len() - 1);
                    self.pending.len() - 1
                }
            };
            self.pending[slot].file.append(&record)?;
            records += 1;
        }
        debug!(records, groups = self.pending.len(), "partitioned group-by input");
        if self.whole_input && self.pending.is_empty() {
            let name = self.aggregates.first().map(|(name, _)| name.clone());
            return Err(QueryError::EmptyAggregate(name.unwrap_or_default()).into());
        }
        Ok(())
    }

    fn group_key(&self, record: &Record) -> Result<Record> {
        let mut key = Record::new();
        for name in &self.group_by {
            key.insert(name.clone(), field(record, name)?.clone());
        }
        Ok(key)
    }

    fn emit(&self, partition: &Partition) -> Result<Record> {
        let mut out = partition.key.clone();
        for (name, fold) in &self.aggregates {
            let value = aggregate(partition.file.reader()?, name, fold.as_ref())?;
            out.insert(name.clone(), value);
        }
        Ok(out)
    }
}

impl<I> Iterator for GroupAggregate<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(input) = self.input.take()
            && let Err(e) = self.partition(input)
        {
            self.done = true;
            self.pending.clear();
            return Some(Err(e));
        }

        let Some(partition) = self.pending.pop_front() else {
            self.done = true;
            return None;
        };
        let result = self.emit(&partition);
        drop(partition);
        if result.is_err() {
            self.done = true;
            self.pending.clear();
        }
        Some(result)
    }
}
