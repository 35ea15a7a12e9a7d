//! Nested-loop cross product and theta-join.
//!
//! The right input is drained into a scratch run the first time the join is
//! pulled. Every left record then gets its own fresh reader over that run.
//! The run is deleted once the join is exhausted, fails, or is dropped.

use tracing::debug;

use crate::error::Result;
use crate::storage::{RecordReader, ScratchDir, ScratchFile};
use crate::types::Record;

use super::predicate::{Predicates, matches};

/// Nested-loop join of two record streams. Created by [`cross_product`]
/// and [`theta_inner_join`].
pub struct NestedLoopJoin<L, R> {
    left: L,
    right: Option<R>,
    predicates: Predicates,
    scratch: ScratchDir,
    prefix: &'static str,
    run: Option<ScratchFile>,
    current: Option<(Record, RecordReader)>,
    done: bool,
}

/// Every (left, right) pair, left-outer and right-inner.
///
/// Each output record holds the left fields followed by the right ones; a
/// right field with the same name as a left field overwrites its value.
pub fn cross_product<L, R>(
    left: L,
    right: R,
    scratch: &ScratchDir,
) -> NestedLoopJoin<L::IntoIter, R>
where
    L: IntoIterator<Item = Result<Record>>,
    R: IntoIterator<Item = Result<Record>>,
{
    NestedLoopJoin::new(left.into_iter(), right, Vec::new(), scratch, "cross_product")
}

/// The cross product restricted to combined records matching `predicates`.
pub fn theta_inner_join<L, R>(
    left: L,
    right: R,
    predicates: Predicates,
    scratch: &ScratchDir,
) -> NestedLoopJoin<L::IntoIter, R>
where
    L: IntoIterator<Item = Result<Record>>,
    R: IntoIterator<Item = Result<Record>>,
{
    NestedLoopJoin::new(left.into_iter(), right, predicates, scratch, "theta_inner_join")
}

impl<L, R> NestedLoopJoin<L, R>
where
    L: Iterator<Item = Result<Record>>,
    R: IntoIterator<Item = Result<Record>>,
{
    fn new(
        left: L,
        right: R,
        predicates: Predicates,
        scratch: &ScratchDir,
        prefix: &'static str,
    ) -> Self {
        Self {
            left,
            right: Some(right),
            predicates,
            scratch: scratch.clone(),
            prefix,
            run: None,
            current: None,
            done: false,
        }
    }

    fn fail(&mut self, err: crate::error::Error) -> Option<Result<Record>> {
        self.done = true;
        self.current = None;
        self.run = None;
        Some(Err(err))
    }

    fn materialize_right(&mut self) -> Result<()> {
        if let Some(right) = self.right.take() {
            let (run, records) = self.scratch.materialize(self.prefix, right)?;
            debug!(records, prefix = self.prefix, "materialized right join input");
            self.run = Some(run);
        }
        Ok(())
    }
}

impl<L, R> Iterator for NestedLoopJoin<L, R>
where
    L: Iterator<Item = Result<Record>>,
    R: IntoIterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.materialize_right() {
            return self.fail(e);
        }

        loop {
            if let Some((left, reader)) = &mut self.current {
                match reader.next() {
                    Some(Ok(right)) => {
                        let combined = combine(left, right);
                        match matches(&combined, &self.predicates) {
                            Ok(true) => return Some(Ok(combined)),
                            Ok(false) => continue,
                            Err(e) => return self.fail(e),
                        }
                    }
                    Some(Err(e)) => return self.fail(e),
                    None => self.current = None,
                }
            }

            match self.left.next() {
                None => {
                    self.done = true;
                    self.run = None;
                    return None;
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(left)) => {
                    let reader = match self.run.as_ref().map(ScratchFile::reader) {
                        Some(Ok(reader)) => reader,
                        Some(Err(e)) => return self.fail(e),
                        None => {
                            self.done = true;
                            return None;
                        }
                    };
                    self.current = Some((left, reader));
                }
            }
        }
    }
}

/// Union of two records; right-hand values win on shared names.
fn combine(left: &Record, right: Record) -> Record {
    let mut out = left.clone();
    for (name, value) in right {
        out.insert(name, value);
    }
    out
}
