//! Relational operators over lazy record streams.
//!
//! Every operator takes its inputs as `IntoIterator<Item = Result<Record>>`
//! and is itself such an iterator, so operators compose by nesting. Work
//! happens on pull; an error is yielded once and ends the stream.

pub mod aggregate;
pub mod join;
pub mod predicate;
pub mod select;
pub mod sort;

pub use aggregate::{
    AggregateSpec, Aggregator, Fold, GroupAggregate, aggregate, aggregate_all,
    group_by_and_aggregate,
};
pub use join::{NestedLoopJoin, cross_product, theta_inner_join};
pub use predicate::{Predicate, Predicates, matches, predicate};
pub use select::{Project, Select, project, select};
pub use sort::{SortMerge, make_runs, merge, sort_merge};
