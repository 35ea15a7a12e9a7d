//! Public API: engine and database handles, builders, filters.

pub mod builders;
pub mod database;
pub mod engine;
pub mod filter;
pub mod projection;
pub mod update;

pub use builders::{DeleteBuilder, QueryBuilder, RecordStream, TableBuilder, UpdateBuilder};
pub use database::Database;
pub use engine::Engine;
pub use filter::{FilterExpr, compare_values};
