//! # SpoolDB
//!
//! A small relational engine over line-delimited JSON tables.
//!
//! Each database is a directory holding a one-line catalog
//! (`metadata.jsonl`) and one `<table>.jsonl` file per table. Queries are
//! lazy record streams threaded through operators (select, project, cross
//! product, theta-join, group-by, external sort) that spill to scratch
//! files instead of holding their inputs in memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use spooldb_core::api::{Engine, FilterExpr};
//! use spooldb_core::config::EngineConfig;
//! use spooldb_core::query::Aggregator;
//! use spooldb_core::types::ScalarType;
//! use serde_json::json;
//!
//! let engine = Engine::new(EngineConfig::with_root_dir("databases")).unwrap();
//! let db = engine.create_database("shop").unwrap();
//!
//! // Create a table
//! db.create_table("orders")
//!     .field("item", ScalarType::Str)
//!     .field("qty", ScalarType::Int)
//!     .execute()
//!     .unwrap();
//!
//! // Insert a record
//! let record = json!({"item": "pen", "qty": 3});
//! db.insert_record("orders", record.as_object().unwrap()).unwrap();
//!
//! // Total quantity per item, largest first
//! let totals = db
//!     .query("orders")
//!     .filter(FilterExpr::gt(FilterExpr::field("qty"), FilterExpr::literal(0)))
//!     .group_by(vec!["item".into()])
//!     .aggregate(Aggregator::Sum.over("qty"))
//!     .sort_by("qty", false)
//!     .execute()
//!     .unwrap();
//! for record in totals {
//!     println!("{}", serde_json::Value::Object(record.unwrap()));
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod storage;
pub mod types;
