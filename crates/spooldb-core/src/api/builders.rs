use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::query::{self, AggregateSpec, Predicate, Predicates};
use crate::types::{Record, ScalarType, TableSchema};

use super::database::Database;

/// A boxed lazy record stream, as produced by [`QueryBuilder::execute`].
pub type RecordStream = Box<dyn Iterator<Item = Result<Record>>>;

// ---------------------------------------------------------------------------
// TableBuilder
// ---------------------------------------------------------------------------

/// Builder for creating a new table.
pub struct TableBuilder<'a> {
    db: &'a Database,
    name: String,
    schema: TableSchema,
}

impl<'a> TableBuilder<'a> {
    pub(crate) fn new(db: &'a Database, name: String) -> Self {
        Self {
            db,
            name,
            schema: TableSchema::new(),
        }
    }

    /// Declare a field. Fields keep the order they are declared in.
    pub fn field(mut self, name: &str, ty: ScalarType) -> Self {
        self.schema.insert(name.to_string(), ty);
        self
    }

    /// Declare every field of `schema`, after any already declared.
    pub fn schema(mut self, schema: TableSchema) -> Self {
        self.schema.extend(schema);
        self
    }

    /// Execute the table creation.
    pub fn execute(self) -> Result<()> {
        self.db.create_table_with_schema(&self.name, self.schema)
    }
}

// ---------------------------------------------------------------------------
// UpdateBuilder
// ---------------------------------------------------------------------------

/// Builder for rewriting matching records of a table.
pub struct UpdateBuilder<'a> {
    db: &'a Database,
    table: String,
    assignments: Record,
    predicates: Predicates,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(db: &'a Database, table: String) -> Self {
        Self {
            db,
            table,
            assignments: Record::new(),
            predicates: Vec::new(),
        }
    }

    /// Assign `value` to `field` on every matching record.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.assignments.insert(field.to_string(), value.into());
        self
    }

    /// Add every assignment of `assignments`.
    pub fn assignments(mut self, assignments: Record) -> Self {
        self.assignments.extend(assignments);
        self
    }

    /// Restrict the update to records matching `predicate` (AND-ed with
    /// earlier filters).
    pub fn filter(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Execute the update, returning the number of updated records.
    pub fn execute(self) -> Result<usize> {
        self.db
            .update_record(&self.table, &self.assignments, &self.predicates)
    }
}

// ---------------------------------------------------------------------------
// DeleteBuilder
// ---------------------------------------------------------------------------

/// Builder for deleting matching records of a table.
pub struct DeleteBuilder<'a> {
    db: &'a Database,
    table: String,
    predicates: Predicates,
}

impl<'a> DeleteBuilder<'a> {
    pub(crate) fn new(db: &'a Database, table: String) -> Self {
        Self {
            db,
            table,
            predicates: Vec::new(),
        }
    }

    /// Restrict the delete to records matching `predicate`. Without any
    /// filter every record is deleted.
    pub fn filter(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Execute the delete, returning the number of deleted records.
    pub fn execute(self) -> Result<usize> {
        self.db.delete_record(&self.table, &self.predicates)
    }
}

// ---------------------------------------------------------------------------
// QueryBuilder
// ---------------------------------------------------------------------------

/// Builder for a read pipeline over one or more tables.
///
/// Stages run in a fixed order regardless of the order the builder methods
/// are called in: cross products, joins, filter, group-by, projection,
/// sort, limit.
pub struct QueryBuilder<'a> {
    db: &'a Database,
    table: String,
    crosses: Vec<String>,
    joins: Vec<(String, Predicates)>,
    predicates: Predicates,
    group_by: Option<Vec<String>>,
    aggregates: Vec<AggregateSpec>,
    projection: Option<Vec<String>>,
    sort: Option<(String, bool)>,
    chunk_size: Option<usize>,
    limit: Option<usize>,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(db: &'a Database, table: String) -> Self {
        Self {
            db,
            table,
            crosses: Vec::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: None,
            aggregates: Vec::new(),
            projection: None,
            sort: None,
            chunk_size: None,
            limit: None,
        }
    }

    /// Cross the pipeline with every record of `table`.
    pub fn cross(mut self, table: &str) -> Self {
        self.crosses.push(table.to_string());
        self
    }

    /// Join with `table`, keeping combined records that match `on`.
    pub fn join(mut self, table: &str, on: Predicates) -> Self {
        self.joins.push((table.to_string(), on));
        self
    }

    pub fn filter(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Group by `fields`. Without aggregates, emits the distinct keys.
    pub fn group_by(mut self, fields: Vec<String>) -> Self {
        self.group_by = Some(fields);
        self
    }

    /// Add an aggregate column. Aggregates without `group_by` fold over the
    /// whole input as a single group, and an empty input fails with
    /// `EmptyAggregate`.
    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    pub fn project(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    pub fn sort_by(mut self, key: &str, ascending: bool) -> Self {
        self.sort = Some((key.to_string(), ascending));
        self
    }

    /// Override the sort batch size for this query.
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Assemble the pipeline.
    ///
    /// Every referenced table is opened here, so missing tables fail now;
    /// everything else happens as the returned stream is pulled.
    pub fn execute(self) -> Result<RecordStream> {
        let db = self.db;
        let scratch = db.scratch();
        let mut stream: RecordStream = Box::new(db.scan(&self.table)?);

        for table in &self.crosses {
            let right = db.scan(table)?;
            stream = Box::new(query::cross_product(stream, right, scratch));
        }
        for (table, on) in self.joins {
            let right = db.scan(&table)?;
            stream = Box::new(query::theta_inner_join(stream, right, on, scratch));
        }
        if !self.predicates.is_empty() {
            stream = Box::new(query::select(stream, self.predicates));
        }
        match self.group_by {
            Some(group_by) => {
                stream = Box::new(query::group_by_and_aggregate(
                    stream,
                    group_by,
                    self.aggregates,
                    scratch,
                ));
            }
            None if !self.aggregates.is_empty() => {
                stream = Box::new(query::aggregate_all(stream, self.aggregates, scratch));
            }
            None => {}
        }
        if let Some(fields) = self.projection {
            stream = Box::new(query::project(stream, fields));
        }
        if let Some((key, ascending)) = self.sort {
            let chunk_size = self.chunk_size.unwrap_or(db.chunk_size());
            stream = Box::new(query::sort_merge(stream, key, ascending, chunk_size, scratch));
        }
        if let Some(n) = self.limit {
            stream = Box::new(stream.take(n));
        }

        debug!(db = %db.name(), table = %self.table, "assembled query pipeline");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{Engine, FilterExpr};
    use crate::config::EngineConfig;
    use crate::error::{ErrorKind, Result};
    use crate::query::Aggregator;
    use crate::types::{Record, ScalarType};
    use serde_json::json;
    use tempfile::tempdir;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    fn setup() -> (Engine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = Engine::new(EngineConfig::for_testing(dir.path().join("dbs"))).unwrap();
        let db = engine.create_database("shop").unwrap();
        db.create_table("users")
            .field("uid", ScalarType::Int)
            .field("name", ScalarType::Str)
            .execute()
            .unwrap();
        db.create_table("orders")
            .field("owner", ScalarType::Int)
            .field("total", ScalarType::Float)
            .execute()
            .unwrap();
        for (uid, name) in [(1, "ann"), (2, "bob"), (3, "cy")] {
            db.insert_record("users", &rec(json!({"uid": uid, "name": name})))
                .unwrap();
        }
        for (owner, total) in [(1, 5.0), (2, 7.5), (1, 2.5), (3, 1.0), (2, 0.5)] {
            db.insert_record("orders", &rec(json!({"owner": owner, "total": total})))
                .unwrap();
        }
        (engine, dir)
    }

    #[test]
    fn test_update_and_delete_builders() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let n = db
            .update("users")
            .set("name", "bea")
            .filter(FilterExpr::eq(FilterExpr::field("uid"), FilterExpr::literal(2)))
            .execute()
            .unwrap();
        assert_eq!(n, 1);
        let n = db
            .delete("orders")
            .filter(FilterExpr::lt(FilterExpr::field("total"), FilterExpr::literal(2)))
            .execute()
            .unwrap();
        assert_eq!(n, 2);

        let names: Vec<Record> = db.scan("users").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(names[1], rec(json!({"uid": 2, "name": "bea"})));
    }

    #[test]
    fn test_query_join_group_sort_pipeline() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let out: Vec<Record> = db
            .query("users")
            .join(
                "orders",
                vec![Box::new(FilterExpr::eq(
                    FilterExpr::field("uid"),
                    FilterExpr::field("owner"),
                ))],
            )
            .group_by(vec!["name".into()])
            .aggregate(Aggregator::Sum.over("total"))
            .sort_by("total", false)
            .execute()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            out,
            vec![
                rec(json!({"name": "bob", "total": 8.0})),
                rec(json!({"name": "ann", "total": 7.5})),
                rec(json!({"name": "cy", "total": 1.0})),
            ]
        );
        assert_eq!(std::fs::read_dir(db.scratch().path()).unwrap().count(), 0);
    }

    #[test]
    fn test_query_filter_project_limit() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let out: Vec<Record> = db
            .query("orders")
            .filter(FilterExpr::eq(FilterExpr::field("owner"), FilterExpr::literal(1)))
            .project(vec!["total".into()])
            .limit(1)
            .execute()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out, vec![rec(json!({"total": 5.0}))]);
    }

    #[test]
    fn test_query_cross_counts() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let n = db.query("users").cross("orders").execute().unwrap().count();
        assert_eq!(n, 15);
    }

    #[test]
    fn test_query_aggregate_without_group() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let out: Vec<Record> = db
            .query("orders")
            .aggregate(Aggregator::Max.over("total"))
            .execute()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out, vec![rec(json!({"total": 7.5}))]);
    }

    #[test]
    fn test_query_aggregate_without_group_on_empty_table_fails() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        db.create_table("empty").execute().unwrap();
        let mut out = db
            .query("empty")
            .aggregate(Aggregator::Sum.over("n"))
            .execute()
            .unwrap();
        let err = out.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyAggregate);
        assert!(out.next().is_none());
    }

    #[test]
    fn test_query_missing_table_fails_up_front() {
        let (engine, _dir) = setup();
        let db = engine.open("shop").unwrap();
        let err = db.query("users").cross("ghost").execute().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
