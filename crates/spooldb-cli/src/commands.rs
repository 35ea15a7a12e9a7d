use std::str::FromStr;

use clap::{Args, Subcommand};
use serde_json::Value;
use spooldb_core::api::{Engine, FilterExpr, RecordStream};
use spooldb_core::query::{AggregateSpec, Aggregator, Predicates};
use spooldb_core::types::{Record, TableSchema};
use thiserror::Error;

/// One-shot commands understood by the CLI.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty database.
    CreateDb { db: String },

    /// Remove a database and all of its tables.
    DropDb { db: String },

    /// List databases under the root directory.
    ListDbs,

    /// Create a table, e.g. `create-table shop orders '{"item":"str","qty":"int"}'`.
    CreateTable {
        db: String,
        table: String,
        /// JSON object mapping field names to int, float, bool or str.
        schema: String,
    },

    /// Drop a table and its backing file.
    DropTable { db: String, table: String },

    /// List the tables of a database in creation order.
    ListTables { db: String },

    /// Show the declared schema of a table.
    Describe { db: String, table: String },

    /// Append one record to a table.
    Insert {
        db: String,
        table: String,
        /// JSON object of field values.
        record: String,
        /// Convert each value to the field's declared type first.
        #[arg(long)]
        coerce: bool,
    },

    /// Overwrite fields on every record matching the filter.
    Update {
        db: String,
        table: String,
        /// JSON object of field assignments.
        assignments: String,
        /// Filter expression as JSON.
        #[arg(long = "where")]
        filter: Option<String>,
    },

    /// Delete every record matching the filter.
    Delete {
        db: String,
        table: String,
        #[arg(long = "where")]
        filter: Option<String>,
    },

    /// Run a query pipeline and print the resulting records.
    Query(QueryArgs),
}

#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    pub db: String,
    pub table: String,

    /// Cross the stream with another table (repeatable).
    #[arg(long)]
    pub cross: Vec<String>,

    /// Join another table; each `--join` pairs with the `--on` at the same position.
    #[arg(long)]
    pub join: Vec<String>,

    /// Join condition as a JSON filter expression.
    #[arg(long)]
    pub on: Vec<String>,

    /// Filter expression as JSON.
    #[arg(long = "where")]
    pub filter: Option<String>,

    #[arg(long = "group-by")]
    pub group_by: Vec<String>,

    /// Aggregate as FIELD=sum|min|max (repeatable).
    #[arg(long = "agg")]
    pub aggregates: Vec<String>,

    /// Keep only these fields (repeatable).
    #[arg(long)]
    pub project: Vec<String>,

    /// Sort by this field.
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    pub desc: bool,

    #[arg(long)]
    pub limit: Option<usize>,
}

/// Outcome of a command, rendered by [`crate::display`].
pub enum CommandResult {
    /// Mutation succeeded.
    Ok(String),
    /// Database or table names; the label names the kind when the list is empty.
    Names(&'static str, Vec<String>),
    /// A table's declared schema.
    Schema(String, TableSchema),
    /// Lazily produced query output.
    Records(RecordStream),
}

#[derive(Debug, Error)]
pub enum CliError {
    /// Malformed command-line input.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Engine(#[from] spooldb_core::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> CliResult<T> {
    serde_json::from_str(text).map_err(|e| CliError::Usage(format!("invalid {what} JSON: {e}")))
}

fn parse_record(what: &str, text: &str) -> CliResult<Record> {
    match parse_json::<Value>(what, text)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Usage(format!(
            "{what} must be a JSON object, got {other}"
        ))),
    }
}

fn parse_filter(text: Option<&str>) -> CliResult<Option<FilterExpr>> {
    text.map(|t| parse_json("filter", t)).transpose()
}

/// Parse `FIELD=sum|min|max`.
fn parse_aggregate(text: &str) -> CliResult<AggregateSpec> {
    let Some((name, func)) = text.split_once('=') else {
        return Err(CliError::Usage(format!(
            "aggregate {text:?} must look like FIELD=sum|min|max"
        )));
    };
    if name.is_empty() {
        return Err(CliError::Usage(format!("aggregate {text:?} has no field")));
    }
    Ok(Aggregator::from_str(func)?.over(name))
}

impl Command {
    pub fn execute(self, engine: &Engine) -> CliResult<CommandResult> {
        match self {
            Command::CreateDb { db } => {
                engine.create_database(&db)?;
                Ok(CommandResult::Ok(format!("Database '{db}' created.")))
            }
            Command::DropDb { db } => {
                engine.drop_database(&db)?;
                Ok(CommandResult::Ok(format!("Database '{db}' dropped.")))
            }
            Command::ListDbs => Ok(CommandResult::Names("databases", engine.list_databases()?)),
            Command::CreateTable { db, table, schema } => {
                let schema: TableSchema = parse_json("schema", &schema)?;
                engine
                    .open(&db)?
                    .create_table(&table)
                    .schema(schema)
                    .execute()?;
                Ok(CommandResult::Ok(format!("Table '{table}' created.")))
            }
            Command::DropTable { db, table } => {
                engine.open(&db)?.drop_table(&table)?;
                Ok(CommandResult::Ok(format!("Table '{table}' dropped.")))
            }
            Command::ListTables { db } => {
                Ok(CommandResult::Names("tables", engine.open(&db)?.list_tables()?))
            }
            Command::Describe { db, table } => {
                let schema = engine.open(&db)?.describe_table(&table)?;
                Ok(CommandResult::Schema(table, schema))
            }
            Command::Insert {
                db,
                table,
                record,
                coerce,
            } => {
                let database = engine.open(&db)?;
                let mut record = parse_record("record", &record)?;
                if coerce {
                    record = database.coerce_record(&table, &record)?;
                }
                database.insert_record(&table, &record)?;
                Ok(CommandResult::Ok("1 record inserted.".to_string()))
            }
            Command::Update {
                db,
                table,
                assignments,
                filter,
            } => {
                let database = engine.open(&db)?;
                let mut update = database
                    .update(&table)
                    .assignments(parse_record("assignments", &assignments)?);
                if let Some(expr) = parse_filter(filter.as_deref())? {
                    update = update.filter(expr);
                }
                let n = update.execute()?;
                Ok(CommandResult::Ok(format!("{n} record(s) updated.")))
            }
            Command::Delete { db, table, filter } => {
                let database = engine.open(&db)?;
                let mut delete = database.delete(&table);
                if let Some(expr) = parse_filter(filter.as_deref())? {
                    delete = delete.filter(expr);
                }
                let n = delete.execute()?;
                Ok(CommandResult::Ok(format!("{n} record(s) deleted.")))
            }
            Command::Query(args) => args.execute(engine),
        }
    }
}

impl QueryArgs {
    fn execute(self, engine: &Engine) -> CliResult<CommandResult> {
        if self.join.len() != self.on.len() {
            return Err(CliError::Usage(format!(
                "{} --join table(s) but {} --on condition(s)",
                self.join.len(),
                self.on.len()
            )));
        }
        let database = engine.open(&self.db)?;
        let mut query = database.query(&self.table);
        for table in &self.cross {
            query = query.cross(table);
        }
        for (table, on) in self.join.iter().zip(&self.on) {
            let expr: FilterExpr = parse_json("join condition", on)?;
            let predicates: Predicates = vec![Box::new(expr)];
            query = query.join(table, predicates);
        }
        if let Some(expr) = parse_filter(self.filter.as_deref())? {
            query = query.filter(expr);
        }
        if !self.group_by.is_empty() {
            query = query.group_by(self.group_by);
        }
        for text in &self.aggregates {
            query = query.aggregate(parse_aggregate(text)?);
        }
        if !self.project.is_empty() {
            query = query.project(self.project);
        }
        if let Some(key) = &self.sort {
            query = query.sort_by(key, !self.desc);
        }
        if let Some(n) = self.limit {
            query = query.limit(n);
        }
        Ok(CommandResult::Records(query.execute()?))
    }
}
