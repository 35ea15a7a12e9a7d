use std::io::Write;

use serde_json::{Value, json};
use spooldb_core::types::TableSchema;

use crate::commands::{CliResult, CommandResult};

/// Output mode for rendering command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable output.
    Pretty,
    /// Machine-parseable JSON, one object per line on stdout.
    Json,
}

/// Render a command result to `out` in the given mode.
///
/// Query records are written as they are pulled, so an error midway leaves
/// the records already printed in place and is returned to the caller.
pub fn render(result: CommandResult, mode: OutputMode, out: &mut impl Write) -> CliResult<()> {
    match result {
        CommandResult::Ok(msg) => match mode {
            OutputMode::Pretty => writeln!(out, "{msg}")?,
            OutputMode::Json => writeln!(out, "{}", json!({"ok": true, "message": msg}))?,
        },
        CommandResult::Names(kind, names) => match mode {
            OutputMode::Pretty => print_names(out, kind, &names)?,
            OutputMode::Json => {
                let mut obj = serde_json::Map::new();
                obj.insert(kind.to_string(), json!(names));
                writeln!(out, "{}", Value::Object(obj))?
            }
        },
        CommandResult::Schema(table, schema) => match mode {
            OutputMode::Pretty => print_table_schema(out, &table, &schema)?,
            OutputMode::Json => writeln!(out, "{}", json!({"table": table, "schema": schema}))?,
        },
        CommandResult::Records(stream) => {
            let mut n = 0usize;
            for record in stream {
                writeln!(out, "{}", Value::Object(record?))?;
                n += 1;
            }
            if mode == OutputMode::Pretty {
                writeln!(out, "{n} record(s)")?;
            }
        }
    }
    Ok(())
}

fn print_names(out: &mut impl Write, kind: &str, names: &[String]) -> CliResult<()> {
    if names.is_empty() {
        writeln!(out, "No {kind}.")?;
    }
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn print_table_schema(out: &mut impl Write, table: &str, schema: &TableSchema) -> CliResult<()> {
    writeln!(out, "Table: {table}")?;
    if schema.is_empty() {
        writeln!(out, "  (no declared fields)")?;
    }
    for (name, ty) in schema {
        writeln!(out, "  {name}: {ty}")?;
    }
    Ok(())
}
