// src/query.rs

use anyhow::{Context, Result};
use rusqlite::{types::ValueRef, Connection};
use std::fmt;
use tracing::{debug, instrument};

use crate::load::sqlite::quote_ident;
use crate::table::Value;

/// Materialised result of one read-only statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub statement: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Run `statement` and collect every row. SQL errors propagate.
#[instrument(level = "info", skip(conn))]
pub fn run_query(conn: &Connection, statement: &str) -> Result<QueryOutput> {
    let mut stmt = conn
        .prepare(statement)
        .with_context(|| format!("preparing `{}`", statement))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut out = Vec::with_capacity(width);
        for i in 0..width {
            out.push(from_sql(row.get_ref(i)?));
        }
        rows.push(out);
    }
    debug!(rows = rows.len(), "query complete");

    Ok(QueryOutput {
        statement: statement.to_string(),
        columns,
        rows,
    })
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Missing,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Number(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(format!("<{} bytes>", b.len())),
    }
}

/// Expand `{table}` in a query template, quoted the same way the sink creates it.
pub fn render_statement(template: &str, table: &str) -> String {
    template.replace("{table}", &quote_ident(table))
}

impl fmt::Display for QueryOutput {
    /// Right-aligned grid with a leading row ordinal, one line per row.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|v| match v {
                        Value::Missing => "NULL".to_string(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:>w$}", "", w = index_width)?;
        for (name, w) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", name, w = *w)?;
        }
        writeln!(f)?;
        for (i, row) in cells.iter().enumerate() {
            write!(f, "{:>w$}", i, w = index_width)?;
            for (cell, w) in row.iter().zip(&widths) {
                write!(f, "  {:>w$}", cell, w = *w)?;
            }
            writeln!(f)?;
        }
        if self.rows.is_empty() {
            writeln!(f, "(no rows)")?;
        }
        Ok(())
    }
}
