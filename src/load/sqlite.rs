// src/load/sqlite.rs

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::table::{FieldKind, ResultTable, Value};

/// Exclusively-owned handle on the single-file SQLite store.
///
/// Dropping the store closes the connection; `close` does it explicitly and
/// surfaces any error.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
        }
        let conn = Connection::open(path).with_context(|| format!("opening database {:?}", path))?;
        debug!("opened database {}", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Drop `name` if present, recreate it from `table`'s fields and insert
    /// every row, all in one transaction.
    #[instrument(level = "info", skip(self, table), fields(rows = table.len()))]
    pub fn replace_table(&mut self, name: &str, table: &ResultTable) -> Result<()> {
        let columns = table
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.kind)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=table.fields().len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction().context("starting load transaction")?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name};\nCREATE TABLE {name} ({columns});",
            name = quote_ident(name),
            columns = columns
        ))
        .with_context(|| format!("recreating table {}", name))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_ident(name),
                placeholders
            ))?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))
                    .with_context(|| format!("inserting into {}", name))?;
            }
        }
        tx.commit().context("committing load transaction")?;
        info!(table = name, "loaded table");
        Ok(())
    }

    /// Number of rows currently in `name`.
    pub fn count_rows(&self, name: &str) -> Result<i64> {
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(name)), [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("closing database")
    }
}

fn sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "TEXT",
        FieldKind::Number => "REAL",
    }
}

fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => SqlValue::Real(*n),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Missing => SqlValue::Null,
    }
}

/// Double-quote an identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
