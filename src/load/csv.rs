// src/load/csv.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{fs::File, io::Write, path::Path};
use tracing::{info, instrument};

use crate::table::ResultTable;

/// Write `table` to `path`, truncating any existing file.
///
/// The first column is the unnamed 0-based row ordinal.
#[instrument(level = "info", skip(table, path), fields(path = %path.as_ref().display()))]
pub fn write_csv<P: AsRef<Path>>(table: &ResultTable, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("creating CSV file {:?}", path))?;
    write_table(table, file).with_context(|| format!("writing CSV file {:?}", path))?;
    info!(rows = table.len(), "wrote CSV");
    Ok(())
}

/// Serialise `table` to any writer.
pub fn write_table<W: Write>(table: &ResultTable, out: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(out);

    let mut header = vec![String::new()];
    header.extend(table.field_names().into_iter().map(str::to_string));
    wtr.write_record(&header)?;

    for (i, row) in table.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(i.to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
