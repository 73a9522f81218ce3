// src/pipeline.rs

use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::extract::extract_table;
use crate::fetch::Fetcher;
use crate::load::{csv::write_csv, sqlite::Store};
use crate::progress::ProgressLog;
use crate::query::{render_statement, run_query, QueryOutput};
use crate::transform::{self, ExchangeRates};

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub rows: usize,
    pub fields: Vec<String>,
    pub queries: Vec<QueryOutput>,
}

/// Run the whole pass, printing query results to stdout.
pub fn run(cfg: &PipelineConfig) -> Result<RunSummary> {
    let fetcher = Fetcher::new(cfg.timeout())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with(cfg, &fetcher, &mut out)
}

/// Extract → transform → CSV → SQLite → queries, logging each milestone.
///
/// Any failure ends the run; the store handle is released on every path.
#[instrument(level = "info", skip_all, fields(dataset = %cfg.dataset_variant, table = %cfg.table_name))]
pub fn run_with<W: Write>(cfg: &PipelineConfig, fetcher: &Fetcher, out: &mut W) -> Result<RunSummary> {
    let spec = &cfg.dataset;
    let progress = ProgressLog::new(&cfg.log_path);

    progress.log("Preliminaries complete. Initiating ETL process")?;

    let html = fetcher
        .get_text(&cfg.source_url)
        .with_context(|| format!("fetching source page {}", cfg.source_url))?;
    let mut table = extract_table(&html, &spec.locator, &spec.row_rule, &spec.columns)?;
    let extracted = table.len();
    info!(rows = extracted, "extracted");

    progress.log("Data extraction complete. Initiating Transformation process")?;

    let rates = if spec.transform.needs_rates() {
        let location = cfg
            .rate_table_path
            .as_deref()
            .context("no exchange-rate table configured")?;
        let text = fetcher
            .get_text(location)
            .with_context(|| format!("fetching exchange rates {}", location))?;
        let rates = ExchangeRates::from_csv_str(&text)?;
        if rates.is_empty() {
            warn!(location, "exchange-rate table has no rows");
        }
        info!(currencies = rates.len(), "loaded exchange rates");
        Some(rates)
    } else {
        None
    };
    transform::apply(&mut table, &spec.transform, rates.as_ref())?;
    if table.len() != extracted {
        bail!("transform changed row count {} -> {}", extracted, table.len());
    }

    if let Some(p) = &spec.preview {
        match table.get(p.row, &p.field) {
            Some(v) => writeln!(out, "{}[{}] = {}", p.field, p.row, v)?,
            None => warn!(row = p.row, field = %p.field, "preview cell not present"),
        }
    }

    progress.log("Data transformation complete. Initiating loading process")?;

    write_csv(&table, &cfg.csv_output_path)?;
    progress.log("Data saved to CSV file")?;

    let mut store = Store::open(&cfg.db_path)?;
    progress.log("SQL Connection initiated.")?;

    store.replace_table(&cfg.table_name, &table)?;
    progress.log("Data loaded to Database as table. Running the query")?;

    let mut outputs = Vec::new();
    if cfg.run_queries {
        for template in &spec.queries {
            let statement = render_statement(template, &cfg.table_name);
            writeln!(out, "{}", statement)?;
            let output = run_query(store.connection(), &statement)?;
            writeln!(out, "{}", output)?;
            outputs.push(output);
        }
    }

    progress.log("Process Complete.")?;
    store.close()?;

    Ok(RunSummary {
        rows: table.len(),
        fields: table.field_names().into_iter().map(str::to_string).collect(),
        queries: outputs,
    })
}
