// src/progress.rs

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};
use tracing::info;

/// `Year-AbbreviatedMonth-Day-Hour:Minute:Second`, e.g. `2023-Sep-02-18:53:26`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%b-%d-%H:%M:%S";
pub const SEPARATOR: &str = " : ";

/// Append-only milestone log. The file is opened and closed on every call.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn log(&self, message: &str) -> Result<()> {
        info!(milestone = message, "progress");
        self.append(&format_line(Local::now().naive_local(), message))
    }

    fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening progress log {:?}", self.path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("appending to progress log {:?}", self.path))?;
        Ok(())
    }
}

pub fn format_line(at: NaiveDateTime, message: &str) -> String {
    format!("{}{}{}", at.format(TIMESTAMP_FORMAT), SEPARATOR, message)
}
