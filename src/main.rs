use anyhow::Result;
use clap::Parser;
use econ_etl::{
    config::{ConfigOverrides, DatasetVariant},
    pipeline,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Scrape a ranked table of economic entities, normalise its monetary
/// column, and load it into CSV and SQLite.
#[derive(Parser, Debug)]
#[command(name = "econ_etl", version)]
struct Cli {
    /// Dataset preset: countries or banks.
    #[arg(long, env = "ETL_DATASET")]
    dataset: Option<DatasetVariant>,

    /// YAML file overriding preset fields.
    #[arg(long, env = "ETL_CONFIG")]
    config: Option<PathBuf>,

    /// Page to scrape: an http(s) URL or a saved HTML file.
    #[arg(long, env = "ETL_SOURCE_URL")]
    source_url: Option<String>,

    /// `Currency,Rate` CSV (path or URL), banks only.
    #[arg(long, env = "ETL_RATE_TABLE")]
    rate_table: Option<String>,

    #[arg(long, env = "ETL_CSV_PATH")]
    csv_path: Option<PathBuf>,

    #[arg(long, env = "ETL_DB_PATH")]
    db_path: Option<PathBuf>,

    #[arg(long, env = "ETL_LOG_PATH")]
    log_path: Option<PathBuf>,

    #[arg(long, env = "ETL_TABLE_NAME")]
    table_name: Option<String>,

    /// HTTP request timeout.
    #[arg(long, env = "ETL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Load only; skip the verification queries.
    #[arg(long, default_value_t = false)]
    skip_queries: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            dataset_variant: self.dataset,
            source_url: self.source_url.clone(),
            rate_table_path: self.rate_table.clone(),
            csv_output_path: self.csv_path.clone(),
            db_path: self.db_path.clone(),
            log_path: self.log_path.clone(),
            table_name: self.table_name.clone(),
            timeout_secs: self.timeout_secs,
            run_queries: self.skip_queries.then_some(false),
            dataset: None,
        }
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => ConfigOverrides::from_yaml_file(path)?,
        None => ConfigOverrides::default(),
    };
    let cfg = file.merge(cli.overrides()).resolve()?;
    info!(dataset = %cfg.dataset_variant, source = %cfg.source_url, "startup");

    let summary = pipeline::run(&cfg)?;
    info!(
        rows = summary.rows,
        queries = summary.queries.len(),
        csv = %cfg.csv_output_path.display(),
        db = %cfg.db_path.display(),
        "all done"
    );
    Ok(())
}
