// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use crate::extract::{ColumnSource, RowRule, TbodyIndex, MISSING_MARKER};
use crate::fetch::{remote_url, DEFAULT_TIMEOUT};
use crate::transform::{CurrencyTarget, TransformRule};

static COUNTRIES_URL: &str = "https://web.archive.org/web/20230902185326/https://en.wikipedia.org/wiki/List_of_countries_by_GDP_%28nominal%29";
static BANKS_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";
static EXCHANGE_RATE_URL: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetVariant {
    Countries,
    Banks,
}

impl DatasetVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetVariant::Countries => "countries",
            DatasetVariant::Banks => "banks",
        }
    }

    /// Layout, mapping, transform and queries for this dataset.
    pub fn spec(&self) -> DatasetSpec {
        match self {
            DatasetVariant::Countries => DatasetSpec {
                locator: TbodyIndex::new(2),
                row_rule: RowRule::LinkedWithValue {
                    link_cell: 0,
                    value_cell: 2,
                    missing_marker: MISSING_MARKER.to_string(),
                },
                columns: vec![
                    ColumnSource::new("Country", 0),
                    ColumnSource::new("GDP_USD_millions", 2),
                ],
                transform: TransformRule::Rescale {
                    field: "GDP_USD_millions".into(),
                    renamed_to: "GDP_USD_billions".into(),
                    divisor: 1000.0,
                },
                queries: vec!["SELECT * from {table} WHERE GDP_USD_billions >= 100".into()],
                preview: None,
            },
            DatasetVariant::Banks => DatasetSpec {
                locator: TbodyIndex::new(0),
                row_rule: RowRule::AcceptAll,
                columns: vec![
                    ColumnSource::new("Name", 1),
                    ColumnSource::new("MC_USD_Billion", 2),
                ],
                transform: TransformRule::Currency {
                    field: "MC_USD_Billion".into(),
                    targets: vec![
                        CurrencyTarget::new("EUR", "MC_EUR_Billion"),
                        CurrencyTarget::new("GBP", "MC_GBP_Billion"),
                        CurrencyTarget::new("INR", "MC_INR_Billion"),
                    ],
                },
                queries: vec![
                    "SELECT * FROM {table}".into(),
                    "SELECT AVG(MC_GBP_Billion) FROM {table}".into(),
                    "SELECT Name FROM {table} LIMIT 5".into(),
                ],
                preview: Some(Preview {
                    row: 4,
                    field: "MC_EUR_Billion".into(),
                }),
            },
        }
    }

    /// The run configuration the original course scripts hardcoded.
    pub fn defaults(&self) -> PipelineConfig {
        let (source_url, rate_table_path, csv, db, log, table) = match self {
            DatasetVariant::Countries => (
                COUNTRIES_URL,
                None,
                "./Countries_by_GDP.csv",
                "World_Economies.db",
                "./etl_project_log.txt",
                "Countries_by_GDP",
            ),
            DatasetVariant::Banks => (
                BANKS_URL,
                Some(EXCHANGE_RATE_URL.to_string()),
                "./Largest_banks_data.csv",
                "Banks.db",
                "./code_log.txt",
                "Largest_banks",
            ),
        };
        PipelineConfig {
            dataset_variant: *self,
            source_url: source_url.to_string(),
            rate_table_path,
            csv_output_path: PathBuf::from(csv),
            db_path: PathBuf::from(db),
            log_path: PathBuf::from(log),
            table_name: table.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            run_queries: true,
            dataset: self.spec(),
        }
    }
}

impl fmt::Display for DatasetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "countries" | "gdp" => Ok(DatasetVariant::Countries),
            "banks" => Ok(DatasetVariant::Banks),
            other => bail!("unknown dataset `{}` (expected `countries` or `banks`)", other),
        }
    }
}

/// Print one cell right after the transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub row: usize,
    pub field: String,
}

/// Declarative description of one source page and what to do with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub locator: TbodyIndex,
    pub row_rule: RowRule,
    pub columns: Vec<ColumnSource>,
    pub transform: TransformRule,
    /// SQL templates; `{table}` expands to the configured table name, double-quoted.
    pub queries: Vec<String>,
    #[serde(default)]
    pub preview: Option<Preview>,
}

/// Everything one run needs, resolved before the driver starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset_variant: DatasetVariant,
    pub source_url: String,
    pub rate_table_path: Option<String>,
    pub csv_output_path: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub table_name: String,
    pub timeout_secs: u64,
    pub run_queries: bool,
    pub dataset: DatasetSpec,
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            bail!("source_url is empty");
        }
        if self.table_name.trim().is_empty() {
            bail!("table_name is empty");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be positive");
        }
        if self.dataset.columns.is_empty() {
            bail!("dataset defines no columns");
        }
        if self.dataset.transform.needs_rates() && self.rate_table_path.is_none() {
            bail!("{} dataset needs rate_table_path", self.dataset_variant);
        }
        if self.source_url.starts_with("http") && remote_url(&self.source_url).is_none() {
            bail!("source_url `{}` is not a valid URL", self.source_url);
        }
        Ok(())
    }
}

/// Partial configuration, as read from a YAML file or assembled from CLI flags.
/// Set fields win over the dataset defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub dataset_variant: Option<DatasetVariant>,
    pub source_url: Option<String>,
    pub rate_table_path: Option<String>,
    pub csv_output_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub table_name: Option<String>,
    pub timeout_secs: Option<u64>,
    pub run_queries: Option<bool>,
    pub dataset: Option<DatasetSpec>,
}

impl ConfigOverrides {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {:?}", path))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            dataset_variant: other.dataset_variant.or(self.dataset_variant),
            source_url: other.source_url.or(self.source_url),
            rate_table_path: other.rate_table_path.or(self.rate_table_path),
            csv_output_path: other.csv_output_path.or(self.csv_output_path),
            db_path: other.db_path.or(self.db_path),
            log_path: other.log_path.or(self.log_path),
            table_name: other.table_name.or(self.table_name),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            run_queries: other.run_queries.or(self.run_queries),
            dataset: other.dataset.or(self.dataset),
        }
    }

    /// Resolve against the defaults of the chosen dataset (countries if unset).
    pub fn resolve(self) -> Result<PipelineConfig> {
        let variant = self.dataset_variant.unwrap_or(DatasetVariant::Countries);
        let base = variant.defaults();
        let cfg = PipelineConfig {
            dataset_variant: variant,
            source_url: self.source_url.unwrap_or(base.source_url),
            rate_table_path: self.rate_table_path.or(base.rate_table_path),
            csv_output_path: self.csv_output_path.unwrap_or(base.csv_output_path),
            db_path: self.db_path.unwrap_or(base.db_path),
            log_path: self.log_path.unwrap_or(base.log_path),
            table_name: self.table_name.unwrap_or(base.table_name),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            run_queries: self.run_queries.unwrap_or(base.run_queries),
            dataset: self.dataset.unwrap_or(base.dataset),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
