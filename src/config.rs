use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::table::aggregate::Aggregation;

/// Table shape: keyed aggregation map or append-only list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    #[default]
    Table,
    List,
}

/// Where samples go at each flush boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Space-separated plain text on stdout.
    #[default]
    Raw,
    /// JSON rows on stdout.
    Json,
    /// No printing; an external renderer reads the sample vector.
    External,
}

/// One column of a view: a field name plus its aggregation operators and
/// key flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub field: String,

    /// Aggregation applied while ingesting events.
    #[serde(default)]
    pub aggregation: Aggregation,

    /// Aggregation applied during the group-by merge pass.
    #[serde(default)]
    pub groupby_aggregation: Aggregation,

    #[serde(default)]
    pub is_key: bool,

    #[serde(default)]
    pub is_groupby_key: bool,
}

impl ColumnSpec {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            aggregation: Aggregation::None,
            groupby_aggregation: Aggregation::None,
            is_key: false,
            is_groupby_key: false,
        }
    }

    pub fn key(field: &str) -> Self {
        Self {
            is_key: true,
            ..Self::new(field)
        }
    }

    pub fn value(field: &str, aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            ..Self::new(field)
        }
    }

    pub fn groupby_key(field: &str) -> Self {
        Self {
            is_groupby_key: true,
            ..Self::new(field)
        }
    }

    pub fn with_merge(mut self, aggregation: Aggregation) -> Self {
        self.groupby_aggregation = aggregation;
        self
    }
}

/// A complete view description, loadable from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Display name, informational only.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mode: TableMode,

    #[serde(default)]
    pub output: OutputFormat,

    /// Flush cadence. Forced to 200ms for list views. Default: 1s.
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    pub columns: Vec<ColumnSpec>,

    /// Event filter expression; empty means no filter.
    #[serde(default)]
    pub filter: String,

    /// Substitute type defaults when extraction misses.
    #[serde(default)]
    pub use_defaults: bool,

    /// Drill-down depth forwarded to the extractor factory.
    #[serde(default)]
    pub view_depth: u32,

    /// First row emitted by the JSON presenter.
    #[serde(default)]
    pub json_first_row: usize,

    /// Last row emitted by the JSON presenter; 0 means "through the end".
    #[serde(default)]
    pub json_last_row: usize,
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(1)
}

impl ViewConfig {
    /// Loads and validates a view description from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading view file {}", path.display()))?;
        Self::from_yaml(&data)
    }

    /// Parses and validates a view description from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(data).context("parsing view YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            bail!("view has no columns");
        }
        if self.refresh_interval.is_zero() {
            bail!("refresh_interval must be > 0");
        }
        Ok(())
    }

    /// Refresh cadence in nanoseconds, the unit the engine clocks in.
    pub fn refresh_interval_ns(&self) -> u64 {
        self.refresh_interval.as_nanos().min(u64::MAX as u128) as u64
    }
}
