use crate::error::{BoardError, Result};
use crate::loader::{FieldDictionary, DRILL_DOWN_FIELDS, TOP_LEVEL_FIELDS};
use crate::schema::SchemaParams;
use crate::source::{HttpRowSource, RowSource, SnapshotSource};
use crate::types::{AggregationMode, MetricType};
use crate::view::SortSpec;
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const API_URL_ENV: &str = "SORTING_DEVIATION_API_URL";
pub const DRILL_DOWN_URL_ENV: &str = "SORTING_DEVIATION_DRILLDOWN_URL";

/// Largest date window the report offers.
pub const MAX_DAYS: u16 = 30;

#[derive(Parser, Debug, Clone)]
#[command(about = "Pivot daily sorting-center metrics into a deviation report.")]
pub struct Args {
    /// Query-result URL of the top-level feed.
    #[arg(long)]
    pub url: Option<String>,

    /// Query-result URL of the drill-down feed.
    #[arg(long)]
    pub drilldown_url: Option<String>,

    /// Query parameter carrying the sorting center on drill-down requests.
    #[arg(long, default_value = "sc")]
    pub drilldown_param: String,

    /// Read the top-level payload from a saved JSON file instead of HTTP.
    #[arg(long, value_name = "FILE", conflicts_with = "url")]
    pub snapshot: Option<PathBuf>,

    /// Directory of `<sorting center>.json` drill-down payloads.
    #[arg(long, value_name = "DIR", requires = "snapshot")]
    pub snapshot_children: Option<PathBuf>,

    /// Number of most recent days shown.
    #[arg(long, default_value_t = MAX_DAYS, value_parser = clap::value_parser!(u16).range(1..=MAX_DAYS as i64))]
    pub days: u16,

    /// Metric types to show (repeatable or comma separated). Defaults to all.
    #[arg(long = "metrics", alias = "metric", value_delimiter = ',')]
    pub metrics: Vec<MetricType>,

    /// Aggregation mode of the date columns: all or restricted.
    #[arg(long, default_value = "all")]
    pub mode: AggregationMode,

    /// Only show sorting centers whose name contains this text.
    #[arg(long, default_value = "")]
    pub search: String,

    /// Sort by a column id, e.g. `summary-delta:desc`.
    #[arg(long)]
    pub sort: Option<SortSpec>,

    /// JSON file overriding the field dictionaries.
    #[arg(long, value_name = "FILE")]
    pub fields: Option<PathBuf>,

    /// Directory for exported reports.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Field dictionary overrides; either feed may be left out.
#[derive(Debug, Default, Deserialize)]
pub struct FieldsFile {
    pub top_level: Option<FieldDictionary>,
    pub drill_down: Option<FieldDictionary>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Http {
        url: String,
        drill_down_url: Option<String>,
        drill_down_param: String,
    },
    Snapshot {
        top_level: PathBuf,
        children_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub source: SourceConfig,
    pub days: usize,
    pub metrics: Vec<MetricType>,
    pub mode: AggregationMode,
    pub search: String,
    pub sort: Option<SortSpec>,
    pub top_level_fields: FieldDictionary,
    pub drill_down_fields: FieldDictionary,
    pub out_dir: PathBuf,
}

impl Settings {
    /// Resolve CLI arguments, falling back to environment variables for URLs.
    pub fn from_args(args: Args) -> Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = match (args.snapshot, args.url.or_else(|| env(API_URL_ENV))) {
            (Some(top_level), _) => SourceConfig::Snapshot {
                top_level,
                children_dir: args.snapshot_children,
            },
            (None, Some(url)) => SourceConfig::Http {
                url,
                drill_down_url: args.drilldown_url.or_else(|| env(DRILL_DOWN_URL_ENV)),
                drill_down_param: args.drilldown_param,
            },
            (None, None) => {
                return Err(BoardError::Config(format!(
                    "no data source: pass --url, --snapshot or set {}",
                    API_URL_ENV
                )))
            }
        };

        let mut metrics: Vec<MetricType> = Vec::new();
        for m in args.metrics {
            if !metrics.contains(&m) {
                metrics.push(m);
            }
        }
        if metrics.is_empty() {
            metrics = MetricType::ALL.to_vec();
        }

        let overrides = match &args.fields {
            Some(path) => serde_json::from_str::<FieldsFile>(&std::fs::read_to_string(path)?)?,
            None => FieldsFile::default(),
        };

        Ok(Settings {
            source,
            days: args.days as usize,
            metrics,
            mode: args.mode,
            search: args.search,
            sort: args.sort,
            top_level_fields: overrides.top_level.unwrap_or_else(|| TOP_LEVEL_FIELDS.clone()),
            drill_down_fields: overrides.drill_down.unwrap_or_else(|| DRILL_DOWN_FIELDS.clone()),
            out_dir: args.out_dir,
        })
    }

    pub fn schema_params(&self, today: NaiveDate) -> SchemaParams {
        SchemaParams::new(today, self.days, self.metrics.clone(), self.mode)
    }

    pub fn build_source(&self) -> Arc<dyn RowSource> {
        match &self.source {
            SourceConfig::Http {
                url,
                drill_down_url,
                drill_down_param,
            } => Arc::new(HttpRowSource::new(url, drill_down_url.as_deref(), drill_down_param)),
            SourceConfig::Snapshot {
                top_level,
                children_dir,
            } => Arc::new(SnapshotSource::new(top_level.clone(), children_dir.clone())),
        }
    }
}
