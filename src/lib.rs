//! Sorting-center deviation report.
//!
//! Flat per-day metric rows from the reporting backend are pivoted into one
//! row per sorting center, with columns per (date, aggregation mode, metric),
//! summary totals, and a severity tag for every delta cell. Sorting centers
//! can be expanded into their child breakdown, fetched once per session.
pub mod board;
pub mod config;
pub mod drilldown;
pub mod error;
pub mod loader;
pub mod logging;
pub mod output;
pub mod reports;
pub mod schema;
pub mod severity;
pub mod source;
pub mod types;
pub mod util;
pub mod view;

pub use board::Board;
pub use error::{BoardError, Result};
pub use reports::{aggregate, build_table, sum_fold, GroupBy};
pub use schema::{build_columns, build_header_groups, SchemaParams};
pub use severity::{classify, SeverityTag};
pub use types::{AggregationMode, CanonicalRow, CellKey, ColumnId, EntityRow, HeaderGroup, MetricType, PivotTable};
