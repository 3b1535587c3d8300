//! Column schema of the pivot table.
//!
//! The fine-grained schema is `entity`, one summary column per selected
//! metric, then for each date of the window (most recent first) one column
//! per selected metric in the selected aggregation mode. The header grouping
//! is `empty`, `summary` and one group per date.

use crate::types::{AggregationMode, CellKey, ColumnId, HeaderGroup, MetricType};
use crate::util::date_window;
use chrono::NaiveDate;

/// Inputs the schema depends on. Any change rebuilds it from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaParams {
    pub today: NaiveDate,
    pub days: usize,
    pub metrics: Vec<MetricType>,
    pub mode: AggregationMode,
}

impl SchemaParams {
    pub fn new(today: NaiveDate, days: usize, metrics: Vec<MetricType>, mode: AggregationMode) -> Self {
        Self { today, days, metrics, mode }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        date_window(self.today, self.days)
    }
}

pub fn build_columns(params: &SchemaParams) -> Vec<ColumnId> {
    let dates = params.dates();
    let mut columns = Vec::with_capacity(1 + params.metrics.len() * (dates.len() + 1));
    columns.push(ColumnId::Entity);
    columns.extend(params.metrics.iter().map(|m| ColumnId::Summary(*m)));
    for date in dates {
        columns.extend(
            params
                .metrics
                .iter()
                .map(|m| ColumnId::Cell(CellKey::new(date, params.mode, *m))),
        );
    }
    columns
}

pub fn build_header_groups(params: &SchemaParams) -> Vec<HeaderGroup> {
    let mut groups = vec![HeaderGroup::Empty, HeaderGroup::Summary];
    groups.extend(params.dates().into_iter().map(HeaderGroup::Date));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(days: usize, metrics: Vec<MetricType>) -> SchemaParams {
        SchemaParams::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            days,
            metrics,
            AggregationMode::All,
        )
    }

    #[test]
    fn test_schema_layout() {
        let columns = build_columns(&params(2, vec![MetricType::Delta, MetricType::SortedOn]));
        let rendered: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "entity",
                "summary-delta",
                "summary-sortedOn",
                "2024-01-02-all-delta",
                "2024-01-02-all-sortedOn",
                "2024-01-01-all-delta",
                "2024-01-01-all-sortedOn",
            ]
        );
    }

    #[test]
    fn test_schema_length() {
        for days in [0usize, 1, 7, 30] {
            for n in 0..=3 {
                let metrics = MetricType::ALL[..n].to_vec();
                let columns = build_columns(&params(days, metrics));
                assert_eq!(columns.len(), 1 + n + days * n);
            }
        }
    }

    #[test]
    fn test_dates_strictly_descending() {
        let columns = build_columns(&params(30, vec![MetricType::SortedFor]));
        let dates: Vec<NaiveDate> = columns
            .iter()
            .filter_map(|c| match c {
                ColumnId::Cell(key) => Some(key.date),
                _ => None,
            })
            .collect();
        assert_eq!(dates.len(), 30);
        assert!(dates.windows(2).all(|w| w[0] > w[1]));
        assert!(dates.windows(2).all(|w| w[0].to_string() > w[1].to_string()));
    }

    #[test]
    fn test_restricted_mode_columns() {
        let mut p = params(1, vec![MetricType::Delta]);
        p.mode = AggregationMode::Restricted;
        let columns = build_columns(&p);
        assert_eq!(columns[2].to_string(), "2024-01-02-restricted-delta");
    }

    #[test]
    fn test_header_groups() {
        let groups: Vec<String> = build_header_groups(&params(2, vec![MetricType::Delta]))
            .iter()
            .map(|g| g.to_string())
            .collect();
        assert_eq!(groups, vec!["empty", "summary", "2024-01-02", "2024-01-01"]);
    }
}
