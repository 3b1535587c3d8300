use crate::schema::{build_columns, build_header_groups, SchemaParams};
use crate::severity::classify;
use crate::types::{AggregationMode, CanonicalRow, CellKey, ColumnId, EntityRow, MetricType, PivotTable};
use crate::util::numeric_or_zero;
use std::collections::HashMap;
use tracing::debug;

/// Which canonical field identifies the output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Top-level feed: one row per sorting center.
    Entity,
    /// Drill-down feed: one row per child of the expanded sorting center.
    Child,
}

impl GroupBy {
    fn key<'a>(&self, row: &'a CanonicalRow) -> Option<&'a str> {
        match self {
            GroupBy::Entity => Some(row.entity_id.as_str()),
            GroupBy::Child => row.child_id.as_deref(),
        }
    }
}

/// Fold canonical rows into one [`EntityRow`] per group key, in first-seen
/// order, accumulating every metric in both aggregation modes.
///
/// Restricted cells only receive rows with the restricted flag set. After
/// each row the (date, mode) severity of both modes is re-derived from the
/// accumulated delta and sortedOn.
pub fn aggregate(rows: &[CanonicalRow], group_by: GroupBy, metrics: &[MetricType]) -> Vec<EntityRow> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<EntityRow> = Vec::new();

    for r in rows {
        let Some(key) = group_by.key(r) else {
            debug!(entity = %r.entity_id, date = %r.date, "row has no group key, ignored");
            continue;
        };
        let idx = *index.entry(key.to_string()).or_insert_with(|| {
            out.push(EntityRow::new(key));
            out.len() - 1
        });
        let entity = &mut out[idx];

        for mode in AggregationMode::BOTH {
            if mode.admits(r.is_restricted) {
                for metric in metrics {
                    entity.add(CellKey::new(r.date, mode, *metric), numeric_or_zero(r.metric(*metric)));
                }
            }
            let delta = entity.cell(&CellKey::new(r.date, mode, MetricType::Delta));
            let sorted_on = entity.cell(&CellKey::new(r.date, mode, MetricType::SortedOn));
            entity.set_severity(r.date, mode, classify(delta, sorted_on));
        }
    }
    out
}

/// Second pass: per-row totals over the cells named in `columns`.
///
/// Every summary column is reset to zero first, so folding is repeatable
/// against a new schema.
pub fn sum_fold(rows: &mut [EntityRow], columns: &[ColumnId]) {
    for row in rows.iter_mut() {
        row.reset_summary();
        for column in columns {
            if let ColumnId::Cell(key) = column {
                let value = row.cell(key);
                row.add_summary(key.metric, value);
            }
        }
        let tag = classify(row.summary(MetricType::Delta), row.summary(MetricType::SortedOn));
        row.set_summary_severity(tag);
    }
}

/// Full pipeline from canonical rows to the emitted table. Pure: the same
/// rows and parameters always give the same table.
pub fn build_table(rows: &[CanonicalRow], group_by: GroupBy, params: &SchemaParams) -> PivotTable {
    let columns = build_columns(params);
    let header_groups = build_header_groups(params);
    let mut entity_rows = aggregate(rows, group_by, &MetricType::ALL);
    sum_fold(&mut entity_rows, &columns);
    PivotTable {
        columns,
        header_groups,
        rows: entity_rows,
    }
}
