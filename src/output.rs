use crate::drilldown::MergedRow;
use crate::error::Result;
use crate::types::{ColumnId, EntityRow, HeaderGroup, MetricType};
use crate::util::format_number;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

/// Display label of a fine-grained column.
pub fn header_label(column: &ColumnId) -> String {
    match column {
        ColumnId::Entity => "Sorting center".to_string(),
        ColumnId::Summary(m) => format!("Total {}", metric_label(*m)),
        ColumnId::Cell(key) => format!("{} {}", key.date.format("%m-%d"), metric_label(key.metric)),
    }
}

pub fn metric_label(metric: MetricType) -> &'static str {
    match metric {
        MetricType::Delta => "Delta",
        MetricType::SortedOn => "Sorted on SC",
        MetricType::SortedFor => "Sorted for SC",
    }
}

/// Display label of a header group; the leading `empty` group renders blank.
pub fn header_group_label(group: &HeaderGroup) -> String {
    match group {
        HeaderGroup::Empty => String::new(),
        HeaderGroup::Summary => "Total".to_string(),
        HeaderGroup::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

fn render_value(v: f64) -> String {
    let decimals = if v.fract() == 0.0 { 0 } else { 2 };
    format_number(v, decimals)
}

fn render_cell(row: &EntityRow, column: &ColumnId) -> String {
    let Some(v) = row.value(column) else {
        return row.entity_id.clone();
    };
    match row.severity_for(column) {
        Some(tag) => format!("{} ({})", render_value(v), tag),
        None => render_value(v),
    }
}

/// Write the merged listing as CSV. The first column names the parent of
/// child rows and is empty for sorting centers; delta columns are followed by
/// their severity columns.
pub fn write_csv(path: &Path, columns: &[ColumnId], rows: &[MergedRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["parent".to_string()];
    for column in columns {
        header.push(column.to_string());
        if let Some(id) = column.severity_id() {
            header.push(id);
        }
    }
    wtr.write_record(&header)?;

    for merged in rows {
        let mut record = vec![merged.parent.clone().unwrap_or_default()];
        for column in columns {
            record.push(match merged.row.value(column) {
                Some(v) => v.to_string(),
                None => merged.row.entity_id.clone(),
            });
            if let Some(tag) = merged.row.severity_for(column) {
                record.push(tag.to_string());
            }
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown preview of the first `max_rows` rows, limited to the summary
/// columns and the `max_dates` most recent dates. The first line holds the
/// header groups, the second the column labels.
pub fn preview_table(columns: &[ColumnId], rows: &[MergedRow], max_rows: usize, max_dates: usize) -> String {
    let mut dates = Vec::new();
    for column in columns {
        if let ColumnId::Cell(key) = column {
            if !dates.contains(&key.date) {
                dates.push(key.date);
            }
        }
    }
    dates.truncate(max_dates);
    let shown: Vec<&ColumnId> = columns
        .iter()
        .filter(|c| match c {
            ColumnId::Cell(key) => dates.contains(&key.date),
            _ => true,
        })
        .collect();

    if rows.is_empty() {
        return "(no rows)".to_string();
    }

    let mut builder = Builder::default();
    let mut previous = None;
    let groups: Vec<String> = shown
        .iter()
        .map(|c| {
            let group = c.header_group();
            let label = if previous == Some(group) {
                String::new()
            } else {
                header_group_label(&group)
            };
            previous = Some(group);
            label
        })
        .collect();
    builder.push_record(groups);
    builder.push_record(shown.iter().map(|c| header_label(c)));
    for merged in rows.iter().take(max_rows) {
        builder.push_record(shown.iter().map(|c| {
            let cell = render_cell(&merged.row, c);
            if merged.is_child() && matches!(c, ColumnId::Entity) {
                format!("  └ {}", cell)
            } else {
                cell
            }
        }));
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn print_preview(columns: &[ColumnId], rows: &[MergedRow], max_rows: usize, max_dates: usize) {
    println!("{}\n", preview_table(columns, rows, max_rows, max_dates));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::SeverityTag;
    use crate::types::{AggregationMode, CellKey};
    use chrono::NaiveDate;

    fn sample() -> (Vec<ColumnId>, Vec<MergedRow>) {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let columns = vec![
            ColumnId::Entity,
            ColumnId::Summary(MetricType::Delta),
            ColumnId::Cell(CellKey::new(d1, AggregationMode::All, MetricType::Delta)),
            ColumnId::Cell(CellKey::new(d2, AggregationMode::All, MetricType::Delta)),
        ];
        let mut parent = EntityRow::new("Moscow-1");
        parent.add(CellKey::new(d1, AggregationMode::All, MetricType::Delta), 1500.0);
        parent.set_severity(d1, AggregationMode::All, SeverityTag::Red);
        parent.reset_summary();
        parent.add_summary(MetricType::Delta, 1500.0);
        parent.set_summary_severity(SeverityTag::Yellow);
        let child = EntityRow::new("zone-1");
        let rows = vec![
            MergedRow { parent: None, row: parent },
            MergedRow { parent: Some("Moscow-1".to_string()), row: child },
        ];
        (columns, rows)
    }

    #[test]
    fn test_labels() {
        assert_eq!(header_label(&ColumnId::Entity), "Sorting center");
        assert_eq!(header_label(&ColumnId::Summary(MetricType::SortedOn)), "Total Sorted on SC");
        assert_eq!(header_group_label(&HeaderGroup::Empty), "");
        assert_eq!(header_group_label(&HeaderGroup::Summary), "Total");
    }

    #[test]
    fn test_csv_export() {
        let (columns, rows) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_csv(&path, &columns, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "parent,entity,summary-delta,summary-delta-severity,2024-01-02-all-delta,2024-01-02-all-delta-severity,2024-01-01-all-delta,2024-01-01-all-delta-severity"
        );
        assert_eq!(lines[1], ",Moscow-1,1500,yellow,1500,red,0,white");
        assert_eq!(lines[2], "Moscow-1,zone-1,0,white,0,white,0,white");
    }

    #[test]
    fn test_preview_limits_dates_and_marks_children() {
        let (columns, rows) = sample();
        let preview = preview_table(&columns, &rows, 10, 1);
        assert!(preview.contains("01-02 Delta"));
        assert!(!preview.contains("01-01 Delta"));
        assert!(preview.contains("1,500 (red)"));
        assert!(preview.contains("└ zone-1"));
        assert!(preview.contains("2024-01-02"));
        assert!(!preview.contains("2024-01-01"));
        assert_eq!(preview_table(&columns, &[], 10, 1), "(no rows)");
    }
}
