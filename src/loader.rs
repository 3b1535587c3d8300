use crate::error::{BoardError, Result};
use crate::types::CanonicalRow;
use crate::util::{indicator_set, metric_value, parse_date_safe, value_as_label};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Location of the row sequence inside a query-result payload.
pub const ROWS_PATH: [&str; 3] = ["query_result", "data", "rows"];

/// Source field labels for one feed. The top-level and drill-down feeds
/// expose the same semantic fields under different labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDictionary {
    pub entity: String,
    #[serde(default)]
    pub child: Option<String>,
    pub date: String,
    pub restricted: String,
    pub delta: String,
    pub sorted_on: String,
    pub sorted_for: String,
}

pub static TOP_LEVEL_FIELDS: Lazy<FieldDictionary> = Lazy::new(|| FieldDictionary {
    entity: "СЦ".to_string(),
    child: None,
    date: "Дата".to_string(),
    restricted: "ПМ".to_string(),
    delta: "Дельта".to_string(),
    sorted_on: "Отсортировано на СЦ".to_string(),
    sorted_for: "Отсортировано для СЦ".to_string(),
});

pub static DRILL_DOWN_FIELDS: Lazy<FieldDictionary> = Lazy::new(|| FieldDictionary {
    entity: "sorting_center".to_string(),
    child: Some("destination_name".to_string()),
    date: "date".to_string(),
    restricted: "is_last_mile".to_string(),
    delta: "delta".to_string(),
    sorted_on: "sorted_on".to_string(),
    sorted_for: "sorted_for".to_string(),
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub mapped_rows: usize,
    pub skipped_rows: usize,
}

/// Map one raw record into the canonical shape.
///
/// Only presence is checked: the entity id (or `default_entity` when the
/// feed omits it) and a parseable date are required, plus the child id when
/// the dictionary names a child field. Metric values are carried through
/// as-is, including `NaN` for malformed numbers.
pub fn map_record(
    record: &Value,
    fields: &FieldDictionary,
    default_entity: Option<&str>,
) -> Option<CanonicalRow> {
    let entity_id = value_as_label(record.get(&fields.entity))
        .or_else(|| default_entity.map(str::to_string))?;
    let date = parse_date_safe(record.get(&fields.date).and_then(Value::as_str))?;
    let child_id = match &fields.child {
        Some(label) => Some(value_as_label(record.get(label))?),
        None => None,
    };

    Some(CanonicalRow {
        entity_id,
        date,
        child_id,
        delta: metric_value(record.get(&fields.delta)),
        sorted_on: metric_value(record.get(&fields.sorted_on)),
        sorted_for: metric_value(record.get(&fields.sorted_for)),
        is_restricted: indicator_set(record.get(&fields.restricted)),
    })
}

/// Row sequence at [`ROWS_PATH`], if present.
pub fn extract_rows(payload: &Value) -> Option<&Vec<Value>> {
    ROWS_PATH
        .iter()
        .try_fold(payload, |node, key| node.get(key))?
        .as_array()
}

/// Map every record of a row sequence, counting the ones that had to be
/// skipped.
pub fn map_rows(
    records: &[Value],
    fields: &FieldDictionary,
    default_entity: Option<&str>,
) -> (Vec<CanonicalRow>, LoadReport) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped_rows = 0usize;
    for record in records {
        match map_record(record, fields, default_entity) {
            Some(row) => rows.push(row),
            None => skipped_rows += 1,
        }
    }
    let report = LoadReport {
        total_rows: records.len(),
        mapped_rows: rows.len(),
        skipped_rows,
    };
    (rows, report)
}

/// Rows of a top-level payload. A payload without a row sequence is an error.
pub fn load_top_level(payload: &Value, fields: &FieldDictionary) -> Result<(Vec<CanonicalRow>, LoadReport)> {
    let records = extract_rows(payload).ok_or_else(|| {
        BoardError::MalformedResponse(format!("no row sequence at {}", ROWS_PATH.join(".")))
    })?;
    let (rows, report) = map_rows(records, fields, None);
    debug!(
        total = report.total_rows,
        skipped = report.skipped_rows,
        "mapped top-level rows"
    );
    Ok((rows, report))
}

/// Rows of a drill-down payload for `parent`. A missing or empty row
/// sequence is an empty result.
pub fn load_drill_down(
    payload: &Value,
    fields: &FieldDictionary,
    parent: &str,
) -> (Vec<CanonicalRow>, LoadReport) {
    match extract_rows(payload) {
        Some(records) => map_rows(records, fields, Some(parent)),
        None => (Vec::new(), LoadReport::default()),
    }
}
