use crate::severity::{classify, SeverityTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Suffix appended to a delta column id to name its paired severity cell.
pub const SEVERITY_SUFFIX: &str = "-severity";

/// Which rows contribute to a cell: every row, or only rows flagged as
/// restricted (last-mile) by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    All,
    Restricted,
}

impl AggregationMode {
    pub const BOTH: [AggregationMode; 2] = [AggregationMode::All, AggregationMode::Restricted];

    pub fn as_str(self) -> &'static str {
        match self {
            AggregationMode::All => "all",
            AggregationMode::Restricted => "restricted",
        }
    }

    /// Whether a row with the given restricted flag contributes in this mode.
    pub fn admits(self, is_restricted: bool) -> bool {
        match self {
            AggregationMode::All => true,
            AggregationMode::Restricted => is_restricted,
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(AggregationMode::All),
            "restricted" | "lm" => Ok(AggregationMode::Restricted),
            other => Err(format!("unknown aggregation mode `{}` (expected all or restricted)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "delta")]
    Delta,
    #[serde(rename = "sortedOn")]
    SortedOn,
    #[serde(rename = "sortedFor")]
    SortedFor,
}

impl MetricType {
    pub const ALL: [MetricType; 3] = [MetricType::Delta, MetricType::SortedOn, MetricType::SortedFor];

    pub fn token(self) -> &'static str {
        match self {
            MetricType::Delta => "delta",
            MetricType::SortedOn => "sortedOn",
            MetricType::SortedFor => "sortedFor",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .into_iter()
            .find(|m| m.token().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown metric type `{}` (expected delta, sortedOn or sortedFor)", s))
    }
}

/// A source record after field mapping. Metric values stay optional here;
/// absent and malformed values are coalesced to zero only when accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub entity_id: String,
    pub date: NaiveDate,
    pub child_id: Option<String>,
    pub delta: Option<f64>,
    pub sorted_on: Option<f64>,
    pub sorted_for: Option<f64>,
    pub is_restricted: bool,
}

impl CanonicalRow {
    pub fn metric(&self, metric: MetricType) -> Option<f64> {
        match metric {
            MetricType::Delta => self.delta,
            MetricType::SortedOn => self.sorted_on,
            MetricType::SortedFor => self.sorted_for,
        }
    }
}

/// Address of one fine-grained cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub date: NaiveDate,
    pub mode: AggregationMode,
    pub metric: MetricType,
}

impl CellKey {
    pub fn new(date: NaiveDate, mode: AggregationMode, metric: MetricType) -> Self {
        Self { date, mode, metric }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Entity,
    Summary(MetricType),
    Cell(CellKey),
}

impl ColumnId {
    pub fn metric(&self) -> Option<MetricType> {
        match self {
            ColumnId::Entity => None,
            ColumnId::Summary(m) => Some(*m),
            ColumnId::Cell(key) => Some(key.metric),
        }
    }

    /// Coarse header group the column sits under.
    pub fn header_group(&self) -> HeaderGroup {
        match self {
            ColumnId::Entity => HeaderGroup::Empty,
            ColumnId::Summary(_) => HeaderGroup::Summary,
            ColumnId::Cell(key) => HeaderGroup::Date(key.date),
        }
    }

    /// Id of the paired severity cell. Only delta columns carry one.
    pub fn severity_id(&self) -> Option<String> {
        match self.metric() {
            Some(MetricType::Delta) => Some(format!("{}{}", self, SEVERITY_SUFFIX)),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Entity => f.write_str("entity"),
            ColumnId::Summary(m) => write!(f, "summary-{}", m),
            ColumnId::Cell(key) => write!(f, "{}-{}-{}", key.date.format("%Y-%m-%d"), key.mode, key.metric),
        }
    }
}

/// Coarse header row drawn above the fine-grained columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderGroup {
    Empty,
    Summary,
    Date(NaiveDate),
}

impl fmt::Display for HeaderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderGroup::Empty => f.write_str("empty"),
            HeaderGroup::Summary => f.write_str("summary"),
            HeaderGroup::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One pivoted row. Any cell that was never accumulated reads as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub entity_id: String,
    cells: BTreeMap<CellKey, f64>,
    severities: BTreeMap<(NaiveDate, AggregationMode), SeverityTag>,
    summary: BTreeMap<MetricType, f64>,
    summary_severity: Option<SeverityTag>,
}

impl EntityRow {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cells: BTreeMap::new(),
            severities: BTreeMap::new(),
            summary: BTreeMap::new(),
            summary_severity: None,
        }
    }

    pub fn add(&mut self, key: CellKey, value: f64) {
        *self.cells.entry(key).or_insert(0.0) += value;
    }

    pub fn cell(&self, key: &CellKey) -> f64 {
        self.cells.get(key).copied().unwrap_or(0.0)
    }

    /// Numeric value of a column; `None` for the entity label column.
    pub fn value(&self, column: &ColumnId) -> Option<f64> {
        match column {
            ColumnId::Entity => None,
            ColumnId::Summary(m) => Some(self.summary(*m)),
            ColumnId::Cell(key) => Some(self.cell(key)),
        }
    }

    pub fn set_severity(&mut self, date: NaiveDate, mode: AggregationMode, tag: SeverityTag) {
        self.severities.insert((date, mode), tag);
    }

    pub fn severity(&self, date: NaiveDate, mode: AggregationMode) -> SeverityTag {
        self.severities
            .get(&(date, mode))
            .copied()
            .unwrap_or_else(|| classify(0.0, 0.0))
    }

    pub fn reset_summary(&mut self) {
        self.summary.clear();
        self.summary_severity = None;
        for m in MetricType::ALL {
            self.summary.insert(m, 0.0);
        }
    }

    pub fn add_summary(&mut self, metric: MetricType, value: f64) {
        *self.summary.entry(metric).or_insert(0.0) += value;
    }

    pub fn summary(&self, metric: MetricType) -> f64 {
        self.summary.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn set_summary_severity(&mut self, tag: SeverityTag) {
        self.summary_severity = Some(tag);
    }

    pub fn summary_severity(&self) -> SeverityTag {
        self.summary_severity.unwrap_or_else(|| classify(0.0, 0.0))
    }

    /// Severity paired with a delta column, if the column has one.
    pub fn severity_for(&self, column: &ColumnId) -> Option<SeverityTag> {
        match column {
            ColumnId::Summary(MetricType::Delta) => Some(self.summary_severity()),
            ColumnId::Cell(key) if key.metric == MetricType::Delta => Some(self.severity(key.date, key.mode)),
            _ => None,
        }
    }

    /// Flat string-keyed record for the view layer, one entry per column
    /// plus the paired severity entries.
    pub fn to_record(&self, columns: &[ColumnId]) -> Map<String, Value> {
        let mut record = Map::new();
        for column in columns {
            let value = match self.value(column) {
                None => Value::String(self.entity_id.clone()),
                Some(v) => serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            };
            record.insert(column.to_string(), value);
            if let (Some(id), Some(tag)) = (column.severity_id(), self.severity_for(column)) {
                record.insert(id, Value::String(tag.as_str().to_string()));
            }
        }
        record
    }
}

/// The engine's output: ordered rows plus both column schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub columns: Vec<ColumnId>,
    pub header_groups: Vec<HeaderGroup>,
    pub rows: Vec<EntityRow>,
}

impl PivotTable {
    /// Column ids for flat exports, each delta column followed by its
    /// severity id.
    pub fn export_columns(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.columns.len() * 2);
        for column in &self.columns {
            ids.push(column.to_string());
            if let Some(id) = column.severity_id() {
                ids.push(id);
            }
        }
        ids
    }

    pub fn to_json(&self) -> Value {
        let columns: Vec<Value> = self.columns.iter().map(|c| Value::String(c.to_string())).collect();
        let headers: Vec<Value> = self
            .header_groups
            .iter()
            .map(|h| Value::String(h.to_string()))
            .collect();
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|r| Value::Object(r.to_record(&self.columns)))
            .collect();
        serde_json::json!({
            "columns": columns,
            "header_groups": headers,
            "rows": rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_column_id_rendering() {
        let key = CellKey::new(day("2024-01-01"), AggregationMode::Restricted, MetricType::SortedOn);
        assert_eq!(ColumnId::Entity.to_string(), "entity");
        assert_eq!(ColumnId::Summary(MetricType::SortedFor).to_string(), "summary-sortedFor");
        assert_eq!(ColumnId::Cell(key).to_string(), "2024-01-01-restricted-sortedOn");
    }

    #[test]
    fn test_only_delta_columns_have_severity_ids() {
        let delta = ColumnId::Cell(CellKey::new(day("2024-01-01"), AggregationMode::All, MetricType::Delta));
        assert_eq!(delta.severity_id().as_deref(), Some("2024-01-01-all-delta-severity"));
        assert_eq!(
            ColumnId::Summary(MetricType::Delta).severity_id().as_deref(),
            Some("summary-delta-severity")
        );
        assert_eq!(ColumnId::Summary(MetricType::SortedOn).severity_id(), None);
        assert_eq!(ColumnId::Entity.severity_id(), None);
    }

    #[test]
    fn test_parse_mode_and_metric() {
        assert_eq!("LM".parse::<AggregationMode>().unwrap(), AggregationMode::Restricted);
        assert_eq!("sortedfor".parse::<MetricType>().unwrap(), MetricType::SortedFor);
        assert!("volume".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_missing_cells_read_as_zero() {
        let row = EntityRow::new("A");
        let key = CellKey::new(day("2024-01-01"), AggregationMode::All, MetricType::Delta);
        assert_eq!(row.cell(&key), 0.0);
        assert_eq!(row.severity(key.date, key.mode), SeverityTag::White);
        assert_eq!(row.value(&ColumnId::Entity), None);
    }

    #[test]
    fn test_record_contains_severity_entries() {
        let date = day("2024-01-01");
        let delta = CellKey::new(date, AggregationMode::All, MetricType::Delta);
        let mut row = EntityRow::new("A");
        row.add(delta, 5.0);
        row.set_severity(date, AggregationMode::All, SeverityTag::Red);
        let record = row.to_record(&[ColumnId::Entity, ColumnId::Cell(delta)]);
        assert_eq!(record["entity"], Value::String("A".into()));
        assert_eq!(record["2024-01-01-all-delta"], serde_json::json!(5.0));
        assert_eq!(record["2024-01-01-all-delta-severity"], Value::String("red".into()));
    }
}
