// Search and sort over emitted rows. The engine's row order is first-seen;
// everything here only reorders or hides rows.
use crate::types::{ColumnId, EntityRow};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Column to sort by, written as `<column-id>` or `<column-id>:desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl FromStr for SortSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (column, direction) = match s.rsplit_once(':') {
            Some((c, "desc")) => (c, SortDirection::Desc),
            Some((c, "asc")) => (c, SortDirection::Asc),
            Some((_, other)) => return Err(format!("unknown sort direction `{}` (expected asc or desc)", other)),
            None => (s, SortDirection::Asc),
        };
        if column.is_empty() {
            return Err("sort column must not be empty".to_string());
        }
        Ok(SortSpec {
            column: column.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{}", self.column),
            SortDirection::Desc => write!(f, "{}:desc", self.column),
        }
    }
}

/// Rows whose entity label contains `search` (trimmed, case-insensitive).
pub fn filter_rows<'a>(rows: &'a [EntityRow], search: &str) -> Vec<&'a EntityRow> {
    let needle = search.trim().to_lowercase();
    rows.iter()
        .filter(|r| needle.is_empty() || r.entity_id.to_lowercase().contains(&needle))
        .collect()
}

/// Stable sort by the column whose id renders as `spec.column`.
///
/// Returns `false` and leaves the order untouched when no such column is in
/// the schema.
pub fn sort_rows(rows: &mut [&EntityRow], columns: &[ColumnId], spec: &SortSpec) -> bool {
    let Some(column) = columns.iter().find(|c| c.to_string() == spec.column) else {
        return false;
    };
    rows.sort_by(|a, b| {
        let ord = compare(a, b, column);
        match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    true
}

fn compare(a: &EntityRow, b: &EntityRow, column: &ColumnId) -> Ordering {
    match (a.value(column), b.value(column)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.entity_id.cmp(&b.entity_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregationMode, CellKey, MetricType};
    use chrono::NaiveDate;

    fn rows() -> (Vec<EntityRow>, CellKey) {
        let key = CellKey::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            AggregationMode::All,
            MetricType::Delta,
        );
        let mut out = Vec::new();
        for (id, v) in [("Moscow-1", 5.0), ("Kazan", 9.0), ("moscow-2", 1.0), ("Tver", 5.0)] {
            let mut r = EntityRow::new(id);
            r.add(key, v);
            out.push(r);
        }
        (out, key)
    }

    fn ids(rows: &[&EntityRow]) -> Vec<String> {
        rows.iter().map(|r| r.entity_id.clone()).collect()
    }

    #[test]
    fn test_parse_sort_spec() {
        assert_eq!(
            "summary-delta:desc".parse::<SortSpec>().unwrap(),
            SortSpec { column: "summary-delta".into(), direction: SortDirection::Desc }
        );
        assert_eq!("entity".parse::<SortSpec>().unwrap().direction, SortDirection::Asc);
        assert!("entity:sideways".parse::<SortSpec>().is_err());
        assert!(":desc".parse::<SortSpec>().is_err());
    }

    #[test]
    fn test_filter_is_case_insensitive_and_trimmed() {
        let (rows, _) = rows();
        assert_eq!(ids(&filter_rows(&rows, "  MOSCOW ")), vec!["Moscow-1", "moscow-2"]);
        assert_eq!(filter_rows(&rows, "").len(), 4);
        assert!(filter_rows(&rows, "Omsk").is_empty());
    }

    #[test]
    fn test_sort_numeric_keeps_ties_in_order() {
        let (rows, key) = rows();
        let columns = vec![ColumnId::Entity, ColumnId::Cell(key)];
        let mut view = filter_rows(&rows, "");
        let spec: SortSpec = "2024-01-01-all-delta:desc".parse().unwrap();
        assert!(sort_rows(&mut view, &columns, &spec));
        assert_eq!(ids(&view), vec!["Kazan", "Moscow-1", "Tver", "moscow-2"]);
    }

    #[test]
    fn test_sort_by_entity_and_unknown_column() {
        let (rows, _) = rows();
        let columns = vec![ColumnId::Entity];
        let mut view = filter_rows(&rows, "");
        assert!(sort_rows(&mut view, &columns, &"entity".parse().unwrap()));
        assert_eq!(ids(&view), vec!["Kazan", "Moscow-1", "Tver", "moscow-2"]);
        assert!(!sort_rows(&mut view, &columns, &"summary-delta".parse().unwrap()));
    }
}
