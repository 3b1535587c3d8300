//! Session state around the pure pipeline.
//!
//! A `Board` owns the last successfully fetched top-level rows and the
//! drill-down cache tied to them. Every derived table is rebuilt from those
//! rows on request.

use crate::drilldown::{merge_expanded, DrillDownCache, MergedRow};
use crate::error::{BoardError, Result};
use crate::loader::{load_drill_down, load_top_level, FieldDictionary, LoadReport, DRILL_DOWN_FIELDS, TOP_LEVEL_FIELDS};
use crate::reports::{aggregate, build_table, sum_fold, GroupBy};
use crate::schema::{build_columns, SchemaParams};
use crate::source::RowSource;
use crate::types::{CanonicalRow, EntityRow, MetricType, PivotTable};
use crate::view::{filter_rows, sort_rows, SortSpec};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Board {
    source: Arc<dyn RowSource>,
    top_level_fields: FieldDictionary,
    drill_down_fields: FieldDictionary,
    rows: Option<Vec<CanonicalRow>>,
    last_report: Option<LoadReport>,
    cache: DrillDownCache,
}

impl Board {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self {
            source,
            top_level_fields: TOP_LEVEL_FIELDS.clone(),
            drill_down_fields: DRILL_DOWN_FIELDS.clone(),
            rows: None,
            last_report: None,
            cache: DrillDownCache::new(),
        }
    }

    pub fn with_fields(mut self, top_level: FieldDictionary, drill_down: FieldDictionary) -> Self {
        self.top_level_fields = top_level;
        self.drill_down_fields = drill_down;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.is_some()
    }

    pub fn last_report(&self) -> Option<&LoadReport> {
        self.last_report.as_ref()
    }

    pub fn cache(&self) -> &DrillDownCache {
        &self.cache
    }

    /// Fetch the top-level rows. On success the rows replace the previous
    /// dataset and the drill-down cache is reset; on failure nothing changes.
    pub async fn refresh(&mut self) -> Result<LoadReport> {
        let payload = self.source.fetch_top_level().await?;
        let (rows, report) = load_top_level(&payload, &self.top_level_fields)?;
        info!(
            total = report.total_rows,
            mapped = report.mapped_rows,
            skipped = report.skipped_rows,
            "top-level rows loaded"
        );
        self.rows = Some(rows);
        self.last_report = Some(report.clone());
        self.cache.clear();
        Ok(report)
    }

    pub fn table(&self, params: &SchemaParams) -> Result<PivotTable> {
        let rows = self.rows.as_ref().ok_or(BoardError::NotLoaded)?;
        Ok(build_table(rows, GroupBy::Entity, params))
    }

    /// Child rows of one sorting center under the current schema. The child
    /// feed is fetched on the first call for `entity_id` only.
    pub async fn expand(&self, entity_id: &str, params: &SchemaParams) -> Result<Vec<EntityRow>> {
        let rows = self.rows.as_ref().ok_or(BoardError::NotLoaded)?;
        if !rows.iter().any(|r| r.entity_id == entity_id) {
            return Err(BoardError::UnknownEntity(entity_id.to_string()));
        }

        let aggregated = self
            .cache
            .get_or_fetch(entity_id, move || async move {
                let payload = self.source.fetch_children(entity_id).await?;
                let (children, report) = load_drill_down(&payload, &self.drill_down_fields, entity_id);
                info!(
                    entity = %entity_id,
                    total = report.total_rows,
                    skipped = report.skipped_rows,
                    "drill-down rows loaded"
                );
                Ok::<_, BoardError>(aggregate(&children, GroupBy::Child, &MetricType::ALL))
            })
            .await?;

        let mut children = aggregated.as_ref().clone();
        sum_fold(&mut children, &build_columns(params));
        Ok(children)
    }

    /// Filtered and sorted top-level rows with every expanded sorting
    /// center's children spliced in below it.
    pub fn merged_rows(&self, params: &SchemaParams, search: &str, sort: Option<&SortSpec>) -> Result<Vec<MergedRow>> {
        let table = self.table(params)?;
        let mut view = filter_rows(&table.rows, search);
        if let Some(spec) = sort {
            if !sort_rows(&mut view, &table.columns, spec) {
                warn!(column = %spec.column, "sort column is not part of the schema");
            }
        }

        let mut children: HashMap<String, Vec<EntityRow>> = HashMap::new();
        for (parent, aggregated) in self.cache.entries() {
            let mut rows = aggregated.as_ref().clone();
            sum_fold(&mut rows, &table.columns);
            if let Some(spec) = sort {
                let mut refs: Vec<&EntityRow> = rows.iter().collect();
                sort_rows(&mut refs, &table.columns, spec);
                let sorted: Vec<EntityRow> = refs.into_iter().cloned().collect();
                rows = sorted;
            }
            children.insert(parent, rows);
        }
        Ok(merge_expanded(&view, &children))
    }
}
