//! Lazily fetched child breakdowns of sorting centers.
//!
//! Each parent id owns one cache slot. A slot is filled at most once; a
//! failed fetch leaves it empty so a later expand can try again. Slots for
//! different parents never touch each other, so concurrent fetches for
//! different parents can complete in any order.

use crate::error::Result;
use crate::types::EntityRow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Arc<Vec<EntityRow>>>>;

/// Aggregated (not yet summed) child rows keyed by parent entity id.
#[derive(Default)]
pub struct DrillDownCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl DrillDownCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, entity_id: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(entity_id.to_string()).or_default())
    }

    /// Cached rows for `entity_id`, running `fetch` only if no earlier call
    /// has filled the slot. Concurrent callers for the same id share one fetch.
    pub async fn get_or_fetch<F, Fut>(&self, entity_id: &str, fetch: F) -> Result<Arc<Vec<EntityRow>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<EntityRow>>>,
    {
        let slot = self.slot(entity_id);
        if let Some(rows) = slot.get() {
            debug!(entity = %entity_id, "drill-down cache hit");
            return Ok(Arc::clone(rows));
        }
        let rows = slot
            .get_or_try_init(move || async move { fetch().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(rows))
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<Vec<EntityRow>>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(entity_id).and_then(|slot| slot.get().cloned())
    }

    /// Every filled slot.
    pub fn entries(&self) -> HashMap<String, Arc<Vec<EntityRow>>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .filter_map(|(id, slot)| slot.get().map(|rows| (id.clone(), Arc::clone(rows))))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// A row of the merged listing: a sorting center, or one of its children
/// placed directly below it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub parent: Option<String>,
    pub row: EntityRow,
}

impl MergedRow {
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }
}

/// Splice child rows under their parents, keeping the parents' order.
pub fn merge_expanded(parents: &[&EntityRow], children: &HashMap<String, Vec<EntityRow>>) -> Vec<MergedRow> {
    let mut merged = Vec::with_capacity(parents.len());
    for parent in parents {
        merged.push(MergedRow {
            parent: None,
            row: (*parent).clone(),
        });
        if let Some(kids) = children.get(&parent.entity_id) {
            merged.extend(kids.iter().map(|kid| MergedRow {
                parent: Some(parent.entity_id.clone()),
                row: kid.clone(),
            }));
        }
    }
    merged
}
