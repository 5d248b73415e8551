//! Named collections keyed by model name.

use super::{Attrs, Collection, RecordId, Row};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// In-memory identity store.
///
/// `Db` knows nothing about relationships: it inserts, merges, removes and filters rows. Foreign
/// keys are plain attributes at this level and removals do not touch other collections.
#[derive(Debug, Clone, Default)]
pub struct Db {
    collections: BTreeMap<String, Collection>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure an (empty) collection exists for `model`.
    pub fn create_collection(&mut self, model: &str) {
        self.collections.entry(model.to_string()).or_default();
    }

    pub fn insert(&mut self, model: &str, attrs: Attrs) -> Row {
        let row = self
            .collections
            .entry(model.to_string())
            .or_default()
            .insert(attrs);
        tracing::debug!(model, id = row.id, "inserted row");
        row
    }

    pub fn find(&self, model: &str, id: RecordId) -> Option<&Row> {
        self.collections.get(model)?.find(id)
    }

    pub fn update(&mut self, model: &str, id: RecordId, partial: &Attrs) -> Result<Row> {
        self.collections
            .get_mut(model)
            .and_then(|collection| collection.update(id, partial))
            .ok_or_else(|| not_found(model, id))
    }

    pub fn remove(&mut self, model: &str, id: RecordId) -> Result<Row> {
        let row = self
            .collections
            .get_mut(model)
            .and_then(|collection| collection.remove(id))
            .ok_or_else(|| not_found(model, id))?;
        tracing::debug!(model, id, "removed row");
        Ok(row)
    }

    /// All rows of `model` in insertion order; empty for unknown models.
    pub fn all(&self, model: &str) -> &[Row] {
        self.collections
            .get(model)
            .map(Collection::rows)
            .unwrap_or_default()
    }

    pub fn filter<'a>(&'a self, model: &str, predicate: &'a Attrs) -> Vec<&'a Row> {
        match self.collections.get(model) {
            Some(collection) => collection.filter(predicate).collect(),
            None => Vec::new(),
        }
    }

    /// Discard every collection, resetting identity counters.
    pub fn clear(&mut self) {
        self.collections.clear();
    }

    /// JSON snapshot of every collection, for diagnostics.
    pub fn dump(&self) -> Value {
        let map = self
            .collections
            .iter()
            .map(|(model, collection)| {
                let rows = collection.rows().iter().map(Row::to_json).collect();
                (model.clone(), Value::Array(rows))
            })
            .collect();
        Value::Object(map)
    }
}

fn not_found(model: &str, id: RecordId) -> Error {
    Error::NotFound {
        model: model.to_string(),
        id,
    }
}
