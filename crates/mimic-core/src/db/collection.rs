//! Ordered rows of a single model.

use super::{Attrs, RecordId};
use serde_json::Value;

/// One stored row: identity plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RecordId,
    pub attrs: Attrs,
}

impl Row {
    /// Check that every predicate key equals the row's value.
    ///
    /// The `id` key compares against the identity, so `{"id": 2}` and `{"id": "2"}` both match
    /// row 2.
    pub fn matches(&self, predicate: &Attrs) -> bool {
        predicate.iter().all(|(key, expected)| {
            if key == "id" {
                super::as_record_id(expected) == Some(self.id)
            } else {
                self.attrs.get(key).unwrap_or(&Value::Null) == expected
            }
        })
    }

    /// Attributes with the identity inserted under `id`.
    pub fn to_json(&self) -> Value {
        let mut map = Attrs::new();
        map.insert("id".to_string(), Value::from(self.id));
        for (key, value) in &self.attrs {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Rows of one model in insertion order with a monotonic identity counter.
///
/// Identity counters are never rewound by removals, so an id is never handed out twice.
#[derive(Debug, Clone)]
pub struct Collection {
    rows: Vec<Row>,
    next_id: RecordId,
}

impl Collection {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Append a row with the next identity. An `id` key in `attrs` is dropped.
    pub fn insert(&mut self, mut attrs: Attrs) -> Row {
        attrs.remove("id");
        let row = Row {
            id: self.next_id,
            attrs,
        };
        self.next_id += 1;
        self.rows.push(row.clone());
        row
    }

    pub fn find(&self, id: RecordId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Merge `partial` over the row's attributes. Returns `None` if the id is absent.
    pub fn update(&mut self, id: RecordId, partial: &Attrs) -> Option<Row> {
        let row = self.rows.iter_mut().find(|row| row.id == id)?;
        for (key, value) in partial {
            if key != "id" {
                row.attrs.insert(key.clone(), value.clone());
            }
        }
        Some(row.clone())
    }

    /// Delete in place, keeping the order of the remaining rows.
    pub fn remove(&mut self, id: RecordId) -> Option<Row> {
        let index = self.rows.iter().position(|row| row.id == id)?;
        Some(self.rows.remove(index))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn filter<'a>(&'a self, predicate: &'a Attrs) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows.iter().filter(move |row| row.matches(predicate))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}
