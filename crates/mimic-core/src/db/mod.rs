//! Identity store.
//!
//! This module provides the raw, model-agnostic record storage:
//! - [`Collection`]: ordered rows of one model with a monotonic identity counter
//! - [`Db`]: named collections keyed by model name
//!
//! Relationship bookkeeping lives one layer up in [`crate::orm`].

mod collection;
mod store;

pub use collection::{Collection, Row};
pub use store::Db;

/// Identity of a row, unique within its collection.
pub type RecordId = u64;

/// Attribute map of a row (identity excluded).
pub type Attrs = serde_json::Map<String, serde_json::Value>;

/// Read an identity out of an attribute value.
///
/// Accepts non-negative integers and their decimal string form, which is how ids arrive from
/// path parameters and form-encoded bodies.
pub fn as_record_id(value: &serde_json::Value) -> Option<RecordId> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().filter(|id| *id > 0),
        serde_json::Value::String(s) => s.parse::<RecordId>().ok().filter(|id| *id > 0),
        _ => None,
    }
}
