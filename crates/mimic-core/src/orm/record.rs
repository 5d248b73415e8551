//! Record wrappers handed out by the schema facade.

use crate::db::{Attrs, RecordId, Row};
use crate::error::{Error, Result};
use crate::orm::schema::Schema;
use serde_json::Value;

/// Model-qualified identity, used for relationship assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub model: String,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(model: impl Into<String>, id: RecordId) -> Self {
        Self {
            model: model.into(),
            id,
        }
    }
}

/// Snapshot of one stored row together with its model name.
///
/// Records do not own each other; relationships are resolved on demand through the
/// [`Schema`]. A relationship setter may rewrite foreign keys on *other* records, so snapshots
/// held elsewhere can go stale; [`Record::reload`] refreshes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    id: RecordId,
    attrs: Attrs,
}

impl Record {
    pub(crate) fn from_row(model: &str, row: &Row) -> Self {
        Self {
            model: model.to_string(),
            id: row.id,
            attrs: row.attrs.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Attribute value; the identity is not an attribute, use [`Record::id`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn to_ref(&self) -> RecordRef {
        RecordRef::new(self.model.clone(), self.id)
    }

    /// Attributes with the identity under `id`.
    pub fn to_json(&self) -> Value {
        Row {
            id: self.id,
            attrs: self.attrs.clone(),
        }
        .to_json()
    }

    /// Merge attributes (and relationship assignments) into the stored row and refresh `self`.
    pub fn update(&mut self, schema: &mut Schema, attrs: impl Into<Attributes>) -> Result<()> {
        *self = schema.update(&self.model, self.id, attrs)?;
        Ok(())
    }

    pub fn destroy(self, schema: &mut Schema) -> Result<()> {
        schema.destroy(&self.model, self.id)
    }

    pub fn reload(&mut self, schema: &Schema) -> Result<()> {
        *self = schema.find(&self.model, self.id)?;
        Ok(())
    }

    pub fn related(&self, schema: &Schema, name: &str) -> Result<Related> {
        schema.related(self, name)
    }

    /// Records of a hasMany relationship.
    pub fn has_many(&self, schema: &Schema, name: &str) -> Result<RecordSet> {
        match schema.related(self, name)? {
            Related::Many(set) => Ok(set),
            Related::One(_) => Err(wrong_kind(&self.model, name, "hasMany")),
        }
    }

    /// Record of a belongsTo relationship.
    pub fn belongs_to(&self, schema: &Schema, name: &str) -> Result<Option<Record>> {
        match schema.related(self, name)? {
            Related::One(record) => Ok(record),
            Related::Many(_) => Err(wrong_kind(&self.model, name, "belongsTo")),
        }
    }

    /// Relationship setter; refreshes `self` afterwards.
    pub fn set(
        &mut self,
        schema: &mut Schema,
        name: &str,
        value: impl Into<RelatedInput>,
    ) -> Result<()> {
        schema.associate(&self.model, self.id, name, value.into())?;
        self.reload(schema)
    }
}

fn wrong_kind(model: &str, name: &str, expected: &str) -> Error {
    Error::InvalidRelationship {
        model: model.to_string(),
        relationship: name.to_string(),
        reason: format!("not a {expected} relationship"),
    }
}

/// Ordered records of one model.
///
/// The model name is kept even when the set is empty so serializers can still derive a root key.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    model: String,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(model: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            model: model.into(),
            records,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(Record::id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Resolved value of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Record>),
    Many(RecordSet),
}

/// Value assigned to a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedInput {
    One(Option<RecordRef>),
    Many(Vec<RecordRef>),
}

impl From<&Record> for RelatedInput {
    fn from(record: &Record) -> Self {
        RelatedInput::One(Some(record.to_ref()))
    }
}

impl From<Option<&Record>> for RelatedInput {
    fn from(record: Option<&Record>) -> Self {
        RelatedInput::One(record.map(Record::to_ref))
    }
}

impl From<RecordRef> for RelatedInput {
    fn from(record: RecordRef) -> Self {
        RelatedInput::One(Some(record))
    }
}

impl From<&[Record]> for RelatedInput {
    fn from(records: &[Record]) -> Self {
        RelatedInput::Many(records.iter().map(Record::to_ref).collect())
    }
}

impl From<&Vec<Record>> for RelatedInput {
    fn from(records: &Vec<Record>) -> Self {
        RelatedInput::from(records.as_slice())
    }
}

impl From<Vec<Record>> for RelatedInput {
    fn from(records: Vec<Record>) -> Self {
        RelatedInput::from(records.as_slice())
    }
}

impl From<&RecordSet> for RelatedInput {
    fn from(set: &RecordSet) -> Self {
        RelatedInput::from(set.records())
    }
}

impl From<Vec<RecordRef>> for RelatedInput {
    fn from(records: Vec<RecordRef>) -> Self {
        RelatedInput::Many(records)
    }
}

/// Input to create/update: scalar attributes plus relationship assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pub(crate) values: Attrs,
    pub(crate) relations: Vec<(String, RelatedInput)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn relate(mut self, name: impl Into<String>, value: impl Into<RelatedInput>) -> Self {
        let name = name.into();
        self.relations.retain(|(existing, _)| *existing != name);
        self.relations.push((name, value.into()));
        self
    }

    pub fn values(&self) -> &Attrs {
        &self.values
    }

    pub fn relations(&self) -> &[(String, RelatedInput)] {
        &self.relations
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.relations.is_empty()
    }

    /// Apply `other` over `self`: later values and relationship assignments win.
    pub fn merge(mut self, other: Attributes) -> Self {
        for (key, value) in other.values {
            self.values.insert(key, value);
        }
        for (name, value) in other.relations {
            self = self.relate(name, value);
        }
        self
    }
}

impl From<Attrs> for Attributes {
    fn from(values: Attrs) -> Self {
        Self {
            values,
            relations: Vec::new(),
        }
    }
}

/// Object entries become attributes; any other JSON value contributes none.
impl From<Value> for Attributes {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(values) => Self::from(values),
            _ => Self::default(),
        }
    }
}
