//! Serializer layer: records and record sets to response payloads.
//!
//! - [`SerializerConfig`] / [`SerializerOverrides`]: application default and per-model overrides
//! - [`IncludeTree`]: relationship paths to include
//! - [`Serializers`]: resolves the effective configuration and renders payloads

mod config;
mod include;

pub use config::{SerializeIds, SerializerConfig, SerializerOverrides};
pub use include::IncludeTree;

use crate::db::RecordId;
use crate::error::{Error, Result};
use crate::naming::{English, Inflector};
use crate::orm::{Models, Record, RecordSet, Related, RelationshipKind, Schema};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What can be serialized.
#[derive(Debug, Clone, Copy)]
pub enum Serializable<'a> {
    Record(&'a Record),
    Records(&'a RecordSet),
}

impl<'a> From<&'a Record> for Serializable<'a> {
    fn from(record: &'a Record) -> Self {
        Serializable::Record(record)
    }
}

impl<'a> From<&'a RecordSet> for Serializable<'a> {
    fn from(records: &'a RecordSet) -> Self {
        Serializable::Records(records)
    }
}

/// Sideloaded records grouped by root key, each record emitted once.
#[derive(Default)]
struct Sideloads {
    seen: HashSet<(String, RecordId)>,
    groups: BTreeMap<String, Vec<Value>>,
}

/// Serializer registry.
///
/// A model's overrides win over the application configuration field by field.
#[derive(Debug)]
pub struct Serializers {
    application: SerializerConfig,
    models: HashMap<String, SerializerOverrides>,
    inflector: Box<dyn Inflector>,
}

impl Default for Serializers {
    fn default() -> Self {
        Self::new(SerializerConfig::default())
    }
}

impl Serializers {
    pub fn new(application: SerializerConfig) -> Self {
        Self {
            application,
            models: HashMap::new(),
            inflector: Box::new(English::new()),
        }
    }

    pub fn with_inflector(mut self, inflector: impl Inflector + 'static) -> Self {
        self.inflector = Box::new(inflector);
        self
    }

    pub fn set_application(&mut self, overrides: &SerializerOverrides) {
        self.application = overrides.apply(&SerializerConfig::default());
    }

    pub fn define(&mut self, model: impl Into<String>, overrides: SerializerOverrides) {
        self.models.insert(model.into(), overrides);
    }

    pub fn inflector(&self) -> &dyn Inflector {
        self.inflector.as_ref()
    }

    /// Effective configuration for `model`.
    pub fn config_for(&self, model: &str) -> SerializerConfig {
        match self.models.get(model) {
            Some(overrides) => overrides.apply(&self.application),
            None => self.application.clone(),
        }
    }

    fn root_key(&self, config: &SerializerConfig, model: &str, plural: bool) -> String {
        if plural {
            config.key_case.apply(&self.inflector.pluralize(model))
        } else {
            config.key_case.apply(model)
        }
    }

    /// Check that the configured includes of `model` plus `includes` name real relationships.
    pub fn validate_includes(
        &self,
        models: &Models,
        model: &str,
        includes: &[String],
    ) -> Result<()> {
        self.include_tree(&self.config_for(model), models, model, includes)
            .map(|_| ())
    }

    fn include_tree(
        &self,
        config: &SerializerConfig,
        models: &Models,
        model: &str,
        includes: &[String],
    ) -> Result<IncludeTree> {
        let tree = IncludeTree::parse(config.include.iter().chain(includes));
        tree.validate(models, model)?;
        Ok(tree)
    }

    /// Render `subject` with the serializer's configured includes plus `includes` (dotted paths).
    pub fn serialize<'a>(
        &self,
        schema: &Schema,
        subject: impl Into<Serializable<'a>>,
        includes: &[String],
    ) -> Result<Value> {
        let subject = subject.into();
        let model = match subject {
            Serializable::Record(record) => record.model(),
            Serializable::Records(records) => records.model(),
        };
        let config = self.config_for(model);
        let tree = self.include_tree(&config, schema.models(), model, includes)?;

        let force_embed = !config.root;
        let mut sideloads = Sideloads::default();
        let mut primary = match subject {
            Serializable::Record(record) => {
                sideloads.seen.insert((record.model().to_string(), record.id()));
                self.record_object(schema, record, &tree, force_embed, &mut sideloads)?
            }
            Serializable::Records(records) => {
                for record in records {
                    sideloads.seen.insert((record.model().to_string(), record.id()));
                }
                let objects = records
                    .iter()
                    .map(|record| {
                        self.record_object(schema, record, &tree, force_embed, &mut sideloads)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Array(objects)
            }
        };

        if !config.root {
            return Ok(primary);
        }
        let plural = matches!(subject, Serializable::Records(_));
        let root = self.root_key(&config, model, plural);
        let mut payload = Map::new();
        for (key, mut records) in sideloads.groups {
            if key == root {
                // same model sideloaded next to a primary collection
                if let Value::Array(items) = &mut primary {
                    items.append(&mut records);
                    continue;
                }
            }
            payload.insert(key, Value::Array(records));
        }
        payload.insert(root, primary);
        Ok(Value::Object(payload))
    }

    fn record_object(
        &self,
        schema: &Schema,
        record: &Record,
        tree: &IncludeTree,
        force_embed: bool,
        sideloads: &mut Sideloads,
    ) -> Result<Value> {
        let config = self.config_for(record.model());
        let model = schema
            .models()
            .get(record.model())
            .ok_or_else(|| Error::UnknownModel(record.model().to_string()))?;
        let key = |name: &str| config.key_case.apply(name);

        let id_lists: HashSet<&str> = model
            .relationships
            .iter()
            .filter(|rel| rel.stores_id_list())
            .map(|rel| rel.foreign_key.as_str())
            .collect();

        let mut out = Map::new();
        out.insert(key("id"), Value::from(record.id()));
        for (name, value) in record.attrs() {
            if id_lists.contains(name.as_str()) {
                continue;
            }
            if let Some(whitelist) = &config.attrs {
                if !whitelist.iter().any(|allowed| allowed == name) {
                    continue;
                }
            }
            out.insert(key(name), value.clone());
        }

        for rel in &model.relationships {
            let ids_key = key(&rel.foreign_key);
            match tree.child(&rel.name) {
                Some(subtree) if force_embed || config.embed => {
                    if rel.kind == RelationshipKind::BelongsTo {
                        out.remove(&ids_key);
                    }
                    let value = match schema.related(record, &rel.name)? {
                        Related::One(Some(related)) => {
                            self.record_object(schema, &related, subtree, force_embed, sideloads)?
                        }
                        Related::One(None) => Value::Null,
                        Related::Many(set) => Value::Array(
                            set.iter()
                                .map(|related| {
                                    self.record_object(
                                        schema,
                                        related,
                                        subtree,
                                        force_embed,
                                        sideloads,
                                    )
                                })
                                .collect::<Result<Vec<_>>>()?,
                        ),
                    };
                    out.insert(key(&rel.name), value);
                }
                Some(subtree) => {
                    let related = match schema.related(record, &rel.name)? {
                        Related::One(one) => one.into_iter().collect::<Vec<_>>(),
                        Related::Many(set) => set.into_iter().collect(),
                    };
                    if rel.is_has_many() && config.serialize_ids != SerializeIds::Never {
                        let ids = related.iter().map(|r| Value::from(r.id())).collect();
                        out.insert(ids_key, Value::Array(ids));
                    }
                    for related in &related {
                        self.sideload(schema, related, subtree, force_embed, sideloads)?;
                    }
                }
                None => {
                    if rel.is_has_many() && config.serialize_ids == SerializeIds::Always {
                        let ids = match schema.related(record, &rel.name)? {
                            Related::Many(set) => set.ids(),
                            Related::One(_) => Vec::new(),
                        };
                        let ids = ids.into_iter().map(Value::from).collect();
                        out.insert(ids_key, Value::Array(ids));
                    }
                }
            }
        }
        Ok(Value::Object(out))
    }

    fn sideload(
        &self,
        schema: &Schema,
        record: &Record,
        tree: &IncludeTree,
        force_embed: bool,
        sideloads: &mut Sideloads,
    ) -> Result<()> {
        let first_time = sideloads
            .seen
            .insert((record.model().to_string(), record.id()));
        // nested includes are still followed for records already emitted
        let object = self.record_object(schema, record, tree, force_embed, sideloads)?;
        if first_time {
            let config = self.config_for(record.model());
            let root = self.root_key(&config, record.model(), true);
            sideloads.groups.entry(root).or_default().push(object);
        }
        Ok(())
    }
}
