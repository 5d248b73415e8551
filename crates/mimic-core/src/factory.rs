//! Blueprint-based attribute generation.
//!
//! A [`Blueprint`] lists field generators in declaration order. Each `build`/`create` advances
//! the blueprint's sequence counter once (starting at 1); counters are independent across
//! blueprints.

use crate::db::Attrs;
use crate::error::{Error, Result};
use crate::orm::{Attributes, Record, Schema};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Hook run after a factory-created record has been inserted.
pub type AfterCreate = Box<dyn Fn(&mut Schema, &Record) -> Result<()>>;

/// Generator of one attribute.
pub enum Field {
    /// Constant value
    Value(Value),
    /// Function of the sequence index
    Sequence(Box<dyn Fn(u64) -> Value>),
    /// Function of the sequence index and the attributes generated before this field
    Derived(Box<dyn Fn(u64, &Attrs) -> Value>),
}

impl Field {
    fn generate(&self, sequence: u64, attrs: &Attrs) -> Value {
        match self {
            Field::Value(value) => value.clone(),
            Field::Sequence(generate) => generate(sequence),
            Field::Derived(generate) => generate(sequence, attrs),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Field::Sequence(_) => f.write_str("Sequence(..)"),
            Field::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Named set of field generators for one model, with optional traits and hooks.
#[derive(Default)]
pub struct Blueprint {
    fields: Vec<(String, Field)>,
    traits: BTreeMap<String, Blueprint>,
    after_create: Vec<AfterCreate>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field; redeclaring a field replaces its generator in place.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(name, Field::Value(value.into()))
    }

    pub fn sequence(
        self,
        name: impl Into<String>,
        generate: impl Fn(u64) -> Value + 'static,
    ) -> Self {
        self.field(name, Field::Sequence(Box::new(generate)))
    }

    pub fn derived(
        self,
        name: impl Into<String>,
        generate: impl Fn(u64, &Attrs) -> Value + 'static,
    ) -> Self {
        self.field(name, Field::Derived(Box::new(generate)))
    }

    /// Named variation applied on request, after the base fields.
    pub fn with_trait(mut self, name: impl Into<String>, variation: Blueprint) -> Self {
        self.traits.insert(name.into(), variation);
        self
    }

    pub fn after_create(
        mut self,
        hook: impl Fn(&mut Schema, &Record) -> Result<()> + 'static,
    ) -> Self {
        self.after_create.push(Box::new(hook));
        self
    }

    fn apply_fields(&self, sequence: u64, attrs: &mut Attrs) {
        for (name, field) in &self.fields {
            let value = field.generate(sequence, attrs);
            attrs.insert(name.clone(), value);
        }
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("fields", &self.fields)
            .field("traits", &self.traits)
            .field("after_create", &self.after_create.len())
            .finish()
    }
}

/// Registered blueprints and their sequence counters.
#[derive(Debug, Default)]
pub struct Factories {
    blueprints: BTreeMap<String, Blueprint>,
    sequences: HashMap<String, u64>,
}

impl Factories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, model: impl Into<String>, blueprint: Blueprint) {
        self.blueprints.insert(model.into(), blueprint);
    }

    pub fn contains(&self, model: &str) -> bool {
        self.blueprints.contains_key(model)
    }

    /// Generate attributes: base fields, then trait fields, then `overrides`.
    ///
    /// Without a blueprint the overrides are returned unchanged and no counter moves.
    pub fn build(
        &mut self,
        model: &str,
        traits: &[&str],
        overrides: impl Into<Attributes>,
    ) -> Result<Attributes> {
        let overrides = overrides.into();
        let Some(blueprint) = self.blueprints.get(model) else {
            return Ok(overrides);
        };
        let variations = selected_traits(model, blueprint, traits)?;

        let sequence = self.sequences.entry(model.to_string()).or_insert(0);
        *sequence += 1;
        let sequence = *sequence;

        let mut attrs = Attrs::new();
        blueprint.apply_fields(sequence, &mut attrs);
        for variation in variations {
            variation.apply_fields(sequence, &mut attrs);
        }
        tracing::debug!(model, sequence, ?traits, "built factory attributes");
        Ok(Attributes::from(attrs).merge(overrides))
    }

    /// Build, insert through the schema, then run after-create hooks (blueprint first, then
    /// traits in the order given).
    pub fn create(
        &mut self,
        schema: &mut Schema,
        model: &str,
        traits: &[&str],
        overrides: impl Into<Attributes>,
    ) -> Result<Record> {
        let attrs = self.build(model, traits, overrides)?;
        let mut record = schema.create(model, attrs)?;

        if let Some(blueprint) = self.blueprints.get(model) {
            for hook in &blueprint.after_create {
                hook(schema, &record)?;
            }
            for variation in selected_traits(model, blueprint, traits)? {
                for hook in &variation.after_create {
                    hook(schema, &record)?;
                }
            }
            record.reload(schema)?;
        }
        Ok(record)
    }

    pub fn create_list(
        &mut self,
        schema: &mut Schema,
        model: &str,
        count: usize,
        traits: &[&str],
        overrides: impl Into<Attributes>,
    ) -> Result<Vec<Record>> {
        let overrides = overrides.into();
        (0..count)
            .map(|_| self.create(schema, model, traits, overrides.clone()))
            .collect()
    }

    /// Reset every sequence counter to zero.
    pub fn reset(&mut self) {
        self.sequences.clear();
    }
}

fn selected_traits<'a>(
    model: &str,
    blueprint: &'a Blueprint,
    traits: &[&str],
) -> Result<Vec<&'a Blueprint>> {
    traits
        .iter()
        .map(|name| {
            blueprint.traits.get(*name).ok_or_else(|| Error::UnknownTrait {
                model: model.to_string(),
                name: (*name).to_string(),
            })
        })
        .collect()
}
