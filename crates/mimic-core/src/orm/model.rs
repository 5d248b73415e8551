//! Model definitions and the resolved relationship graph.

use crate::config::error::ConfigError;
use crate::naming::{English, Inflector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    HasMany,
    BelongsTo,
}

/// Relationship declaration attached to a model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub kind: RelationshipKind,
    /// Target model; defaults to the singular form of `name`
    pub model: Option<String>,
    /// Name of the inverse relationship on the target model, when it cannot be inferred
    pub inverse: Option<String>,
}

impl Relationship {
    pub fn has_many(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationshipKind::HasMany,
            model: None,
            inverse: None,
        }
    }

    pub fn belongs_to(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationshipKind::BelongsTo,
            model: None,
            inverse: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }
}

/// Named entity type with its relationship fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDefinition {
    pub relationships: Vec<Relationship>,
}

impl ModelDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_many(self, name: impl Into<String>) -> Self {
        self.relationship(Relationship::has_many(name))
    }

    pub fn belongs_to(self, name: impl Into<String>) -> Self {
        self.relationship(Relationship::belongs_to(name))
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }
}

/// Relationship with its target, foreign key and inverse resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelationship {
    pub name: String,
    pub kind: RelationshipKind,
    pub target: String,
    /// `<name>Id` for belongsTo, `<singular name>Ids` for hasMany
    pub foreign_key: String,
    pub inverse: Option<String>,
}

impl ResolvedRelationship {
    pub fn is_has_many(&self) -> bool {
        self.kind == RelationshipKind::HasMany
    }

    /// hasMany stored as an id list on the owner, because no inverse belongsTo exists.
    pub fn stores_id_list(&self) -> bool {
        self.is_has_many() && self.inverse.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub relationships: Vec<ResolvedRelationship>,
}

impl ResolvedModel {
    pub fn relationship(&self, name: &str) -> Option<&ResolvedRelationship> {
        self.relationships.iter().find(|rel| rel.name == name)
    }

    /// Relationship whose foreign-key attribute is `key`.
    pub fn relationship_by_foreign_key(&self, key: &str) -> Option<&ResolvedRelationship> {
        self.relationships.iter().find(|rel| rel.foreign_key == key)
    }
}

/// Immutable registry of resolved models.
#[derive(Debug, Clone, Default)]
pub struct Models {
    models: BTreeMap<String, ResolvedModel>,
}

impl Models {
    /// Resolve targets, foreign keys and inverses of every declared relationship.
    pub fn resolve(definitions: Vec<(String, ModelDefinition)>) -> Result<Self, ConfigError> {
        let inflector = English::new();
        let mut declared: BTreeMap<String, ModelDefinition> = BTreeMap::new();
        for (name, definition) in definitions {
            if declared.insert(name.clone(), definition).is_some() {
                return Err(ConfigError::DuplicateModel(name));
            }
        }

        let mut models = BTreeMap::new();
        for (name, definition) in &declared {
            let mut relationships: Vec<ResolvedRelationship> = Vec::new();
            for rel in &definition.relationships {
                if relationships.iter().any(|r| r.name == rel.name) {
                    return Err(ConfigError::DuplicateRelationship {
                        model: name.clone(),
                        name: rel.name.clone(),
                    });
                }
                let target = match (&rel.model, rel.kind) {
                    (Some(model), _) => model.clone(),
                    (None, RelationshipKind::HasMany) => inflector.singularize(&rel.name),
                    (None, RelationshipKind::BelongsTo) => rel.name.clone(),
                };
                if !declared.contains_key(&target) {
                    return Err(ConfigError::UnknownModel(target));
                }
                let foreign_key = match rel.kind {
                    RelationshipKind::BelongsTo => format!("{}Id", rel.name),
                    RelationshipKind::HasMany => format!("{}Ids", inflector.singularize(&rel.name)),
                };
                relationships.push(ResolvedRelationship {
                    name: rel.name.clone(),
                    kind: rel.kind,
                    target,
                    foreign_key,
                    inverse: None,
                });
            }
            models.insert(
                name.clone(),
                ResolvedModel {
                    name: name.clone(),
                    relationships,
                },
            );
        }

        // hasMany picks its inverse among the target's belongsTo pointing back here
        let mut pairs: Vec<(String, String, String, String)> = Vec::new();
        for (name, definition) in &declared {
            for rel in definition
                .relationships
                .iter()
                .filter(|rel| rel.kind == RelationshipKind::HasMany)
            {
                let target = models[name]
                    .relationship(&rel.name)
                    .map(|r| r.target.clone())
                    .unwrap_or_default();
                let candidates: Vec<String> = declared[&target]
                    .relationships
                    .iter()
                    .filter(|other| other.kind == RelationshipKind::BelongsTo)
                    .filter(|other| {
                        models[&target]
                            .relationship(&other.name)
                            .map(|r| &r.target)
                            == Some(name)
                    })
                    .filter(|other| other.inverse.as_ref().map_or(true, |inv| *inv == rel.name))
                    .map(|other| other.name.clone())
                    .collect();

                let inverse = match &rel.inverse {
                    Some(explicit) => {
                        if !candidates.contains(explicit) {
                            return Err(ConfigError::InvalidInverse {
                                model: name.clone(),
                                relationship: rel.name.clone(),
                                inverse: explicit.clone(),
                            });
                        }
                        Some(explicit.clone())
                    }
                    None if candidates.len() > 1 => {
                        return Err(ConfigError::AmbiguousInverse {
                            model: name.clone(),
                            relationship: rel.name.clone(),
                            candidates,
                        });
                    }
                    None => candidates.into_iter().next(),
                };
                if let Some(inverse) = inverse {
                    pairs.push((name.clone(), rel.name.clone(), target.clone(), inverse));
                }
            }
        }

        for (owner, has_many, target, belongs_to) in pairs {
            if let Some(model) = models.get(&target) {
                let claimed = model
                    .relationship(&belongs_to)
                    .and_then(|rel| rel.inverse.clone());
                if let Some(existing) = claimed {
                    return Err(ConfigError::AmbiguousInverse {
                        model: target.clone(),
                        relationship: belongs_to.clone(),
                        candidates: vec![existing, has_many],
                    });
                }
            }
            set_inverse(&mut models, &owner, &has_many, &belongs_to);
            set_inverse(&mut models, &target, &belongs_to, &has_many);
        }

        // an explicit inverse on a belongsTo must have been claimed by some hasMany
        for (name, definition) in &declared {
            for rel in &definition.relationships {
                if let (RelationshipKind::BelongsTo, Some(explicit)) = (rel.kind, &rel.inverse) {
                    let resolved = models[name]
                        .relationship(&rel.name)
                        .and_then(|r| r.inverse.as_ref());
                    if resolved != Some(explicit) {
                        return Err(ConfigError::InvalidInverse {
                            model: name.clone(),
                            relationship: rel.name.clone(),
                            inverse: explicit.clone(),
                        });
                    }
                }
            }
        }

        tracing::debug!(count = models.len(), "resolved models");
        Ok(Self { models })
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedModel> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedModel> {
        self.models.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

fn set_inverse(
    models: &mut BTreeMap<String, ResolvedModel>,
    model: &str,
    relationship: &str,
    inverse: &str,
) {
    if let Some(rel) = models
        .get_mut(model)
        .and_then(|m| m.relationships.iter_mut().find(|r| r.name == relationship))
    {
        rel.inverse = Some(inverse.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn movie_models() -> Vec<(String, ModelDefinition)> {
        vec![
            (
                "movie".to_string(),
                ModelDefinition::new().has_many("castMembers"),
            ),
            (
                "castMember".to_string(),
                ModelDefinition::new().belongs_to("movie"),
            ),
        ]
    }

    #[rstest]
    fn test_resolve_infers_target_and_inverse() {
        let models = Models::resolve(movie_models()).expect("Should resolve");

        let cast = models
            .get("movie")
            .and_then(|m| m.relationship("castMembers"))
            .expect("relationship exists");
        assert_eq!(cast.target, "castMember");
        assert_eq!(cast.foreign_key, "castMemberIds");
        assert_eq!(cast.inverse.as_deref(), Some("movie"));
        assert!(!cast.stores_id_list());

        let movie = models
            .get("castMember")
            .and_then(|m| m.relationship("movie"))
            .expect("relationship exists");
        assert_eq!(movie.target, "movie");
        assert_eq!(movie.foreign_key, "movieId");
        assert_eq!(movie.inverse.as_deref(), Some("castMembers"));
    }

    #[rstest]
    fn test_has_many_without_inverse_stores_id_list() {
        let models = Models::resolve(vec![
            ("movie".to_string(), ModelDefinition::new().has_many("tags")),
            ("tag".to_string(), ModelDefinition::new()),
        ])
        .expect("Should resolve");
        let tags = models
            .get("movie")
            .and_then(|m| m.relationship("tags"))
            .expect("relationship exists");
        assert!(tags.stores_id_list());
        assert_eq!(tags.foreign_key, "tagIds");
    }

    #[rstest]
    fn test_explicit_target_model() {
        let models = Models::resolve(vec![
            (
                "movie".to_string(),
                ModelDefinition::new()
                    .relationship(Relationship::belongs_to("director").model("person")),
            ),
            ("person".to_string(), ModelDefinition::new()),
        ])
        .expect("Should resolve");
        let director = models
            .get("movie")
            .and_then(|m| m.relationship("director"))
            .expect("relationship exists");
        assert_eq!(director.target, "person");
        assert_eq!(director.foreign_key, "directorId");
        assert_eq!(director.inverse, None);
    }

    #[rstest]
    fn test_unknown_target_is_rejected() {
        let result = Models::resolve(vec![(
            "movie".to_string(),
            ModelDefinition::new().has_many("reviews"),
        )]);
        assert!(matches!(result, Err(ConfigError::UnknownModel(ref m)) if m == "review"));
    }

    #[rstest]
    fn test_ambiguous_inverse_is_rejected() {
        let result = Models::resolve(vec![
            (
                "person".to_string(),
                ModelDefinition::new().relationship(Relationship::has_many("movies")),
            ),
            (
                "movie".to_string(),
                ModelDefinition::new()
                    .relationship(Relationship::belongs_to("director").model("person"))
                    .relationship(Relationship::belongs_to("producer").model("person")),
            ),
        ]);
        assert!(matches!(result, Err(ConfigError::AmbiguousInverse { .. })));
    }

    #[rstest]
    fn test_explicit_inverse_disambiguates() {
        let models = Models::resolve(vec![
            (
                "person".to_string(),
                ModelDefinition::new()
                    .relationship(Relationship::has_many("movies").inverse("director")),
            ),
            (
                "movie".to_string(),
                ModelDefinition::new()
                    .relationship(Relationship::belongs_to("director").model("person"))
                    .relationship(Relationship::belongs_to("producer").model("person")),
            ),
        ])
        .expect("Should resolve");
        let movie = models.get("movie").expect("model exists");
        assert_eq!(
            movie.relationship("director").and_then(|r| r.inverse.as_deref()),
            Some("movies")
        );
        assert_eq!(
            movie.relationship("producer").and_then(|r| r.inverse.as_deref()),
            None
        );
    }

    #[rstest]
    #[case(Relationship::has_many("castMembers").inverse("film"))]
    fn test_invalid_inverse_is_rejected(#[case] relationship: Relationship) {
        let result = Models::resolve(vec![
            (
                "movie".to_string(),
                ModelDefinition::new().relationship(relationship),
            ),
            (
                "castMember".to_string(),
                ModelDefinition::new().belongs_to("movie"),
            ),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidInverse { .. })));
    }

    #[rstest]
    fn test_duplicates_are_rejected() {
        let result = Models::resolve(vec![
            ("movie".to_string(), ModelDefinition::new()),
            ("movie".to_string(), ModelDefinition::new()),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateModel(_))));

        let result = Models::resolve(vec![(
            "movie".to_string(),
            ModelDefinition::new().belongs_to("movie").belongs_to("movie"),
        )]);
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateRelationship { .. })
        ));
    }
}
