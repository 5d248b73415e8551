//! Foreign-key bookkeeping for `hasMany`/`belongsTo` relationships.
//!
//! Relationships are stored as plain attributes on rows:
//! - `belongsTo` keeps `<name>Id` on the owner
//! - `hasMany` with an inverse is derived from the inverse foreign key on the target rows
//! - `hasMany` without an inverse keeps `<singular>Ids` on the owner
//!
//! Setters validate every target before writing anything.

use crate::db::{as_record_id, Attrs, Db, RecordId, Row};
use crate::error::{Error, Result};
use crate::orm::model::{Models, RelationshipKind, ResolvedRelationship};
use crate::orm::record::{Record, RecordRef, RecordSet, Related, RelatedInput};
use serde_json::Value;
use std::collections::HashMap;

/// Key of an explicit hasMany assignment: owner model, owner id, relationship name.
type OrderKey = (String, RecordId, String);

/// Association manager.
///
/// Besides rewriting foreign keys it remembers the order in which records were last assigned
/// to an inverse-backed hasMany, so reading the relationship back yields the assigned order.
#[derive(Debug, Clone, Default)]
pub struct Associations {
    order: HashMap<OrderKey, Vec<RecordId>>,
}

impl Associations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreign-key attributes a freshly inserted row starts with.
    pub fn defaults(models: &Models, model: &str) -> Attrs {
        let mut attrs = Attrs::new();
        if let Some(model) = models.get(model) {
            for rel in &model.relationships {
                match rel.kind {
                    RelationshipKind::BelongsTo => {
                        attrs.insert(rel.foreign_key.clone(), Value::Null);
                    }
                    RelationshipKind::HasMany if rel.stores_id_list() => {
                        attrs.insert(rel.foreign_key.clone(), Value::Array(Vec::new()));
                    }
                    RelationshipKind::HasMany => {}
                }
            }
        }
        attrs
    }

    /// Resolve a relationship of `row` (a row of `model`).
    pub fn resolve(
        &self,
        db: &Db,
        models: &Models,
        model: &str,
        row: &Row,
        rel: &ResolvedRelationship,
    ) -> Result<Related> {
        match rel.kind {
            RelationshipKind::BelongsTo => {
                let related = row
                    .attrs
                    .get(&rel.foreign_key)
                    .and_then(as_record_id)
                    .and_then(|id| db.find(&rel.target, id))
                    .map(|found| Record::from_row(&rel.target, found));
                Ok(Related::One(related))
            }
            RelationshipKind::HasMany => {
                let ids = self.has_many_ids(db, models, model, row, rel)?;
                let records = ids
                    .into_iter()
                    .filter_map(|id| db.find(&rel.target, id))
                    .map(|found| Record::from_row(&rel.target, found))
                    .collect();
                Ok(Related::Many(RecordSet::new(rel.target.clone(), records)))
            }
        }
    }

    fn has_many_ids(
        &self,
        db: &Db,
        models: &Models,
        model: &str,
        row: &Row,
        rel: &ResolvedRelationship,
    ) -> Result<Vec<RecordId>> {
        let Some(inverse) = &rel.inverse else {
            return Ok(id_list(row.attrs.get(&rel.foreign_key)));
        };
        let inverse_key = inverse_foreign_key(models, rel, inverse)?;
        let mut ids: Vec<RecordId> = db
            .all(&rel.target)
            .iter()
            .filter(|child| points_at(child, &inverse_key, row.id))
            .map(|child| child.id)
            .collect();
        let key = (model.to_string(), row.id, rel.name.clone());
        if let Some(order) = self.order.get(&key) {
            // stable: unlisted children keep insertion order after the listed ones
            ids.sort_by_key(|id| order.iter().position(|o| o == id).unwrap_or(usize::MAX));
        }
        Ok(ids)
    }

    /// Check an assignment without writing anything.
    pub fn validate(
        &self,
        db: &Db,
        owner_model: &str,
        rel: &ResolvedRelationship,
        input: &RelatedInput,
    ) -> Result<()> {
        match (rel.kind, input) {
            (RelationshipKind::BelongsTo, RelatedInput::One(target)) => match target {
                Some(target) => check_target(db, owner_model, rel, target),
                None => Ok(()),
            },
            (RelationshipKind::HasMany, RelatedInput::Many(targets)) => targets
                .iter()
                .try_for_each(|target| check_target(db, owner_model, rel, target)),
            (RelationshipKind::BelongsTo, RelatedInput::Many(_)) => Err(invalid(
                owner_model,
                rel,
                "belongsTo expects a single record".to_string(),
            )),
            (RelationshipKind::HasMany, RelatedInput::One(_)) => Err(invalid(
                owner_model,
                rel,
                "hasMany expects a list of records".to_string(),
            )),
        }
    }

    /// Validate and apply an assignment on the owner `owner_model#owner_id`.
    pub fn assign(
        &mut self,
        db: &mut Db,
        models: &Models,
        owner_model: &str,
        owner_id: RecordId,
        rel: &ResolvedRelationship,
        input: &RelatedInput,
    ) -> Result<()> {
        if db.find(owner_model, owner_id).is_none() {
            return Err(Error::NotFound {
                model: owner_model.to_string(),
                id: owner_id,
            });
        }
        self.validate(db, owner_model, rel, input)?;
        match input {
            RelatedInput::One(target) => {
                let target = target.as_ref().map(|t| t.id);
                self.set_belongs_to(db, owner_model, owner_id, rel, target)
            }
            RelatedInput::Many(targets) => {
                let mut ids: Vec<RecordId> = Vec::with_capacity(targets.len());
                for target in targets {
                    if !ids.contains(&target.id) {
                        ids.push(target.id);
                    }
                }
                self.set_has_many(db, models, owner_model, owner_id, rel, ids)
            }
        }
    }

    fn set_belongs_to(
        &mut self,
        db: &mut Db,
        owner_model: &str,
        owner_id: RecordId,
        rel: &ResolvedRelationship,
        target: Option<RecordId>,
    ) -> Result<()> {
        let value = target.map(Value::from).unwrap_or(Value::Null);
        db.update(owner_model, owner_id, &single(&rel.foreign_key, value))?;
        if let Some(inverse) = &rel.inverse {
            self.forget(&rel.target, inverse, owner_id);
        }
        tracing::debug!(
            model = owner_model,
            id = owner_id,
            relationship = %rel.name,
            ?target,
            "assigned belongsTo"
        );
        Ok(())
    }

    fn set_has_many(
        &mut self,
        db: &mut Db,
        models: &Models,
        owner_model: &str,
        owner_id: RecordId,
        rel: &ResolvedRelationship,
        ids: Vec<RecordId>,
    ) -> Result<()> {
        let Some(inverse) = &rel.inverse else {
            let list = Value::Array(ids.iter().copied().map(Value::from).collect());
            db.update(owner_model, owner_id, &single(&rel.foreign_key, list))?;
            tracing::debug!(
                model = owner_model,
                id = owner_id,
                relationship = %rel.name,
                ?ids,
                "assigned hasMany id list"
            );
            return Ok(());
        };

        let inverse_key = inverse_foreign_key(models, rel, inverse)?;
        let previous: Vec<RecordId> = db
            .all(&rel.target)
            .iter()
            .filter(|child| points_at(child, &inverse_key, owner_id))
            .map(|child| child.id)
            .collect();

        for id in previous.iter().filter(|id| !ids.contains(id)) {
            db.update(&rel.target, *id, &single(&inverse_key, Value::Null))?;
        }
        for id in &ids {
            db.update(&rel.target, *id, &single(&inverse_key, Value::from(owner_id)))?;
            self.forget(owner_model, &rel.name, *id);
        }
        tracing::debug!(
            model = owner_model,
            id = owner_id,
            relationship = %rel.name,
            ?ids,
            "assigned hasMany"
        );
        self.order
            .insert((owner_model.to_string(), owner_id, rel.name.clone()), ids);
        Ok(())
    }

    /// Drop `child` from every remembered order of `owner_model.relationship`.
    fn forget(&mut self, owner_model: &str, relationship: &str, child: RecordId) {
        for ((model, _, name), ids) in self.order.iter_mut() {
            if model == owner_model && name == relationship {
                ids.retain(|id| *id != child);
            }
        }
    }

    /// Null every foreign key pointing at `model#id` and drop it from every id list.
    ///
    /// Related rows themselves are left in place.
    pub fn detach(
        &mut self,
        db: &mut Db,
        models: &Models,
        model: &str,
        id: RecordId,
    ) -> Result<()> {
        for owner in models.iter() {
            for rel in owner.relationships.iter().filter(|rel| rel.target == model) {
                match rel.kind {
                    RelationshipKind::BelongsTo => {
                        let referencing: Vec<RecordId> = db
                            .all(&owner.name)
                            .iter()
                            .filter(|row| points_at(row, &rel.foreign_key, id))
                            .map(|row| row.id)
                            .collect();
                        let cleared = single(&rel.foreign_key, Value::Null);
                        for row_id in referencing {
                            db.update(&owner.name, row_id, &cleared)?;
                        }
                    }
                    RelationshipKind::HasMany if rel.stores_id_list() => {
                        let referencing: Vec<(RecordId, Vec<RecordId>)> = db
                            .all(&owner.name)
                            .iter()
                            .filter_map(|row| {
                                let list = id_list(row.attrs.get(&rel.foreign_key));
                                list.contains(&id).then(|| {
                                    let remaining =
                                        list.into_iter().filter(|other| *other != id).collect();
                                    (row.id, remaining)
                                })
                            })
                            .collect();
                        for (row_id, remaining) in referencing {
                            let list =
                                Value::Array(remaining.into_iter().map(Value::from).collect());
                            db.update(&owner.name, row_id, &single(&rel.foreign_key, list))?;
                        }
                    }
                    RelationshipKind::HasMany => {}
                }
            }
        }

        self.order
            .retain(|(owner, owner_id, _), _| !(owner == model && *owner_id == id));
        for ((owner, _, name), ids) in self.order.iter_mut() {
            let targets_model = models
                .get(owner)
                .and_then(|m| m.relationship(name))
                .is_some_and(|rel| rel.target == model);
            if targets_model {
                ids.retain(|other| *other != id);
            }
        }
        tracing::debug!(model, id, "detached relationships");
        Ok(())
    }

    /// Check that every stored foreign key references an existing row.
    pub fn validate_all(&self, db: &Db, models: &Models) -> Result<()> {
        for model in models.iter() {
            for row in db.all(&model.name) {
                for rel in &model.relationships {
                    let referenced = match rel.kind {
                        RelationshipKind::BelongsTo => row
                            .attrs
                            .get(&rel.foreign_key)
                            .filter(|value| !value.is_null())
                            .map(|value| match as_record_id(value) {
                                Some(id) => vec![id],
                                None => vec![0],
                            })
                            .unwrap_or_default(),
                        RelationshipKind::HasMany if rel.stores_id_list() => {
                            id_list(row.attrs.get(&rel.foreign_key))
                        }
                        RelationshipKind::HasMany => Vec::new(),
                    };
                    if let Some(missing) = referenced
                        .into_iter()
                        .find(|id| db.find(&rel.target, *id).is_none())
                    {
                        return Err(invalid(
                            &model.name,
                            rel,
                            format!(
                                "{} {} (referenced by {} {}) does not exist",
                                rel.target, missing, model.name, row.id
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

fn single(key: &str, value: Value) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert(key.to_string(), value);
    attrs
}

fn points_at(row: &Row, key: &str, id: RecordId) -> bool {
    row.attrs.get(key).and_then(as_record_id) == Some(id)
}

fn id_list(value: Option<&Value>) -> Vec<RecordId> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(as_record_id).collect(),
        _ => Vec::new(),
    }
}

fn inverse_foreign_key(
    models: &Models,
    rel: &ResolvedRelationship,
    inverse: &str,
) -> Result<String> {
    models
        .get(&rel.target)
        .and_then(|target| target.relationship(inverse))
        .map(|inverse| inverse.foreign_key.clone())
        .ok_or_else(|| Error::UnknownRelationship {
            model: rel.target.clone(),
            name: inverse.to_string(),
        })
}

fn check_target(
    db: &Db,
    owner_model: &str,
    rel: &ResolvedRelationship,
    target: &RecordRef,
) -> Result<()> {
    if target.model != rel.target {
        return Err(invalid(
            owner_model,
            rel,
            format!("expected a {} record, got {}", rel.target, target.model),
        ));
    }
    if db.find(&target.model, target.id).is_none() {
        return Err(invalid(
            owner_model,
            rel,
            format!("{} {} does not exist", target.model, target.id),
        ));
    }
    Ok(())
}

fn invalid(owner_model: &str, rel: &ResolvedRelationship, reason: String) -> Error {
    Error::InvalidRelationship {
        model: owner_model.to_string(),
        relationship: rel.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::model::ModelDefinition;
    use rstest::{fixture, rstest};
    use serde_json::json;

    struct Store {
        db: Db,
        models: Models,
        associations: Associations,
    }

    impl Store {
        fn insert(&mut self, model: &str, attrs: Value) -> RecordId {
            let mut row = Associations::defaults(&self.models, model);
            row.extend(attrs.as_object().cloned().unwrap_or_default());
            self.db.insert(model, row).id
        }

        fn rel(&self, model: &str, name: &str) -> ResolvedRelationship {
            self.models
                .get(model)
                .and_then(|m| m.relationship(name))
                .cloned()
                .expect("relationship exists")
        }

        fn assign(
            &mut self,
            model: &str,
            id: RecordId,
            name: &str,
            input: RelatedInput,
        ) -> Result<()> {
            let rel = self.rel(model, name);
            self.associations
                .assign(&mut self.db, &self.models, model, id, &rel, &input)
        }

        fn related_ids(&self, model: &str, id: RecordId, name: &str) -> Vec<RecordId> {
            let rel = self.rel(model, name);
            let row = self.db.find(model, id).expect("row exists");
            match self
                .associations
                .resolve(&self.db, &self.models, model, row, &rel)
                .expect("resolve")
            {
                Related::One(one) => one.map(|r| r.id()).into_iter().collect(),
                Related::Many(set) => set.ids(),
            }
        }

        fn attr(&self, model: &str, id: RecordId, key: &str) -> Value {
            self.db
                .find(model, id)
                .and_then(|row| row.attrs.get(key).cloned())
                .unwrap_or(Value::Null)
        }
    }

    fn many(model: &str, ids: &[RecordId]) -> RelatedInput {
        RelatedInput::Many(ids.iter().map(|id| RecordRef::new(model, *id)).collect())
    }

    fn one(model: &str, id: RecordId) -> RelatedInput {
        RelatedInput::One(Some(RecordRef::new(model, id)))
    }

    #[fixture]
    fn store() -> Store {
        let models = Models::resolve(vec![
            ("movie".to_string(), ModelDefinition::new().has_many("castMembers")),
            ("castMember".to_string(), ModelDefinition::new().belongs_to("movie")),
            ("tag".to_string(), ModelDefinition::new()),
            ("playlist".to_string(), ModelDefinition::new().has_many("tags")),
        ])
        .expect("Should resolve");
        Store {
            db: Db::new(),
            models,
            associations: Associations::new(),
        }
    }

    #[rstest]
    fn test_defaults_cover_foreign_keys(store: Store) {
        let cast = Associations::defaults(&store.models, "castMember");
        assert_eq!(cast.get("movieId"), Some(&Value::Null));
        let playlist = Associations::defaults(&store.models, "playlist");
        assert_eq!(playlist.get("tagIds"), Some(&json!([])));
        assert!(Associations::defaults(&store.models, "movie").is_empty());
    }

    #[rstest]
    fn test_has_many_reads_back_in_assigned_order(mut store: Store) {
        let movie = store.insert("movie", json!({}));
        for _ in 0..3 {
            store.insert("castMember", json!({}));
        }
        store
            .assign("movie", movie, "castMembers", many("castMember", &[3, 1]))
            .expect("assign");
        assert_eq!(store.related_ids("movie", movie, "castMembers"), vec![3, 1]);

        // a child attached from its own side goes after the assigned ones
        store.assign("castMember", 2, "movie", one("movie", movie)).expect("assign");
        assert_eq!(store.related_ids("movie", movie, "castMembers"), vec![3, 1, 2]);
    }

    #[rstest]
    fn test_reassigning_belongs_to_moves_child(mut store: Store) {
        let first = store.insert("movie", json!({}));
        let second = store.insert("movie", json!({}));
        let cast = store.insert("castMember", json!({}));

        store
            .assign("movie", first, "castMembers", many("castMember", &[cast]))
            .expect("assign");
        store.assign("castMember", cast, "movie", one("movie", second)).expect("assign");

        assert!(store.related_ids("movie", first, "castMembers").is_empty());
        assert_eq!(store.related_ids("movie", second, "castMembers"), vec![cast]);
        assert_eq!(store.attr("castMember", cast, "movieId"), json!(second));
    }

    #[rstest]
    fn test_duplicate_targets_are_collapsed(mut store: Store) {
        let playlist = store.insert("playlist", json!({}));
        store.insert("tag", json!({}));
        store.insert("tag", json!({}));
        store
            .assign("playlist", playlist, "tags", many("tag", &[2, 1, 2]))
            .expect("assign");
        assert_eq!(store.attr("playlist", playlist, "tagIds"), json!([2, 1]));
    }

    #[rstest]
    #[case::missing_target(one("movie", 7))]
    #[case::wrong_model(one("tag", 1))]
    #[case::list_for_belongs_to(many("movie", &[1]))]
    fn test_invalid_assignment_writes_nothing(mut store: Store, #[case] input: RelatedInput) {
        store.insert("movie", json!({}));
        store.insert("tag", json!({}));
        let cast = store.insert("castMember", json!({}));

        let err = store.assign("castMember", cast, "movie", input).unwrap_err();
        assert!(matches!(err, Error::InvalidRelationship { .. }), "{err}");
        assert_eq!(store.attr("castMember", cast, "movieId"), Value::Null);
    }

    #[rstest]
    fn test_assign_to_missing_owner_is_not_found(mut store: Store) {
        store.insert("movie", json!({}));
        let err = store
            .assign("castMember", 4, "movie", one("movie", 1))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 4, .. }));
    }

    #[rstest]
    fn test_detach_clears_foreign_keys_and_id_lists(mut store: Store) {
        let movie = store.insert("movie", json!({}));
        let cast = store.insert("castMember", json!({"movieId": movie}));
        let rock = store.insert("tag", json!({}));
        let jazz = store.insert("tag", json!({}));
        let playlist = store.insert("playlist", json!({"tagIds": [rock, jazz]}));

        store
            .associations
            .detach(&mut store.db, &store.models, "movie", movie)
            .expect("detach");
        store
            .associations
            .detach(&mut store.db, &store.models, "tag", rock)
            .expect("detach");

        assert_eq!(store.attr("castMember", cast, "movieId"), Value::Null);
        assert_eq!(store.attr("playlist", playlist, "tagIds"), json!([jazz]));
        assert!(store.db.find("movie", movie).is_some());
    }

    #[rstest]
    fn test_validate_all_reports_dangling_keys(mut store: Store) {
        store.insert("movie", json!({}));
        store.insert("castMember", json!({"movieId": 1}));
        store
            .associations
            .validate_all(&store.db, &store.models)
            .expect("valid");

        store.insert("playlist", json!({"tagIds": [3]}));
        let err = store
            .associations
            .validate_all(&store.db, &store.models)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRelationship { ref reason, .. } if reason.contains("tag 3")
        ));
    }
}
