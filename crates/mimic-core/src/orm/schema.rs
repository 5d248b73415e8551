//! Schema facade: the only entry point handlers use to reach stored data.

use crate::db::{as_record_id, Attrs, Db, RecordId};
use crate::error::{Error, Result};
use crate::orm::association::Associations;
use crate::orm::model::{Models, RelationshipKind, ResolvedModel, ResolvedRelationship};
use crate::orm::record::{Attributes, Record, RecordRef, RecordSet, Related, RelatedInput};
use serde_json::Value;
use std::collections::BTreeMap;

/// Relationship assignments extracted from create/update input.
type Assignments = Vec<(ResolvedRelationship, RelatedInput)>;

/// Typed access to the identity store for a fixed set of models.
///
/// Every mutation goes through the association manager, so foreign keys stay consistent
/// after each call returns. `find` reports a missing identity as [`Error::NotFound`];
/// `find_by` and `first` report "no match" as `None`.
#[derive(Debug, Clone)]
pub struct Schema {
    db: Db,
    models: Models,
    associations: Associations,
}

impl Schema {
    pub fn new(models: Models) -> Self {
        let mut db = Db::new();
        for name in models.names() {
            db.create_collection(name);
        }
        Self {
            db,
            models,
            associations: Associations::new(),
        }
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Read-only view of the underlying store.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Accessor bound to one model, e.g. `schema.model("movie")?.all()`.
    pub fn model(&mut self, name: &str) -> Result<ModelAccessor<'_>> {
        self.resolved(name)?;
        Ok(ModelAccessor {
            schema: self,
            name: name.to_string(),
        })
    }

    fn resolved(&self, model: &str) -> Result<&ResolvedModel> {
        self.models
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    pub fn all(&self, model: &str) -> Result<RecordSet> {
        self.resolved(model)?;
        let records = self
            .db
            .all(model)
            .iter()
            .map(|row| Record::from_row(model, row))
            .collect();
        Ok(RecordSet::new(model, records))
    }

    pub fn find(&self, model: &str, id: RecordId) -> Result<Record> {
        self.resolved(model)?;
        self.db
            .find(model, id)
            .map(|row| Record::from_row(model, row))
            .ok_or_else(|| Error::NotFound {
                model: model.to_string(),
                id,
            })
    }

    /// Records of `model` whose attributes equal every key of `predicate` (the `where` query).
    pub fn filter(&self, model: &str, predicate: impl Into<Attributes>) -> Result<RecordSet> {
        self.resolved(model)?;
        let predicate = predicate.into();
        let records = self
            .db
            .filter(model, predicate.values())
            .into_iter()
            .map(|row| Record::from_row(model, row))
            .collect();
        Ok(RecordSet::new(model, records))
    }

    pub fn find_by(&self, model: &str, predicate: impl Into<Attributes>) -> Result<Option<Record>> {
        Ok(self.filter(model, predicate)?.into_iter().next())
    }

    pub fn first(&self, model: &str) -> Result<Option<Record>> {
        self.resolved(model)?;
        Ok(self
            .db
            .all(model)
            .first()
            .map(|row| Record::from_row(model, row)))
    }

    /// Insert a record, then apply relationship assignments from `attrs`.
    ///
    /// Foreign-key attributes (`movieId`, `castMemberIds`) are treated as assignments too.
    /// Every assignment is validated before the row is inserted.
    pub fn create(&mut self, model: &str, attrs: impl Into<Attributes>) -> Result<Record> {
        let resolved = self.resolved(model)?.clone();
        let (values, assignments) = split_attributes(&resolved, attrs.into())?;
        for (rel, input) in &assignments {
            self.associations.validate(&self.db, model, rel, input)?;
        }

        let mut row_attrs = Associations::defaults(&self.models, model);
        row_attrs.extend(values);
        let row = self.db.insert(model, row_attrs);

        for (rel, input) in &assignments {
            self.associations
                .assign(&mut self.db, &self.models, model, row.id, rel, input)?;
        }
        self.find(model, row.id)
    }

    /// Merge attributes into an existing record; unspecified attributes are left untouched.
    pub fn update(
        &mut self,
        model: &str,
        id: RecordId,
        attrs: impl Into<Attributes>,
    ) -> Result<Record> {
        let resolved = self.resolved(model)?.clone();
        let (values, assignments) = split_attributes(&resolved, attrs.into())?;
        if self.db.find(model, id).is_none() {
            return Err(Error::NotFound {
                model: model.to_string(),
                id,
            });
        }
        for (rel, input) in &assignments {
            self.associations.validate(&self.db, model, rel, input)?;
        }

        if !values.is_empty() {
            self.db.update(model, id, &values)?;
        }
        for (rel, input) in &assignments {
            self.associations
                .assign(&mut self.db, &self.models, model, id, rel, input)?;
        }
        self.find(model, id)
    }

    /// Delete a record.
    ///
    /// Foreign keys pointing at it are nulled and it is dropped from id lists; related
    /// records are never deleted.
    pub fn destroy(&mut self, model: &str, id: RecordId) -> Result<()> {
        self.find(model, id)?;
        self.associations
            .detach(&mut self.db, &self.models, model, id)?;
        self.db.remove(model, id)?;
        Ok(())
    }

    /// Resolve a relationship of `record` against the current store contents.
    pub fn related(&self, record: &Record, name: &str) -> Result<Related> {
        let rel = self.relationship(record.model(), name)?;
        let row = self
            .db
            .find(record.model(), record.id())
            .ok_or_else(|| Error::NotFound {
                model: record.model().to_string(),
                id: record.id(),
            })?;
        self.associations
            .resolve(&self.db, &self.models, record.model(), row, rel)
    }

    /// Relationship setter with full-replace semantics for hasMany.
    pub fn associate(
        &mut self,
        model: &str,
        id: RecordId,
        name: &str,
        input: RelatedInput,
    ) -> Result<()> {
        let rel = self.relationship(model, name)?.clone();
        self.associations
            .assign(&mut self.db, &self.models, model, id, &rel, &input)
    }

    fn relationship(&self, model: &str, name: &str) -> Result<&ResolvedRelationship> {
        self.resolved(model)?
            .relationship(name)
            .ok_or_else(|| Error::UnknownRelationship {
                model: model.to_string(),
                name: name.to_string(),
            })
    }

    /// Insert rows verbatim (foreign keys included), then check that every foreign key resolves.
    ///
    /// Identities are assigned in row order; a row that declares an `id` must declare the one
    /// it is going to get. On error the store is left as it was before the call.
    pub fn load_fixtures(&mut self, fixtures: &BTreeMap<String, Vec<Attrs>>) -> Result<()> {
        for model in fixtures.keys() {
            self.resolved(model)?;
        }
        let snapshot = self.db.clone();
        let loaded = self.insert_fixtures(fixtures);
        if loaded.is_err() {
            self.db = snapshot;
        }
        loaded
    }

    fn insert_fixtures(&mut self, fixtures: &BTreeMap<String, Vec<Attrs>>) -> Result<()> {
        for (model, rows) in fixtures {
            for attrs in rows {
                let mut row_attrs = Associations::defaults(&self.models, model);
                row_attrs.extend(attrs.clone());
                let row = self.db.insert(model, row_attrs);
                if let Some(declared) = attrs.get("id") {
                    if as_record_id(declared) != Some(row.id) {
                        return Err(Error::InvalidBody(format!(
                            "fixture for {model} declares id {declared} but was assigned {}",
                            row.id
                        )));
                    }
                }
            }
            tracing::debug!(model = %model, count = rows.len(), "loaded fixtures");
        }
        self.associations.validate_all(&self.db, &self.models)
    }

    /// JSON snapshot of every collection.
    pub fn dump(&self) -> Value {
        self.db.dump()
    }

    /// Discard all records and reset identity counters.
    pub fn clear(&mut self) {
        self.db.clear();
        self.associations.clear();
        for name in self.models.names() {
            self.db.create_collection(name);
        }
    }
}

/// Separate plain attributes from relationship assignments.
fn split_attributes(model: &ResolvedModel, attrs: Attributes) -> Result<(Attrs, Assignments)> {
    let mut values = Attrs::new();
    let mut assignments: Assignments = Vec::new();

    for (key, value) in attrs.values {
        if key == "id" {
            continue;
        }
        if model.relationship(&key).is_some() {
            return Err(Error::InvalidRelationship {
                model: model.name.clone(),
                relationship: key,
                reason: "relationships take records, not attribute values".to_string(),
            });
        }
        match model.relationship_by_foreign_key(&key) {
            Some(rel) => {
                let input = foreign_key_input(model, rel, &value)?;
                push_assignment(&mut assignments, rel.clone(), input);
            }
            None => {
                values.insert(key, value);
            }
        }
    }

    for (name, input) in attrs.relations {
        let rel = model
            .relationship(&name)
            .ok_or_else(|| Error::UnknownRelationship {
                model: model.name.clone(),
                name: name.clone(),
            })?;
        push_assignment(&mut assignments, rel.clone(), input);
    }
    Ok((values, assignments))
}

fn push_assignment(assignments: &mut Assignments, rel: ResolvedRelationship, input: RelatedInput) {
    assignments.retain(|(existing, _)| existing.name != rel.name);
    assignments.push((rel, input));
}

fn foreign_key_input(
    model: &ResolvedModel,
    rel: &ResolvedRelationship,
    value: &Value,
) -> Result<RelatedInput> {
    let invalid = || Error::InvalidRelationship {
        model: model.name.clone(),
        relationship: rel.name.clone(),
        reason: format!("{value} is not a valid value for {}", rel.foreign_key),
    };
    match rel.kind {
        RelationshipKind::BelongsTo if value.is_null() => Ok(RelatedInput::One(None)),
        RelationshipKind::BelongsTo => as_record_id(value)
            .map(|id| RelatedInput::One(Some(RecordRef::new(rel.target.clone(), id))))
            .ok_or_else(invalid),
        RelationshipKind::HasMany => match value {
            Value::Null => Ok(RelatedInput::Many(Vec::new())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    as_record_id(item)
                        .map(|id| RecordRef::new(rel.target.clone(), id))
                        .ok_or_else(invalid)
                })
                .collect::<Result<Vec<_>>>()
                .map(RelatedInput::Many),
            _ => Err(invalid()),
        },
    }
}

/// Schema operations bound to one model.
#[derive(Debug)]
pub struct ModelAccessor<'a> {
    schema: &'a mut Schema,
    name: String,
}

impl ModelAccessor<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn all(&self) -> Result<RecordSet> {
        self.schema.all(&self.name)
    }

    pub fn find(&self, id: RecordId) -> Result<Record> {
        self.schema.find(&self.name, id)
    }

    pub fn find_by(&self, predicate: impl Into<Attributes>) -> Result<Option<Record>> {
        self.schema.find_by(&self.name, predicate)
    }

    pub fn filter(&self, predicate: impl Into<Attributes>) -> Result<RecordSet> {
        self.schema.filter(&self.name, predicate)
    }

    pub fn first(&self) -> Result<Option<Record>> {
        self.schema.first(&self.name)
    }

    pub fn create(&mut self, attrs: impl Into<Attributes>) -> Result<Record> {
        self.schema.create(&self.name, attrs)
    }

    pub fn len(&self) -> usize {
        self.schema.db.all(&self.name).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::model::ModelDefinition;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn schema() -> Schema {
        let models = Models::resolve(vec![
            (
                "movie".to_string(),
                ModelDefinition::new().has_many("castMembers"),
            ),
            (
                "castMember".to_string(),
                ModelDefinition::new().belongs_to("movie"),
            ),
            ("tag".to_string(), ModelDefinition::new()),
            (
                "playlist".to_string(),
                ModelDefinition::new().has_many("tags"),
            ),
        ])
        .expect("Should resolve");
        Schema::new(models)
    }

    fn names(set: &RecordSet) -> Vec<Value> {
        set.iter()
            .map(|r| r.get("name").cloned().unwrap_or(Value::Null))
            .collect()
    }

    #[rstest]
    fn test_create_assigns_increasing_ids(mut schema: Schema) {
        let mut movies = schema.model("movie").expect("model exists");
        let ids: Vec<RecordId> = (0..3)
            .map(|_| movies.create(json!({"title": "x"})).expect("create").id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        schema.destroy("movie", 3).expect("destroy");
        let next = schema.create("movie", json!({})).expect("create");
        assert_eq!(next.id(), 4);
    }

    #[rstest]
    fn test_create_ignores_id_and_defaults_foreign_keys(mut schema: Schema) {
        let cast = schema
            .create("castMember", json!({"id": 40, "name": "Ripley"}))
            .expect("create");
        assert_eq!(cast.id(), 1);
        assert_eq!(cast.get("movieId"), Some(&Value::Null));

        let playlist = schema.create("playlist", json!({})).expect("create");
        assert_eq!(playlist.get("tagIds"), Some(&json!([])));
    }

    #[rstest]
    fn test_find_missing_is_not_found(schema: Schema) {
        let err = schema.find("movie", 9).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref model, id: 9 } if model == "movie"));
    }

    #[rstest]
    fn test_unknown_model(mut schema: Schema) {
        assert!(matches!(schema.all("ghost"), Err(Error::UnknownModel(_))));
        assert!(matches!(schema.model("ghost"), Err(Error::UnknownModel(_))));
    }

    #[rstest]
    fn test_filter_and_find_by(mut schema: Schema) {
        schema.create("movie", json!({"title": "Alien", "year": 1979})).expect("create");
        schema.create("movie", json!({"title": "Aliens", "year": 1986})).expect("create");
        schema.create("movie", json!({"title": "Alien 3", "year": 1979})).expect("create");

        let seventies = schema.filter("movie", json!({"year": 1979})).expect("filter");
        assert_eq!(seventies.ids(), vec![1, 3]);

        let found = schema
            .find_by("movie", json!({"title": "Aliens"}))
            .expect("find_by");
        assert_eq!(found.map(|r| r.id()), Some(2));
        assert_eq!(
            schema.find_by("movie", json!({"title": "Heat"})).expect("find_by"),
            None
        );
    }

    #[rstest]
    fn test_belongs_to_setter_is_visible_from_both_sides(mut schema: Schema) {
        let movie = schema.create("movie", json!({"title": "Alien"})).expect("create");
        let mut cast = schema.create("castMember", json!({"name": "Ripley"})).expect("create");

        cast.set(&mut schema, "movie", &movie).expect("set");
        assert_eq!(cast.get("movieId"), Some(&json!(1)));
        let owner = cast.belongs_to(&schema, "movie").expect("resolve");
        assert_eq!(owner.map(|m| m.id()), Some(movie.id()));
        let members = movie.has_many(&schema, "castMembers").expect("resolve");
        assert_eq!(members.ids(), vec![cast.id()]);
    }

    #[rstest]
    fn test_has_many_replace_keeps_order_and_clears_dropped(mut schema: Schema) {
        let mut movie = schema.create("movie", json!({})).expect("create");
        let a = schema.create("castMember", json!({"name": "a"})).expect("create");
        let b = schema.create("castMember", json!({"name": "b"})).expect("create");
        let c = schema.create("castMember", json!({"name": "c"})).expect("create");

        movie
            .set(&mut schema, "castMembers", vec![a.clone(), b.clone()])
            .expect("set");
        movie
            .set(&mut schema, "castMembers", vec![c.clone(), a.clone()])
            .expect("set");

        let members = movie.has_many(&schema, "castMembers").expect("resolve");
        assert_eq!(members.ids(), vec![c.id(), a.id()]);
        let dropped = schema.find("castMember", b.id()).expect("find");
        assert_eq!(dropped.get("movieId"), Some(&Value::Null));
        let kept = schema.find("castMember", a.id()).expect("find");
        assert_eq!(kept.get("movieId"), Some(&json!(movie.id())));
    }

    #[rstest]
    fn test_has_many_moves_records_between_owners(mut schema: Schema) {
        let mut first = schema.create("movie", json!({})).expect("create");
        let mut second = schema.create("movie", json!({})).expect("create");
        let cast = schema.create("castMember", json!({})).expect("create");

        first.set(&mut schema, "castMembers", vec![cast.clone()]).expect("set");
        second.set(&mut schema, "castMembers", vec![cast.clone()]).expect("set");

        assert!(first.has_many(&schema, "castMembers").expect("resolve").is_empty());
        assert_eq!(
            second.has_many(&schema, "castMembers").expect("resolve").ids(),
            vec![cast.id()]
        );
        first.reload(&schema).expect("reload");
    }

    #[rstest]
    fn test_create_with_relationships(mut schema: Schema) {
        let movie = schema.create("movie", json!({"title": "Alien"})).expect("create");
        let by_record = schema
            .create(
                "castMember",
                Attributes::new().with("name", "Ripley").relate("movie", &movie),
            )
            .expect("create");
        let by_key = schema
            .create("castMember", json!({"name": "Ash", "movieId": 1}))
            .expect("create");

        assert_eq!(by_record.get("movieId"), Some(&json!(1)));
        assert_eq!(by_key.get("movieId"), Some(&json!(1)));
        let members = movie.has_many(&schema, "castMembers").expect("resolve");
        assert_eq!(names(&members), vec![json!("Ripley"), json!("Ash")]);
    }

    #[rstest]
    fn test_create_has_many_from_foreign_keys(mut schema: Schema) {
        schema.create("castMember", json!({"name": "a"})).expect("create");
        schema.create("castMember", json!({"name": "b"})).expect("create");
        let movie = schema
            .create("movie", json!({"castMemberIds": [2, 1]}))
            .expect("create");
        assert_eq!(
            movie.has_many(&schema, "castMembers").expect("resolve").ids(),
            vec![2, 1]
        );
    }

    #[rstest]
    fn test_id_list_has_many_without_inverse(mut schema: Schema) {
        let rock = schema.create("tag", json!({"name": "rock"})).expect("create");
        let jazz = schema.create("tag", json!({"name": "jazz"})).expect("create");
        let mut playlist = schema.create("playlist", json!({})).expect("create");

        playlist
            .set(&mut schema, "tags", vec![jazz.clone(), rock.clone()])
            .expect("set");
        assert_eq!(playlist.get("tagIds"), Some(&json!([2, 1])));
        let tags = playlist.has_many(&schema, "tags").expect("resolve");
        assert_eq!(names(&tags), vec![json!("jazz"), json!("rock")]);

        schema.destroy("tag", jazz.id()).expect("destroy");
        playlist.reload(&schema).expect("reload");
        assert_eq!(playlist.get("tagIds"), Some(&json!([1])));
    }

    #[rstest]
    #[case(json!({"movieId": 99}))]
    #[case(json!({"movieId": "abc"}))]
    #[case(json!({"movie": {"title": "Alien"}}))]
    fn test_invalid_relationship_values(mut schema: Schema, #[case] attrs: Value) {
        let err = schema.create("castMember", attrs).unwrap_err();
        assert!(matches!(err, Error::InvalidRelationship { .. }), "{err}");
        assert!(schema.all("castMember").expect("all").is_empty());
    }

    #[rstest]
    fn test_setter_rejects_wrong_model(mut schema: Schema) {
        let tag = schema.create("tag", json!({})).expect("create");
        let mut cast = schema.create("castMember", json!({})).expect("create");
        let err = cast.set(&mut schema, "movie", &tag).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRelationship { ref reason, .. } if reason.contains("movie")
        ));
        assert_eq!(cast.get("movieId"), Some(&Value::Null));
    }

    #[rstest]
    fn test_unknown_relationship(mut schema: Schema) {
        let movie = schema.create("movie", json!({})).expect("create");
        assert!(matches!(
            movie.related(&schema, "director"),
            Err(Error::UnknownRelationship { .. })
        ));
    }

    #[rstest]
    fn test_update_merges_and_rewires(mut schema: Schema) {
        schema.create("movie", json!({})).expect("create");
        schema.create("movie", json!({})).expect("create");
        let mut cast = schema
            .create("castMember", json!({"name": "Ripley", "age": 30, "movieId": 1}))
            .expect("create");

        cast.update(&mut schema, json!({"age": 31, "movieId": 2}))
            .expect("update");
        assert_eq!(cast.get("name"), Some(&json!("Ripley")));
        assert_eq!(cast.get("age"), Some(&json!(31)));
        assert_eq!(cast.get("movieId"), Some(&json!(2)));
        assert!(matches!(
            schema.update("castMember", 7, json!({"age": 1})),
            Err(Error::NotFound { id: 7, .. })
        ));
    }

    #[rstest]
    fn test_destroy_nulls_inbound_foreign_keys_without_cascading(mut schema: Schema) {
        let movie = schema.create("movie", json!({})).expect("create");
        schema.create("castMember", json!({"movieId": 1})).expect("create");
        schema.create("castMember", json!({"movieId": 1})).expect("create");
        schema.create("tag", json!({})).expect("create");

        movie.destroy(&mut schema).expect("destroy");

        assert!(schema.all("movie").expect("all").is_empty());
        assert!(matches!(schema.find("movie", 1), Err(Error::NotFound { .. })));
        let cast = schema.all("castMember").expect("all");
        assert_eq!(cast.len(), 2);
        assert!(cast.iter().all(|c| c.get("movieId") == Some(&Value::Null)));
        assert_eq!(schema.all("tag").expect("all").len(), 1);
    }

    #[rstest]
    fn test_destroy_missing_is_not_found(mut schema: Schema) {
        assert!(matches!(
            schema.destroy("movie", 1),
            Err(Error::NotFound { .. })
        ));
    }

    #[rstest]
    fn test_load_fixtures_validates_foreign_keys(mut schema: Schema) {
        let mut fixtures = BTreeMap::new();
        fixtures.insert(
            "movie".to_string(),
            vec![json!({"id": 1, "title": "Alien"}).as_object().cloned().unwrap_or_default()],
        );
        fixtures.insert(
            "castMember".to_string(),
            vec![json!({"movieId": 1}).as_object().cloned().unwrap_or_default()],
        );
        schema.load_fixtures(&fixtures).expect("Should load");
        let movie = schema.find("movie", 1).expect("find");
        assert_eq!(movie.has_many(&schema, "castMembers").expect("resolve").len(), 1);

        let mut broken = BTreeMap::new();
        broken.insert(
            "castMember".to_string(),
            vec![json!({"movieId": 5}).as_object().cloned().unwrap_or_default()],
        );
        assert!(matches!(
            schema.load_fixtures(&broken),
            Err(Error::InvalidRelationship { .. })
        ));
    }

    #[rstest]
    #[case::dangling_foreign_key(json!({"name": "Ghost", "movieId": 5}))]
    #[case::mismatched_id(json!({"id": 3, "name": "Ghost"}))]
    fn test_failed_fixture_load_leaves_store_unchanged(mut schema: Schema, #[case] row: Value) {
        schema.create("movie", json!({"title": "Alien"})).expect("create");
        let before = schema.dump();

        let mut fixtures = BTreeMap::new();
        fixtures.insert(
            "castMember".to_string(),
            vec![row.as_object().cloned().unwrap_or_default()],
        );
        assert!(schema.load_fixtures(&fixtures).is_err());

        assert_eq!(schema.dump(), before);
        let next = schema.create("castMember", json!({})).expect("create");
        assert_eq!(next.id(), 1);
    }

    #[rstest]
    fn test_clear_resets_counters(mut schema: Schema) {
        schema.create("movie", json!({})).expect("create");
        schema.clear();
        assert!(schema.all("movie").expect("all").is_empty());
        assert_eq!(schema.create("movie", json!({})).expect("create").id(), 1);
    }
}
