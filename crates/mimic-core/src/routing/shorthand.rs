//! Default CRUD handlers chosen from verb and path shape.

use crate::config::error::ConfigError;
use crate::db::Attrs;
use crate::error::{Error, Result};
use crate::naming::{to_camel_case, Inflector};
use crate::orm::{Models, Schema};
use crate::routing::handler::HandlerResult;
use crate::routing::method::HttpMethod;
use crate::routing::request::Request;
use crate::routing::response::Response;
use crate::routing::url::{PathPattern, Segment};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShorthandKind {
    /// GET collection
    List,
    /// GET member
    Find,
    /// POST
    Create,
    /// PUT/PATCH member
    Update,
    /// DELETE member
    Destroy,
}

/// Pick the default handler for a verb and path shape.
pub fn expand(method: HttpMethod, pattern: &PathPattern) -> Result<ShorthandKind, ConfigError> {
    let member = pattern.is_member();
    match (method, member) {
        (HttpMethod::Get, false) => Ok(ShorthandKind::List),
        (HttpMethod::Get, true) => Ok(ShorthandKind::Find),
        (HttpMethod::Post, false) => Ok(ShorthandKind::Create),
        (HttpMethod::Put | HttpMethod::Patch, true) => Ok(ShorthandKind::Update),
        (HttpMethod::Delete, true) => Ok(ShorthandKind::Destroy),
        _ => Err(ConfigError::UnsupportedShorthand {
            method,
            path: pattern.template().to_string(),
        }),
    }
}

/// Model named by the last literal segment: `/cast-members/:id` -> `castMember`.
pub fn infer_model(pattern: &PathPattern, inflector: &dyn Inflector) -> Option<String> {
    pattern
        .last_literal()
        .map(|segment| inflector.singularize(&to_camel_case(segment)))
}

/// Shorthand resolved against the registered models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shorthand {
    pub kind: ShorthandKind,
    pub model: String,
    /// Path parameter holding the member identity
    pub id_param: Option<String>,
}

impl Shorthand {
    pub fn resolve(
        method: HttpMethod,
        pattern: &PathPattern,
        model: Option<&str>,
        models: &Models,
        inflector: &dyn Inflector,
    ) -> Result<Self, ConfigError> {
        let kind = expand(method, pattern)?;
        let model = match model {
            Some(model) => model.to_string(),
            None => infer_model(pattern, inflector).ok_or_else(|| {
                ConfigError::UnsupportedShorthand {
                    method,
                    path: pattern.template().to_string(),
                }
            })?,
        };
        if !models.contains(&model) {
            return Err(ConfigError::UnknownModel(model));
        }
        let id_param = match pattern.segments().last() {
            Some(Segment::Param(name)) => Some(name.clone()),
            _ => None,
        };
        Ok(Self {
            kind,
            model,
            id_param,
        })
    }

    /// Run the default handler. A missing member becomes a 404 response.
    pub fn execute(&self, schema: &mut Schema, request: &Request) -> Result<HandlerResult> {
        let result = match self.kind {
            ShorthandKind::List => schema.all(&self.model).map(HandlerResult::from),
            ShorthandKind::Find => {
                let id = request.param_id(self.id_param())?;
                schema.find(&self.model, id).map(HandlerResult::from)
            }
            ShorthandKind::Create => {
                let attrs = body_attributes(request, &self.model)?;
                schema.create(&self.model, attrs).map(HandlerResult::from)
            }
            ShorthandKind::Update => {
                let id = request.param_id(self.id_param())?;
                let attrs = body_attributes(request, &self.model)?;
                schema.update(&self.model, id, attrs).map(HandlerResult::from)
            }
            ShorthandKind::Destroy => {
                let id = request.param_id(self.id_param())?;
                schema.destroy(&self.model, id).map(HandlerResult::from)
            }
        };
        match result {
            Err(error @ Error::NotFound { .. }) => Ok(HandlerResult::Response(Response::json(
                404,
                json!({ "errors": [error.to_string()] }),
            ))),
            other => other,
        }
    }

    fn id_param(&self) -> &str {
        self.id_param.as_deref().unwrap_or("id")
    }
}

/// Attributes from a JSON body: a root key naming the model is unwrapped and keys are
/// camelized.
fn body_attributes(request: &Request, model: &str) -> Result<Attrs> {
    let object = match request.json()? {
        None => return Ok(Attrs::new()),
        Some(Value::Object(object)) => object,
        Some(other) => {
            return Err(Error::InvalidBody(format!(
                "expected a JSON object, got {other}"
            )))
        }
    };

    let wrapped = object.len() == 1
        && object
            .iter()
            .all(|(key, value)| value.is_object() && to_camel_case(key) == model);
    let unwrapped = if wrapped {
        match object.into_iter().next() {
            Some((_, Value::Object(inner))) => inner,
            _ => Attrs::new(),
        }
    } else {
        object
    };
    Ok(unwrapped
        .into_iter()
        .map(|(key, value)| (to_camel_case(&key), value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::English;
    use crate::orm::ModelDefinition;
    use rstest::{fixture, rstest};

    #[fixture]
    fn models() -> Models {
        Models::resolve(vec![
            ("movie".to_string(), ModelDefinition::new().has_many("castMembers")),
            ("castMember".to_string(), ModelDefinition::new().belongs_to("movie")),
        ])
        .expect("Should resolve")
    }

    fn pattern(path: &str) -> PathPattern {
        PathPattern::compile(path).expect("Should compile")
    }

    #[rstest]
    #[case(HttpMethod::Get, "/movies", ShorthandKind::List)]
    #[case(HttpMethod::Get, "/movies/:id", ShorthandKind::Find)]
    #[case(HttpMethod::Post, "/movies", ShorthandKind::Create)]
    #[case(HttpMethod::Put, "/movies/:id", ShorthandKind::Update)]
    #[case(HttpMethod::Patch, "/movies/:id", ShorthandKind::Update)]
    #[case(HttpMethod::Delete, "/movies/:id", ShorthandKind::Destroy)]
    fn test_expand(#[case] method: HttpMethod, #[case] path: &str, #[case] kind: ShorthandKind) {
        assert_eq!(expand(method, &pattern(path)).expect("Should expand"), kind);
    }

    #[rstest]
    #[case(HttpMethod::Delete, "/movies")]
    #[case(HttpMethod::Patch, "/movies")]
    #[case(HttpMethod::Post, "/movies/:id")]
    #[case(HttpMethod::Head, "/movies")]
    fn test_expand_unsupported(#[case] method: HttpMethod, #[case] path: &str) {
        assert!(matches!(
            expand(method, &pattern(path)),
            Err(ConfigError::UnsupportedShorthand { .. })
        ));
    }

    #[rstest]
    #[case("/movies", Some("movie"))]
    #[case("/api/cast-members/:id", Some("castMember"))]
    #[case("/cast_members", Some("castMember"))]
    #[case("/people/:personId", Some("person"))]
    #[case("/:id", None)]
    fn test_infer_model(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            infer_model(&pattern(path), &English::new()).as_deref(),
            expected
        );
    }

    #[rstest]
    fn test_resolve_rejects_unknown_model(models: Models) {
        let err = Shorthand::resolve(
            HttpMethod::Get,
            &pattern("/directors"),
            None,
            &models,
            &English::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(ref m) if m == "director"));
    }

    #[rstest]
    fn test_create_unwraps_root_and_camelizes(models: Models) {
        let mut schema = Schema::new(models.clone());
        let shorthand = Shorthand::resolve(
            HttpMethod::Post,
            &pattern("/cast-members"),
            None,
            &models,
            &English::new(),
        )
        .expect("Should resolve");
        schema.create("movie", json!({})).expect("create");

        let request = Request::post("/cast-members")
            .with_json(&json!({"cast_member": {"first_name": "Ellen", "movie_id": 1}}));
        let result = shorthand.execute(&mut schema, &request).expect("Should run");

        let HandlerResult::Record(record) = result else {
            panic!("expected a record");
        };
        assert_eq!(record.get("firstName"), Some(&json!("Ellen")));
        assert_eq!(record.get("movieId"), Some(&json!(1)));
    }

    #[rstest]
    fn test_find_missing_becomes_404(models: Models) {
        let mut schema = Schema::new(models.clone());
        let shorthand = Shorthand::resolve(
            HttpMethod::Get,
            &pattern("/movies/:id"),
            None,
            &models,
            &English::new(),
        )
        .expect("Should resolve");
        let mut request = Request::get("/movies/4");
        request.params.insert("id".to_string(), "4".to_string());

        let result = shorthand.execute(&mut schema, &request).expect("Should run");
        assert!(matches!(result, HandlerResult::Response(ref r) if r.status == 404));
    }

    #[rstest]
    fn test_invalid_body(models: Models) {
        let mut schema = Schema::new(models.clone());
        let shorthand = Shorthand::resolve(
            HttpMethod::Post,
            &pattern("/movies"),
            None,
            &models,
            &English::new(),
        )
        .expect("Should resolve");
        let request = Request::post("/movies").with_body("[1, 2]");
        assert!(matches!(
            shorthand.execute(&mut schema, &request),
            Err(Error::InvalidBody(_))
        ));
    }
}
