//! Route handlers and their tagged results.

use crate::error::Result;
use crate::orm::{Record, RecordSet, Related, Schema};
use crate::routing::request::Request;
use crate::routing::response::Response;
use serde_json::Value;
use std::fmt;

pub type HandlerFn = Box<dyn Fn(&mut Schema, &Request) -> Result<HandlerResult>>;

/// What a route does when it matches.
pub enum Handler {
    /// Default CRUD handler chosen from verb and path shape when the router is frozen
    Shorthand { model: Option<String> },
    /// Static payload, returned as-is
    Value(Value),
    /// User-defined handler with schema access
    Function(HandlerFn),
}

impl Handler {
    /// Shorthand whose model is inferred from the path.
    pub fn shorthand() -> Self {
        Handler::Shorthand { model: None }
    }

    pub fn shorthand_for(model: impl Into<String>) -> Self {
        Handler::Shorthand {
            model: Some(model.into()),
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Handler::Value(value.into())
    }

    pub fn function<F, R>(handler: F) -> Self
    where
        F: Fn(&mut Schema, &Request) -> Result<R> + 'static,
        R: Into<HandlerResult>,
    {
        Handler::Function(Box::new(move |schema, request| {
            handler(schema, request).map(Into::into)
        }))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Shorthand { model } => f
                .debug_struct("Shorthand")
                .field("model", model)
                .finish(),
            Handler::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Handler::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Handler return value; the discriminant decides how it is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// Plain data, emitted without serializer processing
    Value(Value),
    /// Serialized through the serializer layer
    Record(Record),
    Records(RecordSet),
    /// Used verbatim, serialization bypassed
    Response(Response),
    /// No body
    Empty,
}

impl From<Value> for HandlerResult {
    fn from(value: Value) -> Self {
        HandlerResult::Value(value)
    }
}

impl From<Record> for HandlerResult {
    fn from(record: Record) -> Self {
        HandlerResult::Record(record)
    }
}

impl From<Option<Record>> for HandlerResult {
    fn from(record: Option<Record>) -> Self {
        record.map_or(HandlerResult::Value(Value::Null), HandlerResult::Record)
    }
}

impl From<RecordSet> for HandlerResult {
    fn from(records: RecordSet) -> Self {
        HandlerResult::Records(records)
    }
}

impl From<Related> for HandlerResult {
    fn from(related: Related) -> Self {
        match related {
            Related::One(record) => record.into(),
            Related::Many(records) => records.into(),
        }
    }
}

impl From<Response> for HandlerResult {
    fn from(response: Response) -> Self {
        HandlerResult::Response(response)
    }
}

impl From<()> for HandlerResult {
    fn from(_: ()) -> Self {
        HandlerResult::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ModelDefinition, Models};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_function_handler_converts_result() {
        let models = Models::resolve(vec![("movie".to_string(), ModelDefinition::new())])
            .expect("Should resolve");
        let mut schema = Schema::new(models);
        let handler = Handler::function(|schema, _request| schema.create("movie", json!({"title": "Alien"})));

        let Handler::Function(run) = handler else {
            panic!("expected a function handler");
        };
        let result = run(&mut schema, &Request::post("/movies")).expect("Should run");
        assert!(matches!(result, HandlerResult::Record(ref r) if r.id() == 1));
    }

    #[rstest]
    #[case(HandlerResult::from(json!({"a": 1})), "Value")]
    #[case(HandlerResult::from(()), "Empty")]
    #[case(HandlerResult::from(None::<Record>), "Value")]
    #[case(HandlerResult::from(Response::empty(500)), "Response")]
    fn test_handler_result_conversions(#[case] result: HandlerResult, #[case] kind: &str) {
        assert!(format!("{result:?}").starts_with(kind));
    }

    #[rstest]
    fn test_handler_debug_hides_closures() {
        let handler = Handler::function(|_schema, _request| Ok(()));
        assert_eq!(format!("{handler:?}"), "Function(..)");
        assert!(format!("{:?}", Handler::shorthand_for("movie")).contains("movie"));
    }
}
