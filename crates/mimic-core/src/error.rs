//! Crate-level error type shared by the store, the schema facade and the dispatcher.

use crate::config::error::ConfigError;
use crate::db::RecordId;
use crate::routing::HttpMethod;
use thiserror::Error;

/// Errors surfaced to handler authors and to the caller of `dispatch`.
#[derive(Debug, Error)]
pub enum Error {
    /// Identity lookup miss on find/update/destroy
    #[error("{model} with id {id} not found")]
    NotFound { model: String, id: RecordId },
    /// No route and no passthrough rule matched the request
    #[error("unhandled request: {method} {path} (no route or passthrough rule matches)")]
    UnhandledRequest { method: HttpMethod, path: String },
    /// Relationship assignment rejected at the point of assignment
    #[error("invalid value for relationship '{relationship}' on {model}: {reason}")]
    InvalidRelationship {
        model: String,
        relationship: String,
        reason: String,
    },
    /// Model name is not registered
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// Relationship name is not declared on the model
    #[error("{model} has no relationship named '{name}'")]
    UnknownRelationship { model: String, name: String },
    /// Factory trait is not declared on the blueprint
    #[error("factory for {model} has no trait named '{name}'")]
    UnknownTrait { model: String, name: String },
    /// Request body could not be turned into attributes
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    /// Path parameter missing or malformed
    #[error("invalid path parameter '{name}': {value:?}")]
    InvalidParam { name: String, value: Option<String> },
    /// Server was shut down
    #[error("server has been shut down")]
    ShutDown,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_unhandled_request_names_method_and_path() {
        let error = Error::UnhandledRequest {
            method: HttpMethod::Get,
            path: "/unregistered-path".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("GET /unregistered-path"));
    }

    #[rstest]
    #[case("movie", 1, "movie with id 1 not found")]
    #[case("castMember", 42, "castMember with id 42 not found")]
    fn test_not_found_display(#[case] model: &str, #[case] id: RecordId, #[case] expected: &str) {
        let error = Error::NotFound {
            model: model.to_string(),
            id,
        };
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    fn test_config_error_is_transparent() {
        let error = Error::from(ConfigError::UnknownModel("ghost".to_string()));
        assert_eq!(error.to_string(), "unknown model in configuration: ghost");
    }
}
