//! Error types for configuration parsing and server setup.

use crate::routing::HttpMethod;
use thiserror::Error;

/// Configuration error, raised while loading documents or freezing the server setup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Unknown file type
    #[error("Unknown file type: {0}")]
    UnknownFileType(String),
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Model referenced by a relationship, factory, serializer, route or fixture is not registered
    #[error("unknown model in configuration: {0}")]
    UnknownModel(String),
    /// Model registered twice
    #[error("model registered twice: {0}")]
    DuplicateModel(String),
    /// Relationship declared twice on the same model
    #[error("relationship '{name}' declared twice on {model}")]
    DuplicateRelationship { model: String, name: String },
    /// More than one relationship could serve as the inverse
    #[error("ambiguous inverse for {model}.{relationship}: candidates {candidates:?}")]
    AmbiguousInverse {
        model: String,
        relationship: String,
        candidates: Vec<String>,
    },
    /// Explicit inverse does not point back at the declaring model
    #[error("invalid inverse '{inverse}' for {model}.{relationship}")]
    InvalidInverse {
        model: String,
        relationship: String,
        inverse: String,
    },
    /// No default handler exists for this verb and path shape
    #[error("no shorthand for {method} {path}")]
    UnsupportedShorthand { method: HttpMethod, path: String },
    /// Path template could not be compiled
    #[error("invalid route path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: regex::Error,
    },
    /// Passthrough glob could not be compiled
    #[error("invalid passthrough pattern '{pattern}': {source}")]
    InvalidPassthrough {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::error::Error;

    #[rstest]
    fn test_config_error_json_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error = ConfigError::from(json_err);
        let display = format!("{}", error);
        assert!(display.contains("JSON parsing error"));
    }

    #[rstest]
    fn test_config_error_yaml_display() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: [").unwrap_err();
        let error = ConfigError::from(yaml_err);
        let display = format!("{}", error);
        assert!(display.contains("YAML parsing error"));
    }

    #[rstest]
    #[case("test.txt")]
    #[case("unknown.extension")]
    #[case("")]
    fn test_config_error_unknown_file_type_display(#[case] path: &str) {
        let error = ConfigError::UnknownFileType(path.to_string());
        let display = format!("{}", error);
        assert!(display.contains("Unknown file type"));
        assert!(display.contains(path));
    }

    #[rstest]
    fn test_config_error_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let error = ConfigError::from(json_err);
        assert!(error.source().is_some());

        let glob_err = glob::Pattern::new("a[").unwrap_err();
        let error = ConfigError::InvalidPassthrough {
            pattern: "a[".to_string(),
            source: glob_err,
        };
        assert!(error.source().is_some());

        let error = ConfigError::UnknownModel("ghost".to_string());
        assert!(error.source().is_none());
    }

    #[rstest]
    fn test_ambiguous_inverse_lists_candidates() {
        let error = ConfigError::AmbiguousInverse {
            model: "movie".to_string(),
            relationship: "castMembers".to_string(),
            candidates: vec!["movie".to_string(), "sequel".to_string()],
        };
        let display = error.to_string();
        assert!(display.contains("movie.castMembers"));
        assert!(display.contains("sequel"));
    }
}
