//! Declarative server document: everything a [`crate::ServerBuilder`] takes except closures.

use crate::db::Attrs;
use crate::orm::{ModelDefinition, Relationship};
use crate::routing::{Handler, HttpMethod, ResourceOptions, RouteRegistry};
use crate::serializer::SerializerOverrides;
use crate::server::Environment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key under `serializers` holding the application-wide configuration.
pub const APPLICATION_SERIALIZER: &str = "application";

/// Server configuration document (YAML, JSON or JSONC)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// Path prefix for every route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Origin the routes are served from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_prefix: Option<String>,
    /// Server-wide latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<u64>,
    /// Log every handled request at info level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<bool>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelDocument>,
    /// Per-model overrides; the `application` entry is the default for every model
    #[serde(default)]
    pub serializers: BTreeMap<String, SerializerOverrides>,
    #[serde(default)]
    pub routes: Vec<RouteDocument>,
    #[serde(default)]
    pub resources: Vec<ResourceDocument>,
    #[serde(default)]
    pub passthrough: Vec<PassthroughDocument>,
    /// Rows inserted verbatim, keyed by model
    #[serde(default)]
    pub fixtures: BTreeMap<String, Vec<Attrs>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelDocument {
    #[serde(default)]
    pub has_many: Vec<RelationshipDocument>,
    #[serde(default)]
    pub belongs_to: Vec<RelationshipDocument>,
}

/// Relationship given by name, or with an explicit target model and inverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipDocument {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inverse: Option<String>,
    },
}

impl RelationshipDocument {
    fn apply(&self, relationship: fn(String) -> Relationship) -> Relationship {
        match self {
            RelationshipDocument::Name(name) => relationship(name.clone()),
            RelationshipDocument::Detailed {
                name,
                model,
                inverse,
            } => {
                let mut rel = relationship(name.clone());
                rel.model = model.clone();
                rel.inverse = inverse.clone();
                rel
            }
        }
    }
}

impl ModelDocument {
    pub fn to_definition(&self) -> ModelDefinition {
        let has_many = self
            .has_many
            .iter()
            .map(|rel| rel.apply(|name: String| Relationship::has_many(name)));
        let belongs_to = self
            .belongs_to
            .iter()
            .map(|rel| rel.apply(|name: String| Relationship::belongs_to(name)));
        has_many
            .chain(belongs_to)
            .fold(ModelDefinition::new(), ModelDefinition::relationship)
    }
}

/// Route with a static body, or a shorthand when `body` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteDocument {
    pub method: HttpMethod,
    pub path: String,
    /// Shorthand model when it cannot be inferred from the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub name: String,
    #[serde(flatten)]
    pub options: ResourceOptions,
}

/// Passthrough rule; without patterns it covers the current origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PassthroughDocument {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
}

impl ServerDocument {
    pub fn model_definitions(&self) -> Vec<(String, ModelDefinition)> {
        self.models
            .iter()
            .map(|(name, model)| (name.clone(), model.to_definition()))
            .collect()
    }

    /// Register the document's namespace, timing, routes, resources and passthrough rules.
    pub fn register_routes(&self, registry: &mut RouteRegistry) {
        if let Some(prefix) = &self.url_prefix {
            registry.url_prefix(prefix.clone());
        }
        if let Some(namespace) = &self.namespace {
            registry.namespace(namespace.clone());
        }
        if let Some(timing) = self.timing {
            registry.timing(timing);
        }
        for route in &self.routes {
            let handler = match (&route.body, &route.model) {
                (Some(body), _) => Handler::value(body.clone()),
                (None, Some(model)) => Handler::shorthand_for(model.clone()),
                (None, None) => Handler::shorthand(),
            };
            let pending = registry.route(route.method, &route.path, handler);
            if let Some(status) = route.status {
                pending.status(status);
            }
            if let Some(timing) = route.timing {
                pending.timing(timing);
            }
        }
        for resource in &self.resources {
            registry.resource(&resource.name, resource.options.clone());
        }
        for rule in &self.passthrough {
            if rule.patterns.is_empty() {
                registry.passthrough_current_origin(&rule.methods);
            } else {
                let patterns: Vec<&str> = rule.patterns.iter().map(String::as_str).collect();
                registry.passthrough(&patterns, &rule.methods);
            }
        }
    }
}
