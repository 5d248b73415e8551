//! Route registration, frozen into a [`Router`] before serving.

use crate::config::error::ConfigError;
use crate::naming::Inflector;
use crate::orm::Models;
use crate::routing::handler::Handler;
use crate::routing::method::HttpMethod;
use crate::routing::passthrough::PassthroughRule;
use crate::routing::router::{Route, RouteAction, Router};
use crate::routing::shorthand::Shorthand;
use crate::routing::url::{join_path, PathPattern};
use serde::{Deserialize, Serialize};

/// Route declared during configuration.
#[derive(Debug)]
pub struct PendingRoute {
    method: HttpMethod,
    path: String,
    origin: Option<String>,
    handler: Handler,
    timing: Option<u64>,
    status: Option<u16>,
}

impl PendingRoute {
    /// Artificial latency in milliseconds for this route.
    pub fn timing(&mut self, ms: u64) -> &mut Self {
        self.timing = Some(ms);
        self
    }

    /// Status used instead of the default for this route.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug)]
struct PendingPassthrough {
    /// `None` means the current origin
    pattern: Option<String>,
    methods: Vec<HttpMethod>,
}

/// Actions registered by [`RouteRegistry::resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceAction {
    Index,
    Show,
    Create,
    Update,
    Delete,
}

impl ResourceAction {
    pub const ALL: [ResourceAction; 5] = [
        ResourceAction::Index,
        ResourceAction::Show,
        ResourceAction::Create,
        ResourceAction::Update,
        ResourceAction::Delete,
    ];
}

/// Options of [`RouteRegistry::resource`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    /// Register only these actions
    #[serde(default)]
    pub only: Vec<ResourceAction>,
    /// Register every action but these
    #[serde(default)]
    pub except: Vec<ResourceAction>,
    /// Model name when it cannot be inferred from the resource path
    #[serde(default)]
    pub model: Option<String>,
}

impl ResourceOptions {
    fn includes(&self, action: ResourceAction) -> bool {
        (self.only.is_empty() || self.only.contains(&action)) && !self.except.contains(&action)
    }
}

/// Mutable route table used while the server is configured.
///
/// `namespace` and `url_prefix` apply to routes registered after they are set.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    namespace: String,
    url_prefix: Option<String>,
    timing: Option<u64>,
    routes: Vec<PendingRoute>,
    passthrough: Vec<PendingPassthrough>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix for subsequently registered routes, e.g. `api`.
    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = namespace.into();
        self
    }

    /// Origin for subsequently registered routes, e.g. `https://api.example.com`.
    pub fn url_prefix(&mut self, url_prefix: impl Into<String>) -> &mut Self {
        let prefix = url_prefix.into();
        self.url_prefix = Some(prefix.trim_end_matches('/').to_string()).filter(|p| !p.is_empty());
        self
    }

    /// Default latency in milliseconds for routes without their own timing.
    pub fn timing(&mut self, ms: u64) -> &mut Self {
        self.timing = Some(ms);
        self
    }

    pub fn route(
        &mut self,
        method: HttpMethod,
        path: &str,
        handler: Handler,
    ) -> &mut PendingRoute {
        let path = join_path(&self.namespace, path);
        tracing::debug!(%method, path = %path, ?handler, "registered route");
        self.routes.push(PendingRoute {
            method,
            path,
            origin: self.url_prefix.clone(),
            handler,
            timing: None,
            status: None,
        });
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn get(&mut self, path: &str, handler: Handler) -> &mut PendingRoute {
        self.route(HttpMethod::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: Handler) -> &mut PendingRoute {
        self.route(HttpMethod::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: Handler) -> &mut PendingRoute {
        self.route(HttpMethod::Put, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: Handler) -> &mut PendingRoute {
        self.route(HttpMethod::Patch, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: Handler) -> &mut PendingRoute {
        self.route(HttpMethod::Delete, path, handler)
    }

    /// Shorthand routes for a whole resource, e.g. `resource("movies", ..)`.
    pub fn resource(&mut self, path: &str, options: ResourceOptions) -> &mut Self {
        let collection = path.trim_matches('/').to_string();
        let member = format!("{collection}/:id");
        let handler = || match &options.model {
            Some(model) => Handler::shorthand_for(model.clone()),
            None => Handler::shorthand(),
        };
        for action in ResourceAction::ALL {
            if !options.includes(action) {
                continue;
            }
            match action {
                ResourceAction::Index => {
                    self.get(&collection, handler());
                }
                ResourceAction::Show => {
                    self.get(&member, handler());
                }
                ResourceAction::Create => {
                    self.post(&collection, handler());
                }
                ResourceAction::Update => {
                    self.patch(&member, handler());
                    self.put(&member, handler());
                }
                ResourceAction::Delete => {
                    self.delete(&member, handler());
                }
            }
        }
        self
    }

    /// Let unmatched requests on the current origin through.
    pub fn passthrough_current_origin(&mut self, methods: &[HttpMethod]) -> &mut Self {
        self.passthrough.push(PendingPassthrough {
            pattern: None,
            methods: methods.to_vec(),
        });
        self
    }

    /// Let unmatched requests matching any of the glob `patterns` through.
    ///
    /// Relative patterns are resolved under the current namespace and URL prefix.
    pub fn passthrough(&mut self, patterns: &[&str], methods: &[HttpMethod]) -> &mut Self {
        for pattern in patterns {
            let pattern = if pattern.contains("://") {
                (*pattern).to_string()
            } else {
                let path = join_path(&self.namespace, pattern);
                match &self.url_prefix {
                    Some(prefix) => format!("{prefix}{path}"),
                    None => path,
                }
            };
            self.passthrough.push(PendingPassthrough {
                pattern: Some(pattern),
                methods: methods.to_vec(),
            });
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compile templates, resolve shorthands and passthrough globs into an immutable router.
    pub fn freeze(self, models: &Models, inflector: &dyn Inflector) -> Result<Router, ConfigError> {
        let mut routes = Vec::with_capacity(self.routes.len());
        for pending in self.routes {
            let pattern = PathPattern::compile(&pending.path)?;
            let action = match pending.handler {
                Handler::Shorthand { model } => RouteAction::Shorthand(Shorthand::resolve(
                    pending.method,
                    &pattern,
                    model.as_deref(),
                    models,
                    inflector,
                )?),
                Handler::Value(value) => RouteAction::Value(value),
                Handler::Function(function) => RouteAction::Function(function),
            };
            routes.push(Route {
                method: pending.method,
                pattern,
                origin: pending.origin,
                action,
                timing: pending.timing,
                status: pending.status,
            });
        }

        let passthrough = self
            .passthrough
            .into_iter()
            .map(|pending| {
                let rule = match &pending.pattern {
                    Some(pattern) => PassthroughRule::glob(pattern)?,
                    None => PassthroughRule::current_origin(),
                };
                Ok(rule.methods(&pending.methods))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::debug!(
            routes = routes.len(),
            passthrough = passthrough.len(),
            "froze route registry"
        );
        Ok(Router::new(routes, passthrough, self.timing, self.url_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::English;
    use crate::orm::ModelDefinition;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn models() -> Models {
        Models::resolve(vec![("movie".to_string(), ModelDefinition::new())])
            .expect("Should resolve")
    }

    #[rstest]
    fn test_namespace_applies_to_later_routes() {
        let mut registry = RouteRegistry::new();
        registry.get("/health", Handler::value(json!("ok")));
        registry.namespace("api");
        let route = registry.get("/movies", Handler::shorthand());
        assert_eq!(route.path(), "/api/movies");
        assert_eq!(registry.routes[0].path, "/health");
    }

    #[rstest]
    fn test_route_options() {
        let mut registry = RouteRegistry::new();
        registry
            .post("/movies", Handler::shorthand())
            .timing(400)
            .status(202);
        assert_eq!(registry.routes[0].timing, Some(400));
        assert_eq!(registry.routes[0].status, Some(202));
    }

    #[rstest]
    #[case(ResourceOptions::default(), 6)]
    #[case(ResourceOptions { only: vec![ResourceAction::Index, ResourceAction::Show], ..Default::default() }, 2)]
    #[case(ResourceOptions { except: vec![ResourceAction::Update], ..Default::default() }, 4)]
    fn test_resource_registers_actions(#[case] options: ResourceOptions, #[case] count: usize) {
        let mut registry = RouteRegistry::new();
        registry.resource("movies", options);
        assert_eq!(registry.len(), count);
    }

    #[rstest]
    fn test_freeze_resolves_shorthands(models: Models) {
        let mut registry = RouteRegistry::new();
        registry.resource("movies", ResourceOptions::default());
        let router = registry.freeze(&models, &English::new()).expect("Should freeze");
        assert_eq!(router.routes().len(), 6);
    }

    #[rstest]
    fn test_freeze_rejects_unknown_shorthand_model(models: Models) {
        let mut registry = RouteRegistry::new();
        registry.get("/directors", Handler::shorthand());
        let err = registry.freeze(&models, &English::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(ref m) if m == "director"));
    }

    #[rstest]
    fn test_freeze_rejects_bad_passthrough(models: Models) {
        let mut registry = RouteRegistry::new();
        registry.passthrough(&["/files/[abc"], &[]);
        assert!(matches!(
            registry.freeze(&models, &English::new()),
            Err(ConfigError::InvalidPassthrough { .. })
        ));
    }

    #[rstest]
    fn test_passthrough_patterns_follow_namespace_and_prefix() {
        let mut registry = RouteRegistry::new();
        registry.namespace("api").url_prefix("https://api.example.com/");
        registry.passthrough(&["/uploads/**", "https://cdn.example.com/**"], &[]);
        let patterns: Vec<_> = registry
            .passthrough
            .iter()
            .filter_map(|p| p.pattern.clone())
            .collect();
        assert_eq!(
            patterns,
            vec![
                "https://api.example.com/api/uploads/**".to_string(),
                "https://cdn.example.com/**".to_string()
            ]
        );
    }
}
