//! Server lifecycle: configuration, dispatch and shutdown.
//!
//! A [`ServerBuilder`] collects models, factories, serializers, routes and seeds;
//! [`ServerBuilder::build`] resolves the relationship graph and freezes the router. The
//! resulting [`Server`] owns all state, so several servers can coexist in one process.

use crate::config::document::{ServerDocument, APPLICATION_SERIALIZER};
use crate::config::error::ConfigError;
use crate::config::parser::load_config;
use crate::db::Attrs;
use crate::error::{Error, Result};
use crate::factory::{Blueprint, Factories};
use crate::naming::Inflector;
use crate::orm::{Attributes, ModelDefinition, Models, Record, Schema};
use crate::routing::{
    Dispatched, DelayedResponse, HandlerResult, HttpMethod, Recognition, Request, Response,
    Route, RouteAction, RouteRegistry, Router,
};
use crate::serializer::{Serializable, SerializerOverrides, Serializers};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Runtime environment.
///
/// `Test` ignores the server-wide timing and skips seeds and fixtures at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
}

type Seeds = Box<dyn FnOnce(&mut Server) -> Result<()>>;

/// Server configuration collected before the router is frozen.
pub struct ServerBuilder {
    environment: Environment,
    logging: Option<bool>,
    models: Vec<(String, ModelDefinition)>,
    factories: Factories,
    factory_models: Vec<String>,
    serializers: Serializers,
    serializer_models: Vec<String>,
    registry: RouteRegistry,
    seeds: Option<Seeds>,
    fixtures: BTreeMap<String, Vec<Attrs>>,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("environment", &self.environment)
            .field("models", &self.models)
            .field("routes", &self.registry.len())
            .field("seeds", &self.seeds.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            environment: Environment::default(),
            logging: None,
            models: Vec::new(),
            factories: Factories::new(),
            factory_models: Vec::new(),
            serializers: Serializers::default(),
            serializer_models: Vec::new(),
            registry: RouteRegistry::new(),
            seeds: None,
            fixtures: BTreeMap::new(),
        }
    }

    /// Builder pre-filled from a declarative document.
    pub fn from_document(document: ServerDocument) -> Self {
        let mut builder = Self::new();
        document.register_routes(&mut builder.registry);
        builder.models = document.model_definitions();
        if let Some(environment) = document.environment {
            builder.environment = environment;
        }
        builder.logging = document.logging;
        for (model, overrides) in document.serializers {
            builder = if model == APPLICATION_SERIALIZER {
                builder.default_serializer(overrides)
            } else {
                builder.serializer(model, overrides)
            };
        }
        builder.fixtures = document.fixtures;
        builder
    }

    /// Read a YAML, JSON or JSONC document and start a builder from it.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let document: ServerDocument = load_config(path).await?;
        Ok(Self::from_document(document))
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Log every handled request at info level (defaults to on outside tests).
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = Some(enabled);
        self
    }

    pub fn model(mut self, name: impl Into<String>, definition: ModelDefinition) -> Self {
        self.models.push((name.into(), definition));
        self
    }

    pub fn factory(mut self, model: impl Into<String>, blueprint: Blueprint) -> Self {
        let model = model.into();
        self.factory_models.push(model.clone());
        self.factories.define(model, blueprint);
        self
    }

    pub fn serializer(mut self, model: impl Into<String>, overrides: SerializerOverrides) -> Self {
        let model = model.into();
        self.serializer_models.push(model.clone());
        self.serializers.define(model, overrides);
        self
    }

    /// Application-wide serializer configuration.
    pub fn default_serializer(mut self, overrides: SerializerOverrides) -> Self {
        self.serializers.set_application(&overrides);
        self
    }

    /// Pluralization used for collection names, root keys and shorthand model inference.
    pub fn inflector(mut self, inflector: impl Inflector + 'static) -> Self {
        self.serializers = self.serializers.with_inflector(inflector);
        self
    }

    /// Register routes, passthrough rules, namespace, URL prefix and timing.
    pub fn routes(mut self, configure: impl FnOnce(&mut RouteRegistry)) -> Self {
        configure(&mut self.registry);
        self
    }

    /// Populate the store once the server is built (skipped in the test environment).
    pub fn seeds(mut self, seeds: impl FnOnce(&mut Server) -> Result<()> + 'static) -> Self {
        self.seeds = Some(Box::new(seeds));
        self
    }

    /// Rows inserted verbatim when no seeds are configured.
    pub fn fixtures(mut self, model: impl Into<String>, rows: Vec<Attrs>) -> Self {
        self.fixtures.entry(model.into()).or_default().extend(rows);
        self
    }

    /// Resolve models, freeze the router and run seeds (or load fixtures).
    pub fn build(self) -> Result<Server> {
        let models = Models::resolve(self.models)?;
        let referenced = self
            .factory_models
            .iter()
            .chain(&self.serializer_models)
            .chain(self.fixtures.keys());
        for model in referenced {
            if !models.contains(model) {
                return Err(ConfigError::UnknownModel(model.clone()).into());
            }
        }
        let router = self.registry.freeze(&models, self.serializers.inflector())?;

        let environment = self.environment;
        let logging = self
            .logging
            .unwrap_or(environment == Environment::Development);
        let mut server = Server {
            environment,
            logging,
            schema: Schema::new(models),
            factories: self.factories,
            serializers: self.serializers,
            router,
            fixtures: self.fixtures,
            shut_down: false,
        };
        tracing::debug!(
            ?environment,
            routes = server.router.routes().len(),
            "built server"
        );

        if environment == Environment::Test {
            return Ok(server);
        }
        match self.seeds {
            Some(seeds) => seeds(&mut server)?,
            None if !server.fixtures.is_empty() => server.load_fixtures(&[])?,
            None => {}
        }
        Ok(server)
    }
}

/// Running simulated backend.
#[derive(Debug)]
pub struct Server {
    environment: Environment,
    logging: bool,
    schema: Schema,
    factories: Factories,
    serializers: Serializers,
    router: Router,
    fixtures: BTreeMap<String, Vec<Attrs>>,
    shut_down: bool,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn serializers(&self) -> &Serializers {
        &self.serializers
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    /// Create one record through the model's factory (or from `overrides` alone).
    pub fn create(&mut self, model: &str, overrides: impl Into<Attributes>) -> Result<Record> {
        self.create_with_traits(model, &[], overrides)
    }

    pub fn create_with_traits(
        &mut self,
        model: &str,
        traits: &[&str],
        overrides: impl Into<Attributes>,
    ) -> Result<Record> {
        self.ensure_running()?;
        self.factories
            .create(&mut self.schema, model, traits, overrides)
    }

    pub fn create_list(
        &mut self,
        model: &str,
        count: usize,
        overrides: impl Into<Attributes>,
    ) -> Result<Vec<Record>> {
        self.ensure_running()?;
        self.factories
            .create_list(&mut self.schema, model, count, &[], overrides)
    }

    /// Factory attributes without inserting anything.
    pub fn build(&mut self, model: &str, overrides: impl Into<Attributes>) -> Result<Attributes> {
        self.ensure_running()?;
        if !self.schema.models().contains(model) {
            return Err(Error::UnknownModel(model.to_string()));
        }
        self.factories.build(model, &[], overrides)
    }

    /// Render records the way a route would.
    pub fn serialize<'a>(
        &self,
        subject: impl Into<Serializable<'a>>,
        includes: &[String],
    ) -> Result<Value> {
        self.serializers.serialize(&self.schema, subject, includes)
    }

    /// JSON snapshot of every collection.
    pub fn dump(&self) -> Value {
        self.schema.dump()
    }

    /// Insert the configured fixtures for `models`, or for every model when empty.
    pub fn load_fixtures(&mut self, models: &[&str]) -> Result<()> {
        self.ensure_running()?;
        let selected: BTreeMap<String, Vec<Attrs>> = if models.is_empty() {
            self.fixtures.clone()
        } else {
            let mut selected = BTreeMap::new();
            for model in models {
                let rows = self
                    .fixtures
                    .get(*model)
                    .ok_or_else(|| Error::UnknownModel((*model).to_string()))?;
                selected.insert((*model).to_string(), rows.clone());
            }
            selected
        };
        self.schema.load_fixtures(&selected)
    }

    /// Route a request: mutate the store synchronously and return the response together with
    /// its delivery delay, or signal passthrough.
    pub fn dispatch(&mut self, mut request: Request) -> Result<Dispatched> {
        self.ensure_running()?;
        let method = request.method;
        let (route, params) = match self.router.recognize(method, &request.url) {
            Ok(Recognition::Route { route, params }) => (route, params),
            Ok(Recognition::Passthrough) => {
                tracing::warn!(%method, url = %request.url, "passing request through");
                return Ok(Dispatched::Passthrough);
            }
            Err(error) => {
                tracing::error!(%error, "unhandled request");
                return Err(error);
            }
        };
        request.params = params;

        let includes = request.includes();
        if let RouteAction::Shorthand(shorthand) = &route.action {
            self.serializers
                .validate_includes(self.schema.models(), &shorthand.model, &includes)?;
        }
        // writes made by a function handler are undone when the request fails
        let snapshot =
            matches!(route.action, RouteAction::Function(_)).then(|| self.schema.clone());
        let rendered = match &route.action {
            RouteAction::Shorthand(shorthand) => shorthand.execute(&mut self.schema, &request),
            RouteAction::Value(value) => Ok(HandlerResult::Value(value.clone())),
            RouteAction::Function(handler) => handler(&mut self.schema, &request),
        }
        .and_then(|result| self.render(route, method, result, &includes));
        let response = match rendered {
            Ok(response) => response,
            Err(error) => {
                if let Some(snapshot) = snapshot {
                    self.schema = snapshot;
                }
                return Err(error);
            }
        };
        let delay = self
            .router
            .delay_for(route, self.environment == Environment::Test);

        if self.logging {
            tracing::info!(
                %method,
                url = %request.url,
                status = response.status,
                ?delay,
                "handled request"
            );
        } else {
            tracing::debug!(
                %method,
                url = %request.url,
                status = response.status,
                ?delay,
                "handled request"
            );
        }
        Ok(Dispatched::Respond(DelayedResponse::new(response, delay)))
    }

    fn render(
        &self,
        route: &Route,
        method: HttpMethod,
        result: HandlerResult,
        includes: &[String],
    ) -> Result<Response> {
        let status = route.status.unwrap_or(match method {
            HttpMethod::Post => 201,
            _ => 200,
        });
        let response = match result {
            HandlerResult::Response(response) => response,
            HandlerResult::Empty => Response::empty(route.status.unwrap_or(204)),
            HandlerResult::Value(value) => Response::json(status, value),
            HandlerResult::Record(record) => Response::json(
                status,
                self.serializers
                    .serialize(&self.schema, &record, includes)?,
            ),
            HandlerResult::Records(records) => Response::json(
                status,
                self.serializers
                    .serialize(&self.schema, &records, includes)?,
            ),
        };
        Ok(response)
    }

    /// Discard every collection, reset identity and sequence counters and refuse further work.
    pub fn shutdown(&mut self) {
        self.schema.clear();
        self.factories.reset();
        self.shut_down = true;
        tracing::debug!("server shut down");
    }
}
