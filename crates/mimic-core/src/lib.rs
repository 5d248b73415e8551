//! In-process backend simulation.
//!
//! Declared routes are matched against requests and answered from an in-memory relational
//! store, rendered through configurable serializers. Start from [`Server::builder`] or a
//! declarative [`config::ServerDocument`].

pub mod config;
pub mod db;
pub mod error;
pub mod factory;
pub mod naming;
pub mod orm;
pub mod routing;
pub mod serializer;
pub mod server;

pub use config::{ConfigError, ServerDocument};
pub use db::{Attrs, RecordId};
pub use error::{Error, Result};
pub use factory::{Blueprint, Factories, Field};
pub use naming::{English, Inflector, KeyCase};
pub use orm::{Attributes, ModelDefinition, Record, RecordSet, Related, Relationship, Schema};
pub use routing::{
    Dispatched, Handler, HandlerResult, HttpMethod, Request, ResourceOptions, Response,
    RouteRegistry,
};
pub use serializer::{SerializeIds, SerializerOverrides};
pub use server::{Environment, Server, ServerBuilder};
