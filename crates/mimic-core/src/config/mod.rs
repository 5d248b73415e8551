//! Server configuration documents.
//!
//! - [`ServerDocument`]: declarative models, serializers, routes, passthrough rules and fixtures
//! - [`parser`]: YAML/JSON/JSONC parsing and async file loading
//! - [`ConfigError`]: everything that can go wrong before the server starts serving

pub mod document;
pub mod error;
pub mod parser;

pub use document::{
    ModelDocument, PassthroughDocument, RelationshipDocument, ResourceDocument, RouteDocument,
    ServerDocument, APPLICATION_SERIALIZER,
};
pub use error::ConfigError;
pub use parser::{load_config, parse_config};
