//! Route registry and dispatch plumbing.
//!
//! This module provides:
//! - [`RouteRegistry`]: mutable route table used during configuration
//! - [`Router`]: frozen table matching requests to routes or passthrough rules
//! - [`Request`] / [`Response`]: descriptors exchanged with the transport
//! - [`Handler`] / [`HandlerResult`]: what routes run and what they return

pub mod handler;
pub mod method;
pub mod passthrough;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod shorthand;
pub mod url;

pub use handler::{Handler, HandlerFn, HandlerResult};
pub use method::HttpMethod;
pub use passthrough::PassthroughRule;
pub use query::parse_query_string;
pub use registry::{PendingRoute, ResourceAction, ResourceOptions, RouteRegistry};
pub use request::Request;
pub use response::{Body, DelayedResponse, Dispatched, Response};
pub use router::{Recognition, Route, RouteAction, Router};
pub use shorthand::{Shorthand, ShorthandKind};
pub use url::PathPattern;
