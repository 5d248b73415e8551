//! Frozen route table and request recognition.

use crate::error::{Error, Result};
use crate::routing::handler::HandlerFn;
use crate::routing::method::HttpMethod;
use crate::routing::passthrough::PassthroughRule;
use crate::routing::shorthand::Shorthand;
use crate::routing::url::{split_origin, split_query, PathPattern};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Handler of a frozen route.
pub enum RouteAction {
    Shorthand(Shorthand),
    Value(Value),
    Function(HandlerFn),
}

impl fmt::Debug for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteAction::Shorthand(shorthand) => {
                f.debug_tuple("Shorthand").field(shorthand).finish()
            }
            RouteAction::Value(value) => f.debug_tuple("Value").field(value).finish(),
            RouteAction::Function(_) => f.write_str("Function(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Route {
    pub method: HttpMethod,
    pub pattern: PathPattern,
    /// Origin the route was registered under (`urlPrefix`)
    pub origin: Option<String>,
    pub action: RouteAction,
    /// Latency in milliseconds
    pub timing: Option<u64>,
    pub status: Option<u16>,
}

impl Route {
    fn matches(&self, method: HttpMethod, url: &str) -> Option<HashMap<String, String>> {
        if self.method != method {
            return None;
        }
        if let (Some(expected), (Some(actual), _)) = (&self.origin, split_origin(url)) {
            if !expected.eq_ignore_ascii_case(actual.trim_end_matches('/')) {
                return None;
            }
        }
        self.pattern.matches(url)
    }
}

/// Result of matching a request against the router.
#[derive(Debug)]
pub enum Recognition<'a> {
    Route {
        route: &'a Route,
        params: HashMap<String, String>,
    },
    Passthrough,
}

/// Immutable route table; routes are tried in registration order.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
    passthrough: Vec<PassthroughRule>,
    timing: Option<u64>,
    origin: Option<String>,
}

impl Router {
    pub fn new(
        routes: Vec<Route>,
        passthrough: Vec<PassthroughRule>,
        timing: Option<u64>,
        origin: Option<String>,
    ) -> Self {
        Self {
            routes,
            passthrough,
            timing,
            origin,
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Server-wide latency for routes without their own.
    pub fn timing(&self) -> Option<u64> {
        self.timing
    }

    /// First matching route, else the first matching passthrough rule, else
    /// [`Error::UnhandledRequest`].
    pub fn recognize(&self, method: HttpMethod, url: &str) -> Result<Recognition<'_>> {
        for route in &self.routes {
            if let Some(params) = route.matches(method, url) {
                return Ok(Recognition::Route { route, params });
            }
        }
        if self
            .passthrough
            .iter()
            .any(|rule| rule.matches(method, url, self.origin.as_deref()))
        {
            return Ok(Recognition::Passthrough);
        }
        let (_, rest) = split_origin(url);
        let (path, _) = split_query(rest);
        Err(Error::UnhandledRequest {
            method,
            path: path.to_string(),
        })
    }

    /// Delay for a matched route: its own timing, else the server-wide one unless ignored.
    pub fn delay_for(&self, route: &Route, ignore_global: bool) -> Duration {
        let global = if ignore_global { None } else { self.timing };
        Duration::from_millis(route.timing.or(global).unwrap_or(0))
    }
}
