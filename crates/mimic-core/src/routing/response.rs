//! Responses produced for the transport, with their delivery delay.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    /// Used verbatim
    Text(String),
}

/// Status, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Body,
}

impl Response {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Body::Empty,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::empty(status)
            .with_header("Content-Type", "application/json")
            .with_body(Body::Json(body))
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::empty(status).with_body(Body::Text(body.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// JSON payload, if the body is JSON.
    pub fn body_json(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Body as the transport would send it.
    pub fn body_string(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text.clone(),
        }
    }
}

/// Response computed synchronously, waiting for its simulated latency.
///
/// All store mutations already happened when this value exists; dropping it before delivery
/// only abandons the response.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedResponse {
    response: Response,
    delay: Duration,
}

impl DelayedResponse {
    pub fn new(response: Response, delay: Duration) -> Self {
        Self { response, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Inspect the response without waiting.
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_inner(self) -> Response {
        self.response
    }

    /// Wait for the configured delay (non-blocking), then hand over the response.
    pub async fn deliver(self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response
    }
}

/// Outcome of dispatching a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// Serviced by a route
    Respond(DelayedResponse),
    /// Matched a passthrough rule; the transport should perform the real request
    Passthrough,
}

impl Dispatched {
    pub fn into_response(self) -> Option<DelayedResponse> {
        match self {
            Dispatched::Respond(response) => Some(response),
            Dispatched::Passthrough => None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Dispatched::Passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Response::empty(204), "")]
    #[case(Response::json(200, json!({"ok": true})), "{\"ok\":true}")]
    #[case(Response::text(500, "boom"), "boom")]
    fn test_body_string(#[case] response: Response, #[case] expected: &str) {
        assert_eq!(response.body_string(), expected);
    }

    #[rstest]
    fn test_json_sets_content_type() {
        let response = Response::json(201, json!({}));
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(response.body_json(), Some(&json!({})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_waits_for_delay() {
        let start = tokio::time::Instant::now();
        let delayed = DelayedResponse::new(Response::empty(204), Duration::from_millis(250));
        let response = delayed.deliver().await;
        assert_eq!(response.status, 204);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_delivers_immediately() {
        let start = tokio::time::Instant::now();
        DelayedResponse::new(Response::empty(200), Duration::ZERO)
            .deliver()
            .await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
