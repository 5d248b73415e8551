//! Request descriptor handed over by the transport and passed to handlers.

use crate::db::RecordId;
use crate::error::{Error, Result};
use crate::routing::method::HttpMethod;
use crate::routing::query::parse_query_string;
use crate::routing::url::{normalize_path, split_origin, split_query};
use serde_json::Value;
use std::collections::HashMap;

/// Captured request.
///
/// `params` is filled by the dispatcher after a route matched. The body is kept raw; handlers
/// decide how to parse it ([`Request::json`] covers the common case).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: HttpMethod,
    /// Path or absolute URL, query string included
    pub url: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl Request {
    /// Request with the query mapping parsed from `url`.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        let (_, rest) = split_origin(&url);
        let (_, query) = split_query(rest);
        let query = parse_query_string(query);
        Self {
            method,
            url,
            params: HashMap::new(),
            query,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Normalized path without origin and query string.
    pub fn path(&self) -> String {
        normalize_path(&self.url)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Path parameter parsed as a record identity.
    pub fn param_id(&self, name: &str) -> Result<RecordId> {
        let raw = self.param(name);
        raw.and_then(|value| value.parse::<RecordId>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| Error::InvalidParam {
                name: name.to_string(),
                value: raw.map(str::to_string),
            })
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Header value, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body parsed as JSON; `None` when there is no body or it is blank.
    pub fn json(&self) -> Result<Option<Value>> {
        match self.body.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(body) => serde_json::from_str(body)
                .map(Some)
                .map_err(|e| Error::InvalidBody(e.to_string())),
        }
    }

    /// Relationship paths requested through the `include` query parameter.
    pub fn includes(&self) -> Vec<String> {
        self.query_param("include")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|path| !path.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
