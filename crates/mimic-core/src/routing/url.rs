//! Path templates with `:param` segments.

use crate::config::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// One `/`-separated piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// Compiled path template.
///
/// Matching requires equal segment counts; literal segments compare exactly and `:param`
/// segments match any single non-empty segment.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(template: &str) -> Result<Self, ConfigError> {
        let template = normalize_path(template);
        let segments = parse_segments(&template);

        let mut regex_str = String::from("^");
        for segment in &segments {
            regex_str.push('/');
            match segment {
                Segment::Literal(literal) => regex_str.push_str(&regex::escape(literal)),
                Segment::Param(_) => regex_str.push_str("([^/]+)"),
            }
        }
        if segments.is_empty() {
            regex_str.push('/');
        }
        regex_str.push_str("/?$");

        let regex = Regex::new(&regex_str).map_err(|source| ConfigError::InvalidPath {
            path: template.clone(),
            source,
        })?;
        Ok(Self {
            template,
            segments,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Last segment is a parameter (`/movies/:id`).
    pub fn is_member(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Param(_)))
    }

    /// Last literal segment, used to infer the model of shorthand routes.
    pub fn last_literal(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            Segment::Literal(literal) => Some(literal.as_str()),
            Segment::Param(_) => None,
        })
    }

    /// Captured parameters (URL-decoded) when `path` matches.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = normalize_path(path);
        let caps = self.regex.captures(&path)?;
        let names = self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        });
        let params = names
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1).map(|m| {
                    let value = urlencoding::decode(m.as_str())
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| m.as_str().to_owned());
                    (name.clone(), value)
                })
            })
            .collect();
        Some(params)
    }
}

fn parse_segments(template: &str) -> Vec<Segment> {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => Segment::Param(name.to_owned()),
            _ => Segment::Literal(segment.to_owned()),
        })
        .collect()
}

/// Split an absolute URL into its origin (`scheme://host[:port]`) and the rest.
pub fn split_origin(url: &str) -> (Option<&str>, &str) {
    let Some(scheme_end) = url.find("://") else {
        return (None, url);
    };
    let after_scheme = scheme_end + 3;
    match url[after_scheme..].find('/') {
        Some(offset) => {
            let split = after_scheme + offset;
            (Some(&url[..split]), &url[split..])
        }
        None => {
            let split = url[after_scheme..]
                .find('?')
                .map(|offset| after_scheme + offset)
                .unwrap_or(url.len());
            (Some(&url[..split]), &url[split..])
        }
    }
}

/// Split `path?query` into path and (possibly empty) query string.
pub fn split_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

/// Path without origin, query or trailing slash, always starting with `/`.
pub fn normalize_path(url: &str) -> String {
    let (_, rest) = split_origin(url);
    let (path, _) = split_query(rest);
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        format!("/{trimmed}")
    }
}

/// Join a prefix such as a namespace with a path template.
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".into(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{prefix}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}
