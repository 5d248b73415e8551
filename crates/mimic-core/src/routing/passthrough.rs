//! Passthrough rules: unmatched requests allowed to reach the real network.

use crate::config::error::ConfigError;
use crate::routing::method::HttpMethod;
use crate::routing::url::{normalize_path, split_origin, split_query};
use glob::{MatchOptions, Pattern};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Target {
    /// Every request on the origin the simulated app is served from
    CurrentOrigin,
    /// Glob against the full URL when the pattern carries an origin, the path otherwise
    Glob { pattern: Pattern, absolute: bool },
}

/// Passthrough rule, optionally restricted to some verbs.
///
/// In glob patterns `*` matches within one path segment and `**` across segments.
#[derive(Debug, Clone)]
pub struct PassthroughRule {
    target: Target,
    methods: Option<Vec<HttpMethod>>,
}

impl PassthroughRule {
    pub fn current_origin() -> Self {
        Self {
            target: Target::CurrentOrigin,
            methods: None,
        }
    }

    pub fn glob(pattern: &str) -> Result<Self, ConfigError> {
        let absolute = pattern.contains("://");
        let source = if absolute {
            pattern.to_string()
        } else {
            normalize_path(pattern)
        };
        let pattern =
            Pattern::new(&source).map_err(|source| ConfigError::InvalidPassthrough {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            target: Target::Glob { pattern, absolute },
            methods: None,
        })
    }

    /// Restrict the rule to `methods`; an empty list keeps it open to every verb.
    pub fn methods(mut self, methods: &[HttpMethod]) -> Self {
        self.methods = (!methods.is_empty()).then(|| methods.to_vec());
        self
    }

    /// `current_origin` is the origin relative URLs resolve against, if known.
    pub fn matches(&self, method: HttpMethod, url: &str, current_origin: Option<&str>) -> bool {
        if let Some(methods) = &self.methods {
            if !methods.contains(&method) {
                return false;
            }
        }
        let (origin, _) = split_origin(url);
        match &self.target {
            Target::CurrentOrigin => match (origin, current_origin) {
                (None, _) => true,
                (Some(origin), Some(current)) => same_origin(origin, current),
                (Some(_), None) => false,
            },
            Target::Glob { pattern, absolute } => {
                if *absolute {
                    let (without_query, _) = split_query(url);
                    let full = match (origin, current_origin) {
                        (Some(_), _) => without_query.trim_end_matches('/').to_string(),
                        (None, Some(current)) => {
                            format!("{}{}", current.trim_end_matches('/'), normalize_path(url))
                        }
                        (None, None) => return false,
                    };
                    pattern.matches_with(&full, GLOB_OPTIONS)
                } else {
                    pattern.matches_with(&normalize_path(url), GLOB_OPTIONS)
                }
            }
        }
    }
}

fn same_origin(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}
