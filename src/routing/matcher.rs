//! Request predicates.
//!
//! # Responsibilities
//! - Match path prefix or exact path (case-sensitive)
//! - Match a query parameter, optionally with a value
//! - Match a User-Agent substring (case-insensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - No regex to guarantee O(n) matching
//! - Predicates only read the request; they never consume the body

use axum::extract::Request;

use crate::config::ProbeRule;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct PathExactMatcher {
    path: String,
}

impl PathExactMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathExactMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.uri().path() == self.path
    }
}

/// Matches a query parameter; with a value, the parameter must carry it.
#[derive(Debug, Clone)]
pub struct QueryParamMatcher {
    param: String,
    value: Option<String>,
}

impl QueryParamMatcher {
    pub fn new(param: impl Into<String>, value: Option<String>) -> Self {
        Self {
            param: param.into(),
            value,
        }
    }
}

impl Matcher for QueryParamMatcher {
    fn matches(&self, req: &Request) -> bool {
        let Some(query) = req.uri().query() else {
            return false;
        };
        url::form_urlencoded::parse(query.as_bytes()).any(|(key, value)| {
            key == self.param.as_str()
                && self.value.as_deref().is_none_or(|expected| value == expected)
        })
    }
}

/// Matches a substring of the User-Agent header.
#[derive(Debug, Clone)]
pub struct UserAgentMatcher {
    needle: String,
}

impl UserAgentMatcher {
    /// The needle is normalized to lowercase for case-insensitive matching.
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into().to_lowercase(),
        }
    }
}

impl Matcher for UserAgentMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|ua| ua.to_lowercase().contains(&self.needle))
            .unwrap_or(false)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// Compile a configured rule.
pub fn from_rule(rule: &ProbeRule) -> Box<dyn Matcher> {
    match rule {
        ProbeRule::PathPrefix { path_prefix } => Box::new(PathPrefixMatcher::new(path_prefix.clone())),
        ProbeRule::PathExact { path } => Box::new(PathExactMatcher::new(path.clone())),
        ProbeRule::QueryParam { param, value } => {
            Box::new(QueryParamMatcher::new(param.clone(), value.clone()))
        }
        ProbeRule::UserAgent { contains } => Box::new(UserAgentMatcher::new(contains.clone())),
    }
}
