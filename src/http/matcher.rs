//! Header match predicates.
//!
//! # Responsibilities
//! - Compile `HeaderMatchConfig` rules into immutable matchers
//! - Evaluate a request head against the compiled rules
//! - Combine rules with AND semantics
//!
//! # Design Decisions
//! - Compiled once at configuration time, shared read-only across requests
//! - Pseudo-headers (`:path`, `:method`, `:authority`) read the request line;
//!   `:path` includes the query string
//! - Only the first value of a repeated header is inspected
//! - A missing header matches only when the rule is inverted
//! - Regexes are anchored (full match)

use axum::http::header::{HeaderName, HOST};
use axum::http::request::Parts;
use regex::Regex;
use thiserror::Error;

use crate::config::schema::{HeaderMatchConfig, RangeConfig};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request head matches this condition.
    fn matches(&self, req: &Parts) -> bool;
}

/// Errors raised while compiling header rules.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid header name '{0}'")]
    InvalidName(String),

    #[error("header '{name}' sets more than one match specifier")]
    ConflictingSpecifiers { name: String },

    #[error("header '{name}' has an invalid regex: {source}")]
    InvalidRegex {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("header '{name}' has an empty range [{start}, {end})")]
    EmptyRange { name: String, start: i64, end: i64 },
}

/// Where a rule reads its value from.
#[derive(Debug, Clone)]
enum HeaderKey {
    Path,
    Method,
    Authority,
    Header(HeaderName),
}

impl HeaderKey {
    fn parse(name: &str) -> Result<Self, MatcherError> {
        match name.to_ascii_lowercase().as_str() {
            ":path" => Ok(HeaderKey::Path),
            ":method" => Ok(HeaderKey::Method),
            ":authority" => Ok(HeaderKey::Authority),
            other => HeaderName::from_bytes(other.as_bytes())
                .map(HeaderKey::Header)
                .map_err(|_| MatcherError::InvalidName(name.to_string())),
        }
    }

    /// Raw value, `None` only when the header is absent.
    fn value<'a>(&self, req: &'a Parts) -> Option<&'a [u8]> {
        match self {
            HeaderKey::Path => Some(
                req.uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or_else(|| req.uri.path())
                    .as_bytes(),
            ),
            HeaderKey::Method => Some(req.method.as_str().as_bytes()),
            // HTTP/2 carries the authority in the URI, HTTP/1.1 in Host.
            HeaderKey::Authority => req
                .uri
                .authority()
                .map(|a| a.as_str().as_bytes())
                .or_else(|| req.headers.get(HOST).map(|h| h.as_bytes())),
            HeaderKey::Header(name) => req.headers.get(name).map(|h| h.as_bytes()),
        }
    }
}

#[derive(Debug, Clone)]
enum MatchRule {
    Present(bool),
    Exact(String),
    Prefix(String),
    Suffix(String),
    Regex(Regex),
    Range { start: i64, end: i64 },
}

/// A single compiled header rule.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    key: HeaderKey,
    rule: MatchRule,
    invert: bool,
}

impl HeaderMatcher {
    /// Compile a rule from configuration.
    pub fn from_config(config: &HeaderMatchConfig) -> Result<Self, MatcherError> {
        let key = HeaderKey::parse(&config.name)?;

        let specifiers = [
            config.exact.is_some(),
            config.prefix.is_some(),
            config.suffix.is_some(),
            config.regex.is_some(),
            config.present.is_some(),
            config.range.is_some(),
        ];
        if specifiers.iter().filter(|set| **set).count() > 1 {
            return Err(MatcherError::ConflictingSpecifiers {
                name: config.name.clone(),
            });
        }

        let rule = if let Some(exact) = &config.exact {
            MatchRule::Exact(exact.clone())
        } else if let Some(prefix) = &config.prefix {
            MatchRule::Prefix(prefix.clone())
        } else if let Some(suffix) = &config.suffix {
            MatchRule::Suffix(suffix.clone())
        } else if let Some(pattern) = &config.regex {
            let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
                MatcherError::InvalidRegex {
                    name: config.name.clone(),
                    source,
                }
            })?;
            MatchRule::Regex(regex)
        } else if let Some(RangeConfig { start, end }) = config.range {
            if start >= end {
                return Err(MatcherError::EmptyRange {
                    name: config.name.clone(),
                    start,
                    end,
                });
            }
            MatchRule::Range { start, end }
        } else {
            MatchRule::Present(config.present.unwrap_or(true))
        };

        Ok(Self {
            key,
            rule,
            invert: config.invert_match,
        })
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Parts) -> bool {
        // Only `present = false` is satisfied by a missing header.
        let Some(value) = self.key.value(req) else {
            let matched = matches!(self.rule, MatchRule::Present(false));
            return matched != self.invert;
        };

        let matched = match &self.rule {
            MatchRule::Present(present) => *present,
            MatchRule::Exact(expected) => value == expected.as_bytes(),
            MatchRule::Prefix(prefix) => value.starts_with(prefix.as_bytes()),
            MatchRule::Suffix(suffix) => value.ends_with(suffix.as_bytes()),
            MatchRule::Regex(regex) => std::str::from_utf8(value)
                .map(|v| regex.is_match(v))
                .unwrap_or(false),
            MatchRule::Range { start, end } => std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .map(|v| v >= *start && v < *end)
                .unwrap_or(false),
        };

        matched != self.invert
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

    /// Compile every configured rule. Fails on the first invalid rule.
    pub fn from_config(configs: &[HeaderMatchConfig]) -> Result<Self, MatcherError> {
        let matchers = configs
            .iter()
            .map(|c| HeaderMatcher::from_config(c).map(|m| Box::new(m) as Box<dyn Matcher>))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(matchers))
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Parts) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
