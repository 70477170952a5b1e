//! Path matching for registered routes.
//!
//! A [`RouteTrie`] keeps one tree of path segments per HTTP method. Patterns are slash separated
//! and made of literal segments (`users`) and named captures (`{id}`); patterns sharing a prefix
//! share the nodes of that prefix.
//!
//! # Precedence
//!
//! When a literal and a capture could both match a segment, the literal is always tried first,
//! whatever the registration order was. If the literal branch fails deeper in the path, lookup
//! backtracks and tries the captures.
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use micro_rest::router::RouteTrie;
//!
//! let mut trie = RouteTrie::new();
//! trie.insert(Method::GET, "users/{id}/profile", "profile").unwrap();
//! trie.insert(Method::GET, "users/me/profile", "own profile").unwrap();
//!
//! let matched = trie.at(&Method::GET, "/users/42/profile").unwrap();
//! assert_eq!(*matched.value(), "profile");
//! assert_eq!(matched.params().get("id"), Some("42"));
//!
//! let matched = trie.at(&Method::GET, "users/me/profile").unwrap();
//! assert_eq!(*matched.value(), "own profile");
//! ```

mod node;
mod routes;

pub use node::RouteNode;
pub use node::Segment;
pub use routes::{Route, RouteBuilder, Routes, delete, get, head, options, patch, post, put, route};

use crate::PathParams;
use crate::error::{MatchError, RouteError};
use http::Method;
use std::collections::HashMap;

/// Route tree keyed by HTTP method.
///
/// The trie is filled during registration and only read afterwards, so a built trie can be shared
/// by any number of concurrent requests.
#[derive(Debug)]
pub struct RouteTrie<T> {
    roots: HashMap<Method, RouteNode<T>>,
}

/// A successful lookup: the bound value and the captured path parameters.
#[derive(Debug)]
pub struct Match<'trie, T> {
    value: &'trie T,
    params: PathParams,
}

impl<T> RouteTrie<T> {
    pub fn new() -> Self {
        Self { roots: HashMap::new() }
    }

    /// Binds `value` to `pattern` for `method`.
    ///
    /// Registering the same pattern twice for one method is rejected with
    /// [`RouteError::Conflict`]; the first binding stays in place.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Result<(), RouteError> {
        let segments = parse_pattern(pattern)?;

        let root = self.roots.entry(method.clone()).or_insert_with(RouteNode::root);
        root.insert(&segments, value)
            .map_err(|_| RouteError::Conflict { method, pattern: pattern.trim_matches('/').to_owned() })
    }

    /// Resolves `path` for `method`.
    pub fn at(&self, method: &Method, path: &str) -> Result<Match<'_, T>, MatchError> {
        self.at_segments(method, &split_path(path))
    }

    /// Resolves a path already split into segments; empty segments never match.
    pub(crate) fn at_segments(&self, method: &Method, segments: &[&str]) -> Result<Match<'_, T>, MatchError> {
        let root = self.roots.get(method).ok_or_else(|| MatchError::MethodNotAllowed { method: method.clone() })?;

        let mut captures = Vec::new();
        root.find(segments, &mut captures)
            .map(|value| Match { value, params: captures.into_iter().collect() })
            .ok_or_else(|| MatchError::RouteNotFound { path: segments.join("/") })
    }

    /// The tree registered for `method`, if any.
    pub fn root(&self, method: &Method) -> Option<&RouteNode<T>> {
        self.roots.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.roots.keys()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl<T> Default for RouteTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'trie, T> Match<'trie, T> {
    #[inline]
    pub fn value(&self) -> &'trie T {
        self.value
    }

    #[inline]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_parts(self) -> (&'trie T, PathParams) {
        (self.value, self.params)
    }
}

/// Splits a request path into its segments, ignoring leading and trailing slashes.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() { Vec::new() } else { trimmed.split('/').collect() }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let mut segments = Vec::new();

    for raw in split_path(pattern) {
        let segment = Segment::parse(raw);
        match &segment {
            Segment::Literal(text) if text.is_empty() => {
                return Err(RouteError::EmptySegment { pattern: pattern.to_owned() });
            }
            Segment::Named(name) if name.is_empty() => {
                return Err(RouteError::EmptyCapture { pattern: pattern.to_owned() });
            }
            Segment::Named(name) if segments.contains(&segment) => {
                return Err(RouteError::DuplicateCapture { name: name.clone(), pattern: pattern.to_owned() });
            }
            _ => {}
        }
        segments.push(segment);
    }

    Ok(segments)
}

/// Names of the captures of `pattern`, in order. Invalid patterns yield what could be parsed.
pub(crate) fn pattern_captures(pattern: &str) -> Vec<String> {
    split_path(pattern)
        .into_iter()
        .filter_map(|raw| match Segment::parse(raw) {
            Segment::Named(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}
