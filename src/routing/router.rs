//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Collect exact and prefix routes during startup
//! - Look up the handler for a method and path
//! - Return an explicit no-match (404) or method mismatch (405)
//!
//! # Design Decisions
//! - Immutable after `build()` (shared behind `Arc` without locks)
//! - O(1) exact lookup via HashMap
//! - O(n) prefix scan, longest prefix first

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::context::Context;
use crate::http::request::Method;
use crate::routing::handler::{BoxFuture, Handler, HandlerResult};

type MethodTable = HashMap<Method, Arc<dyn Handler>>;

/// Result of a route lookup.
pub enum RouteMatch<'a> {
    /// A handler is registered for this method and path.
    Found(&'a Arc<dyn Handler>),
    /// The path is known but not for this method.
    MethodNotAllowed,
    /// No exact or prefix route covers the path.
    NotFound,
}

impl std::fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMatch::Found(_) => f.write_str("Found"),
            RouteMatch::MethodNotAllowed => f.write_str("MethodNotAllowed"),
            RouteMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Collects routes before the server starts.
#[derive(Default)]
pub struct RouterBuilder {
    exact: HashMap<String, MethodTable>,
    prefixes: HashMap<String, MethodTable>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an exact path. A later registration of the
    /// same method and path replaces the earlier one.
    pub fn route<F>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.exact
            .entry(path.into())
            .or_default()
            .insert(method, Arc::new(handler));
        self
    }

    /// Registers a handler for every path starting with `prefix`.
    pub fn prefix<F>(mut self, method: Method, prefix: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.prefixes
            .entry(prefix.into())
            .or_default()
            .insert(method, Arc::new(handler));
        self
    }

    pub fn get<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    /// Freezes the table.
    pub fn build(self) -> Router {
        let mut prefixes: Vec<(String, MethodTable)> = self.prefixes.into_iter().collect();
        // Longest prefix first
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        tracing::debug!(
            exact = self.exact.len(),
            prefixes = prefixes.len(),
            "Route table built"
        );

        Router {
            exact: self.exact,
            prefixes,
        }
    }
}

/// Immutable route table.
pub struct Router {
    exact: HashMap<String, MethodTable>,
    prefixes: Vec<(String, MethodTable)>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Finds the handler for `method` and `path`.
    ///
    /// The exact table is consulted first. On a miss, the longest matching
    /// prefix decides; a prefix that matches the path but lacks the method is
    /// a 405 even if a shorter prefix has it.
    pub fn lookup(&self, method: Method, path: &str) -> RouteMatch<'_> {
        let table = self.exact.get(path).or_else(|| {
            self.prefixes
                .iter()
                .find(|(prefix, _)| path.starts_with(prefix.as_str()))
                .map(|(_, table)| table)
        });

        match table {
            Some(table) => match table.get(&method) {
                Some(handler) => RouteMatch::Found(handler),
                None => RouteMatch::MethodNotAllowed,
            },
            None => RouteMatch::NotFound,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }
}
