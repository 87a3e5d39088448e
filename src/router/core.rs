//! Router core module - registration and hot path for request routing.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::node::Node;
use super::segment::{split_segments, validate_path};
use super::RouteError;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the trie (known at
/// startup); values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of resolving a request path against the trie
///
/// Owns its captured parameters and aggregated middleware list; borrows the
/// matched node from the router.
#[derive(Debug)]
pub struct RouteMatch<'r, H, M> {
    /// The matched trie node (may carry no handler)
    pub node: &'r Node<H, M>,
    /// Path parameters captured along the walk, later captures overwrite earlier ones
    pub path_params: ParamVec,
    /// Middleware collected layer by layer along the request path, outermost first
    pub middlewares: Vec<M>,
}

impl<'r, H, M> RouteMatch<'r, H, M> {
    /// Handler bound to the matched node
    ///
    /// `None` means the path reached a structurally valid position with no
    /// route bound to it (e.g. a middleware-only prefix). Callers treat that
    /// as not found.
    #[inline]
    #[must_use]
    pub fn handler(&self) -> Option<&'r H> {
        self.node.handler()
    }

    /// Route string registered at the matched node
    #[inline]
    #[must_use]
    pub fn route(&self) -> &'r str {
        self.node.route()
    }

    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert path_params to HashMap for compatibility with existing code
    /// Note: This allocates - use get_path_param() in hot paths instead
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl<H, M: PartialEq> PartialEq for RouteMatch<'_, H, M> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.node, other.node)
            && self.path_params == other.path_params
            && self.middlewares == other.middlewares
    }
}

fn record_param(params: &mut ParamVec, name: &Arc<str>, value: &str) {
    match params.iter_mut().find(|(k, _)| k == name) {
        Some((_, existing)) => value.clone_into(existing),
        None => params.push((Arc::clone(name), value.to_owned())),
    }
}

/// Per-method segment trie router
///
/// Routes are registered once at startup with [`Router::add_route`]; after
/// that the router is only read. [`Router::find_route`] takes `&self`, so a
/// finished router can be shared across coroutines behind an `Arc`.
///
/// # Matching
///
/// At each segment the walk picks exactly one child: literal, then regex,
/// then parameter, then wildcard. There is no backtracking across kinds; the
/// only fallback is the most recent wildcard on the walk, which absorbs
/// paths deeper than anything registered beneath it.
pub struct Router<H, M> {
    trees: HashMap<Method, Node<H, M>>,
    slow_match_threshold: Duration,
}

impl<H, M> Default for Router<H, M> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
            slow_match_threshold: Duration::from_millis(1),
        }
    }
}

impl<H, M: Clone> Router<H, M> {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration above which a route match is logged as slow
    #[must_use]
    pub fn with_slow_match_threshold(mut self, threshold: Duration) -> Self {
        self.slow_match_threshold = threshold;
        self
    }

    /// Register a route
    ///
    /// `handler` may be `None` for a middleware-only registration: the
    /// middleware still applies to every request that descends through
    /// `path`. Middleware is appended to whatever is already attached at the
    /// terminal node.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if the path is malformed, a handler is
    /// already bound to `method` + `path`, or a segment conflicts with the
    /// parameter/regex/wildcard segment already registered at its position.
    /// A failed registration leaves the router unchanged.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: Option<H>,
        middlewares: impl IntoIterator<Item = M>,
    ) -> Result<(), RouteError> {
        validate_path(path)?;
        let tokens: Vec<&str> = match split_segments(path) {
            Some(segments) if path != "/" => segments.collect(),
            _ => Vec::new(),
        };
        Node::check_route(self.trees.get(&method), &tokens, path, handler.is_some())?;

        let root = self.trees.entry(method.clone()).or_insert_with(Node::root);
        let mut node = root;
        for token in tokens {
            node = node.child_or_create(token, path)?;
        }

        if let Some(handler) = handler {
            node.set_handler(handler, path)?;
        }
        node.set_route(path);
        node.push_middlewares(middlewares);

        debug!(method = %method, path = %path, "Route registered");
        Ok(())
    }

    /// Resolve a request path
    ///
    /// Returns `None` when the method has no routes or the walk dead-ends
    /// without a wildcard anchor. A returned match may still carry no
    /// handler; see [`RouteMatch::handler`].
    #[must_use]
    pub fn find_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H, M>> {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        let result = self.resolve(method, path);
        let match_duration = match_start.elapsed();

        match &result {
            Some(m) => {
                if match_duration > self.slow_match_threshold {
                    warn!(
                        method = %method,
                        path = %path,
                        route = %m.route(),
                        path_params = ?m.path_params,
                        duration_us = match_duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        route = %m.route(),
                        path_params = ?m.path_params,
                        has_handler = m.handler().is_some(),
                        duration_us = match_duration.as_micros(),
                        "Route matched"
                    );
                }
            }
            None => {
                debug!(
                    method = %method,
                    path = %path,
                    duration_us = match_duration.as_micros(),
                    "No route matched"
                );
            }
        }
        result
    }

    fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H, M>> {
        let root = self.trees.get(method)?;

        if path == "/" {
            return Some(RouteMatch {
                node: root,
                path_params: ParamVec::new(),
                middlewares: root.middlewares().to_vec(),
            });
        }

        let mut params = ParamVec::new();
        let mut anchor: Option<&Node<H, M>> = None;
        let mut node = root;
        for segment in split_segments(path)? {
            let Some(child) = node.child_of(segment) else {
                let anchor = anchor?;
                return Some(RouteMatch {
                    node: anchor,
                    path_params: params,
                    middlewares: Self::collect_middlewares(root, path),
                });
            };
            match child.kind() {
                super::NodeKind::Wildcard => anchor = Some(child),
                super::NodeKind::Param | super::NodeKind::Regex => {
                    if let Some(name) = child.param_name_arc() {
                        record_param(&mut params, name, segment);
                    }
                }
                super::NodeKind::Static => {}
            }
            node = child;
        }

        Some(RouteMatch {
            node,
            path_params: params,
            middlewares: Self::collect_middlewares(root, path),
        })
    }

    /// Collect middleware layer by layer along `path`
    ///
    /// Starts from the root and, for every request segment, expands each
    /// frontier node into its wildcard, param, matching regex and exact
    /// literal children, appending their middleware in that order. This
    /// gathers middleware from every trie position consistent with the path,
    /// not only from the branch the match walk picked.
    fn collect_middlewares(root: &Node<H, M>, path: &str) -> Vec<M> {
        let mut middlewares = root.middlewares().to_vec();
        let Some(segments) = split_segments(path) else {
            return middlewares;
        };

        let mut frontier: Vec<&Node<H, M>> = vec![root];
        let mut next: Vec<&Node<H, M>> = Vec::new();
        for segment in segments {
            if frontier.is_empty() {
                break;
            }
            for node in frontier.drain(..) {
                for child in node.layered_children(segment) {
                    middlewares.extend_from_slice(child.middlewares());
                    next.push(child);
                }
            }
            std::mem::swap(&mut frontier, &mut next);
        }
        middlewares
    }

    /// All registered routes that carry a handler, as `(method, route)` pairs
    ///
    /// Sorted by method then route, useful for startup logging and metrics
    /// pre-registration.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes = Vec::new();
        for (method, root) in &self.trees {
            root.visit(&mut |node| {
                if node.handler().is_some() {
                    routes.push((method.clone(), node.route().to_owned()));
                }
            });
        }
        routes.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()).then_with(|| a.1.cmp(&b.1)));
        routes
    }

    /// Log a summary of the routing table
    pub fn log_routes(&self) {
        let routes = self.routes();
        let routes_summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|(method, route)| format!("{method} {route}"))
            .collect();
        info!(
            routes_count = routes.len(),
            methods = self.trees.len(),
            routes_summary = ?routes_summary,
            routing_algorithm = "segment_trie",
            "Routing table loaded"
        );
    }

    /// Print all registered routes to stdout
    ///
    /// Useful for debugging and verifying that routes are loaded correctly.
    pub fn dump_routes(&self) {
        let routes = self.routes();
        println!("[routes] count={}", routes.len());
        for (method, route) in routes {
            println!("[route] {method} {route}");
        }
    }
}
