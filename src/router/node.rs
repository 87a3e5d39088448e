//! Segment trie node.
//!
//! Each node represents one `/`-delimited segment. A node owns a map of
//! literal children plus at most one *special* child, which is either a
//! parameter, a regex parameter, or a wildcard. Special kinds never share a
//! position; that rule is what keeps matching free of backtracking.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::segment::{NodeKind, Segment};
use super::RouteError;

fn compile_pattern(pattern: &str, token: &str, path: &str) -> Result<Regex, RouteError> {
    Regex::new(pattern).map_err(|e| RouteError::InvalidPattern {
        path: path.to_string(),
        segment: token.to_string(),
        reason: e.to_string(),
    })
}

/// Node in the per-method routing trie
///
/// Generic over the handler type `H` and middleware type `M` so the trie
/// knows nothing about how requests are served.
#[derive(Debug)]
pub struct Node<H, M> {
    kind: NodeKind,
    /// Raw registration token (e.g. `user`, `:id`, `:id([0-9]+)`, `*`)
    segment: String,
    /// Parameter name for param and regex nodes
    param_name: Option<Arc<str>>,
    /// Compiled pattern for regex nodes
    pattern: Option<Regex>,
    /// Literal children keyed by exact segment text
    children: HashMap<String, Node<H, M>>,
    param_child: Option<Box<Node<H, M>>>,
    regex_child: Option<Box<Node<H, M>>>,
    wildcard_child: Option<Box<Node<H, M>>>,
    /// Present only on a route's terminal node
    handler: Option<H>,
    /// Middleware attached exactly at this node, in registration order
    middlewares: Vec<M>,
    /// Full registered route, empty on intermediate nodes
    route: String,
}

impl<H, M> Node<H, M> {
    pub(crate) fn root() -> Self {
        let mut root = Self::new(NodeKind::Static, "/");
        root.route = "/".to_string();
        root
    }

    fn new(kind: NodeKind, segment: &str) -> Self {
        Self {
            kind,
            segment: segment.to_string(),
            param_name: None,
            pattern: None,
            children: HashMap::new(),
            param_child: None,
            regex_child: None,
            wildcard_child: None,
            handler: None,
            middlewares: Vec::new(),
            route: String::new(),
        }
    }

    fn new_param(kind: NodeKind, segment: &str, name: &str, pattern: Option<Regex>) -> Self {
        let mut node = Self::new(kind, segment);
        node.param_name = Some(Arc::from(name));
        node.pattern = pattern;
        node
    }

    /// Segment kind of this node
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Raw registration token this node was created from
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Parameter name for param and regex nodes
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        self.param_name.as_deref()
    }

    pub(crate) fn param_name_arc(&self) -> Option<&Arc<str>> {
        self.param_name.as_ref()
    }

    /// Handler bound to this node, if a route terminates here
    #[must_use]
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Middleware attached exactly at this node
    #[must_use]
    pub fn middlewares(&self) -> &[M] {
        &self.middlewares
    }

    /// Route string registered for this node, empty for intermediate nodes
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Walk every node of the subtree, parent before children.
    pub(crate) fn visit<'n>(&'n self, f: &mut impl FnMut(&'n Self)) {
        f(self);
        let mut literals: Vec<&Node<H, M>> = self.children.values().collect();
        literals.sort_by(|a, b| a.segment.cmp(&b.segment));
        for child in literals {
            child.visit(f);
        }
        for child in [&self.regex_child, &self.param_child, &self.wildcard_child]
            .into_iter()
            .flatten()
        {
            child.visit(f);
        }
    }

    /// Bind a handler, failing if one is already present.
    pub(crate) fn set_handler(&mut self, handler: H, path: &str) -> Result<(), RouteError> {
        if self.handler.is_some() {
            return Err(RouteError::DuplicateRoute {
                path: path.to_string(),
            });
        }
        self.handler = Some(handler);
        Ok(())
    }

    pub(crate) fn push_middlewares(&mut self, middlewares: impl IntoIterator<Item = M>) {
        self.middlewares.extend(middlewares);
    }

    pub(crate) fn set_route(&mut self, path: &str) {
        self.route = path.to_string();
    }

    /// The special child currently occupying this position, if any
    fn special_child(&self) -> Option<&Node<H, M>> {
        self.wildcard_child
            .as_deref()
            .or(self.param_child.as_deref())
            .or(self.regex_child.as_deref())
    }

    fn conflict(&self, path: &str, token: &str) -> RouteError {
        RouteError::SegmentConflict {
            path: path.to_string(),
            segment: token.to_string(),
            existing: self
                .special_child()
                .map(|c| c.segment.clone())
                .unwrap_or_default(),
        }
    }

    /// Check that `segment` may sit under this node, without touching it.
    ///
    /// Param, regex and wildcard children are mutually exclusive at one
    /// position, and a param child keeps the name it was created with.
    fn check_child(&self, segment: &Segment<'_>, token: &str, path: &str) -> Result<(), RouteError> {
        match segment {
            Segment::Wildcard => {
                if self.param_child.is_some() || self.regex_child.is_some() {
                    return Err(self.conflict(path, token));
                }
            }
            Segment::Regex { .. } => {
                if self.wildcard_child.is_some() || self.param_child.is_some() {
                    return Err(self.conflict(path, token));
                }
            }
            Segment::Param { .. } => {
                if self.wildcard_child.is_some() || self.regex_child.is_some() {
                    return Err(self.conflict(path, token));
                }
                if let Some(existing) = self.param_child.as_deref() {
                    if existing.segment != token {
                        return Err(RouteError::ParamNameConflict {
                            path: path.to_string(),
                            existing: existing.segment.clone(),
                            new: token.to_string(),
                        });
                    }
                }
            }
            Segment::Static(_) => {}
        }
        Ok(())
    }

    /// The child `segment` would descend into, if it already exists
    fn existing_child(&self, segment: &Segment<'_>) -> Option<&Node<H, M>> {
        match segment {
            Segment::Wildcard => self.wildcard_child.as_deref(),
            Segment::Regex { .. } => self.regex_child.as_deref(),
            Segment::Param { .. } => self.param_child.as_deref(),
            Segment::Static(text) => self.children.get(*text),
        }
    }

    /// Dry run of a registration against the subtree rooted at `node`.
    ///
    /// Reports every error [`Node::child_or_create`] and
    /// [`Node::set_handler`] would hit, so a failing registration never
    /// leaves half-built branches behind. `node` is `None` when the method
    /// has no tree yet.
    pub(crate) fn check_route(
        mut node: Option<&Self>,
        tokens: &[&str],
        path: &str,
        has_handler: bool,
    ) -> Result<(), RouteError> {
        for token in tokens {
            let segment = Segment::classify(token);
            let existing = match node {
                Some(parent) => {
                    parent.check_child(&segment, token, path)?;
                    parent.existing_child(&segment)
                }
                None => None,
            };
            if existing.is_none() {
                if let Segment::Regex { pattern, .. } = segment {
                    compile_pattern(pattern, token, path)?;
                }
            }
            node = existing;
        }
        if has_handler && node.is_some_and(|n| n.handler.is_some()) {
            return Err(RouteError::DuplicateRoute {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Find or create the child for a registration token.
    ///
    /// A regex token lands on the regex child already at this position even
    /// when its name or pattern differ; the first registration wins.
    pub(crate) fn child_or_create(
        &mut self,
        token: &str,
        path: &str,
    ) -> Result<&mut Node<H, M>, RouteError> {
        let segment = Segment::classify(token);
        self.check_child(&segment, token, path)?;
        match segment {
            Segment::Wildcard => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.kind(), token)));
                Ok(&mut **child)
            }
            Segment::Regex { name, pattern } => {
                let child = match self.regex_child.take() {
                    Some(existing) => {
                        if existing.segment != token {
                            debug!(
                                path = %path,
                                segment = %token,
                                existing = %existing.segment,
                                "Reusing regex segment registered first"
                            );
                        }
                        existing
                    }
                    None => {
                        let compiled = compile_pattern(pattern, token, path)?;
                        Box::new(Node::new_param(segment.kind(), token, name, Some(compiled)))
                    }
                };
                Ok(&mut **self.regex_child.insert(child))
            }
            Segment::Param { name } => {
                let child = self.param_child.get_or_insert_with(|| {
                    Box::new(Node::new_param(segment.kind(), token, name, None))
                });
                Ok(&mut **child)
            }
            Segment::Static(text) => Ok(self
                .children
                .entry(text.to_string())
                .or_insert_with(|| Node::new(NodeKind::Static, text))),
        }
    }

    fn regex_matches(&self, segment: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(segment))
    }

    /// Select the single child for a request segment.
    ///
    /// Precedence: exact literal, matching regex, parameter (non-empty
    /// segment), wildcard.
    pub(crate) fn child_of(&self, segment: &str) -> Option<&Node<H, M>> {
        if let Some(child) = self.children.get(segment) {
            return Some(child);
        }
        if let Some(child) = self.regex_child.as_deref() {
            if child.regex_matches(segment) {
                return Some(child);
            }
        }
        if let Some(child) = self.param_child.as_deref() {
            if !segment.is_empty() {
                return Some(child);
            }
        }
        self.wildcard_child.as_deref()
    }

    /// Every child reachable with `segment`, in layered-collection order:
    /// wildcard, param, matching regex, exact literal.
    pub(crate) fn layered_children<'n>(
        &'n self,
        segment: &str,
    ) -> impl Iterator<Item = &'n Node<H, M>> {
        let regex = self
            .regex_child
            .as_deref()
            .filter(|child| child.regex_matches(segment));
        [
            self.wildcard_child.as_deref(),
            self.param_child.as_deref(),
            regex,
            self.children.get(segment),
        ]
        .into_iter()
        .flatten()
    }
}
