//! Path validation and segment classification for route registration.

use super::RouteError;

/// Kind of a trie node, listed in matching precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Literal text, matched by exact string equality
    Static,
    /// `:name(pattern)`, matched when the compiled pattern matches the segment
    Regex,
    /// `:name`, matches any non-empty segment
    Param,
    /// `*`, matches one segment and absorbs deeper paths via the fallback anchor
    Wildcard,
}

/// A registration token split into its kind and payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Wildcard,
    Regex { name: &'a str, pattern: &'a str },
    Param { name: &'a str },
    Static(&'a str),
}

impl<'a> Segment<'a> {
    /// Classify a single path component.
    ///
    /// Checked in order: exact `*`, then `:name(pattern)`, then any other
    /// `:`-prefixed token, then literal text. A regex segment needs a
    /// non-empty name and must close its pattern with the final `)`.
    pub(crate) fn classify(token: &'a str) -> Self {
        if token == "*" {
            return Segment::Wildcard;
        }
        let Some(rest) = token.strip_prefix(':') else {
            return Segment::Static(token);
        };
        if let Some((name, tail)) = rest.split_once('(') {
            if !name.is_empty() {
                if let Some(pattern) = tail.strip_suffix(')') {
                    return Segment::Regex { name, pattern };
                }
            }
        }
        Segment::Param { name: rest }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Segment::Wildcard => NodeKind::Wildcard,
            Segment::Regex { .. } => NodeKind::Regex,
            Segment::Param { .. } => NodeKind::Param,
            Segment::Static(_) => NodeKind::Static,
        }
    }
}

/// Validate a route path before it touches the trie.
pub(crate) fn validate_path(path: &str) -> Result<(), RouteError> {
    if path.is_empty() {
        return Err(RouteError::EmptyPath);
    }
    if !path.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash {
            path: path.to_string(),
        });
    }
    if path.len() > 1 && path.ends_with('/') {
        return Err(RouteError::TrailingSlash {
            path: path.to_string(),
        });
    }
    if path.contains("//") {
        return Err(RouteError::EmptySegment {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Split a path into its `/`-delimited components, skipping the leading slash.
///
/// Returns `None` for paths that do not start with `/`.
pub(crate) fn split_segments(path: &str) -> Option<std::str::Split<'_, char>> {
    path.strip_prefix('/').map(|rest| rest.split('/'))
}
