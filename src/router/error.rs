use std::fmt;

/// Route registration error
///
/// Returned by [`Router::add_route`](super::Router::add_route) when a path is
/// malformed or would conflict with a route that is already in the trie.
/// Conflicts are programming mistakes in route setup; callers normally abort
/// startup on any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The path is the empty string
    EmptyPath,
    /// The path does not begin with `/`
    MissingLeadingSlash {
        /// The rejected path
        path: String,
    },
    /// The path ends with `/` and is not the root
    TrailingSlash {
        /// The rejected path
        path: String,
    },
    /// The path contains `//`
    EmptySegment {
        /// The rejected path
        path: String,
    },
    /// A handler is already bound to this method and exact path
    DuplicateRoute {
        /// The duplicated path
        path: String,
    },
    /// A different special segment kind already occupies this position
    ///
    /// Parameter, regex and wildcard children are mutually exclusive under
    /// the same parent.
    SegmentConflict {
        /// The path being registered
        path: String,
        /// The segment that could not be inserted
        segment: String,
        /// The token already registered at this position
        existing: String,
    },
    /// A parameter with a different name already occupies this position
    ParamNameConflict {
        /// The path being registered
        path: String,
        /// The existing parameter token (e.g. `:id`)
        existing: String,
        /// The rejected parameter token (e.g. `:name`)
        new: String,
    },
    /// The regex body of a `:name(pattern)` segment does not compile
    InvalidPattern {
        /// The path being registered
        path: String,
        /// The offending segment
        segment: String,
        /// Compiler message from the regex crate
        reason: String,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::EmptyPath => write!(f, "route error: path is empty"),
            RouteError::MissingLeadingSlash { path } => {
                write!(f, "route error: path '{path}' must start with '/'")
            }
            RouteError::TrailingSlash { path } => {
                write!(f, "route error: path '{path}' must not end with '/'")
            }
            RouteError::EmptySegment { path } => write!(
                f,
                "route error: path '{path}' contains an empty segment (paths like //a/b or /a//b are not allowed)"
            ),
            RouteError::DuplicateRoute { path } => {
                write!(f, "route conflict: a handler is already registered for '{path}'")
            }
            RouteError::SegmentConflict {
                path,
                segment,
                existing,
            } => write!(
                f,
                "route conflict: cannot register segment '{segment}' in '{path}', \
                '{existing}' is already registered at this position"
            ),
            RouteError::ParamNameConflict {
                path,
                existing,
                new,
            } => write!(
                f,
                "route conflict: parameter '{new}' in '{path}' clashes with existing parameter '{existing}'"
            ),
            RouteError::InvalidPattern {
                path,
                segment,
                reason,
            } => write!(
                f,
                "route error: invalid pattern in segment '{segment}' of '{path}': {reason}"
            ),
        }
    }
}

impl std::error::Error for RouteError {}
