//! # Router Module
//!
//! The router module provides path matching and route resolution for brrtweb.
//! Routes are stored in one segment trie per HTTP method.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Validating and classifying route paths at registration time
//! - Detecting conflicting registrations before the server starts
//! - Matching incoming request paths to trie nodes
//! - Extracting path parameters from matched routes
//! - Collecting the middleware registered along a path prefix
//!
//! ## Path Grammar
//!
//! | Segment          | Kind     | Matches                                  |
//! |------------------|----------|------------------------------------------|
//! | `users`          | static   | exactly `users`                          |
//! | `:id([0-9]+)`    | regex    | any segment the pattern matches          |
//! | `:id`            | param    | any non-empty segment                    |
//! | `*`              | wildcard | any segment, and anything deeper         |
//!
//! Patterns are unanchored unless they contain `^` or `$`. Param, regex and
//! wildcard segments are mutually exclusive at the same position; static
//! segments can sit next to any of them. A later regex segment at a position
//! that already has one shares it, keeping the first name and pattern.
//!
//! ## Example
//!
//! ```rust
//! use brrtweb::router::Router;
//! use http::Method;
//!
//! let mut router: Router<&str, &str> = Router::new();
//! router.add_route(Method::GET, "/users/:id", Some("get_user"), []).unwrap();
//! router.add_route(Method::GET, "/users", None, ["audit"]).unwrap();
//!
//! let m = router.find_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(m.handler(), Some(&"get_user"));
//! assert_eq!(m.get_path_param("id"), Some("42"));
//! assert_eq!(m.middlewares, vec!["audit"]);
//! ```
//!
//! ## Performance
//!
//! - Registration: O(k) in the number of segments
//! - Matching: O(k) with O(1) amortized lookup per literal segment
//! - Middleware collection: O(k × frontier width)

mod core;
mod error;
mod node;
mod segment;

pub use self::core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use error::RouteError;
pub use node::Node;
pub use segment::NodeKind;
