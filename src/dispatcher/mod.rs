//! # Dispatcher Module
//!
//! Turns a router match into an executed request.
//!
//! ## Request Flow
//!
//! 1. The router resolves method + path to a node, captured path
//!    parameters and the aggregated middleware list
//! 2. The dispatcher copies the route and parameters into the [`Context`](crate::Context)
//! 3. Middleware runs outermost first through [`Next`](crate::middleware::Next),
//!    ending in the handler
//!
//! ## Error Handling
//!
//! - Unmatched paths and handler-less matches return 404
//! - Handler and middleware panics are caught and return 500
//!
//! Handlers run on the connection's coroutine; the dispatcher never spawns.

mod core;

pub use self::core::{handler, not_found, AppRouter, Dispatcher, HandlerFn};
