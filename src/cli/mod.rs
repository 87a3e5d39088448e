//! # CLI Module
//!
//! Command-line entry point for the `brrtweb-demo` binary.
//!
//! ```bash
//! brrtweb-demo --addr 0.0.0.0:8080 --static-dir ./public --download-dir ./files --upload-dir ./incoming
//! brrtweb-demo --dump-routes
//! ```
//!
//! The demo wires every bundled piece together: tracing, metrics, access
//! log and error-page middleware, a prefix-only middleware on `/users`,
//! cookie sessions, templates and the file handlers.

mod commands;

pub use commands::{build_app, Cli};
