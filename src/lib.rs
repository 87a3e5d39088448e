//! # brrtweb
//!
//! **brrtweb** is a coroutine-powered HTTP framework for Rust built around a
//! per-method segment trie router with layered middleware.
//!
//! ## Overview
//!
//! Routes are registered once at startup. Each request is resolved by
//! walking the trie for its method one path segment at a time; the result
//! carries the matched handler, the captured path parameters, and every
//! middleware registered along the request path. The dispatcher folds that
//! middleware around the handler and runs it against a per-request
//! [`Context`].
//!
//! ## Architecture
//!
//! - **[`router`]** - Segment trie: registration, conflict detection, matching,
//!   middleware aggregation
//! - **[`dispatcher`]** - Runs the matched middleware chain and handler, with 404
//!   and panic recovery
//! - **[`middleware`]** - `Middleware` trait, `Next` chain, and the bundled
//!   access-log, error-page, metrics and tracing middleware
//! - **[`server`]** - `WebServer` builder and the `may_minihttp` service
//! - **[`context`]** - Per-request state and request/response helpers
//! - **[`session`]** - Session manager, in-memory store, cookie propagation
//! - **[`template`]** - Template engine trait and `minijinja` implementation
//! - **[`file`]** - File download and cached static resource handlers
//! - **[`logging`]** / **[`runtime_config`]** - Environment-driven setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may_minihttp)
//!     participant Global as Server-wide middleware
//!     participant Router as Router
//!     participant Chain as Route middleware
//!     participant Handler
//!
//!     Client->>Server: GET /users/42
//!     Server->>Server: Parse into Context
//!     Server->>Global: Next::run
//!     Global->>Router: find_route(GET, /users/42)
//!     Router-->>Global: node, {id: 42}, [mw(/users)]
//!     alt No match
//!         Router-->>Global: 404
//!     else Match without handler
//!         Global->>Chain: run aggregated middleware
//!         Chain-->>Global: 404
//!     else Match with handler
//!         Global->>Chain: run aggregated middleware
//!         Chain->>Handler: handler(ctx)
//!         Handler-->>Chain: ctx.resp_*
//!         Chain-->>Global: post-processing
//!     end
//!     Global-->>Server: final Context
//!     Server-->>Client: status, headers, body
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brrtweb::{Context, WebServer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut server = WebServer::new();
//!     server.get("/users/:id", |ctx: &mut Context| {
//!         let id = ctx.path_value("id").unwrap_or_default().to_string();
//!         ctx.resp_string(200, format!("user {id}"));
//!     }, [])?;
//!
//!     let handle = server.start("127.0.0.1:8080")?;
//!     handle.wait_ready()?;
//!     handle.join().map_err(|_| anyhow::anyhow!("server panicked"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! The router is built single-threaded and frozen into an `Arc` before the
//! first request; matching is read-only. Handlers run on the `may`
//! coroutine serving the connection.

pub mod cli;
pub mod context;
pub mod dispatcher;
pub mod file;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;
pub mod template;

pub use context::{Context, ContextError, Cookie};
pub use dispatcher::{handler, Dispatcher, HandlerFn};
pub use middleware::{Middleware, Next, SharedMiddleware};
pub use router::{RouteError, RouteMatch, Router};
pub use server::{AppService, HttpServer, ServerHandle, WebServer};
