//! Request middleware.
//!
//! Middleware wraps the handler as an explicit chain: the dispatcher hands
//! the ordered list collected by the router to [`Next`], which runs each
//! stage outermost first and ends in the handler.

mod access_log;
mod core;
mod error_page;
mod metrics;
mod tracing;

pub use access_log::{AccessLog, AccessLogMiddleware, LogSink};
pub use self::core::{from_fn, Endpoint, Middleware, Next, SharedMiddleware};
pub use error_page::ErrorPageMiddleware;
pub use metrics::{MetricsMiddleware, RouteKey};
pub use self::tracing::TracingMiddleware;
