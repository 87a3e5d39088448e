use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Middleware, Next};
use crate::context::Context;

/// One access-log record, emitted as JSON
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AccessLog<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    pub host: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub route: &'a str,
    pub http_method: &'a str,
    pub path: &'a str,
    pub status: u16,
}

/// Sink receiving serialized access-log lines
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Emits one JSON record per request after the chain has run
///
/// Without a sink the record goes to `tracing` at `info` level under the
/// `brrtweb::access` target.
#[derive(Clone, Default)]
pub struct AccessLogMiddleware {
    sink: Option<LogSink>,
}

impl fmt::Debug for AccessLogMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogMiddleware")
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

impl AccessLogMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send records to `sink` instead of `tracing`
    #[must_use]
    pub fn with_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }
}

impl Middleware for AccessLogMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        next.run(ctx);

        let record = AccessLog {
            host: ctx.host().unwrap_or_default(),
            route: &ctx.route,
            http_method: ctx.method.as_str(),
            path: &ctx.path,
            status: ctx.status(),
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode access log record");
                return;
            }
        };
        match &self.sink {
            Some(sink) => sink(&line),
            None => info!(target: "brrtweb::access", "{line}"),
        }
    }
}
