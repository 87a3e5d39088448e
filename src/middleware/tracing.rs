use std::time::Instant;

use tracing::{field, info_span};

use super::{Middleware, Next};
use crate::context::Context;

/// Wraps each request in an `info` span
///
/// The span carries method, path and request id from the start; route,
/// status and latency are recorded once the inner chain returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let span = info_span!(
            "request",
            method = %ctx.method,
            path = %ctx.path,
            request_id = %ctx.request_id,
            route = field::Empty,
            status = field::Empty,
            latency_us = field::Empty,
        );
        let _entered = span.enter();
        let start = Instant::now();

        next.run(ctx);

        span.record("route", ctx.route.as_str());
        span.record("status", ctx.status());
        span.record("latency_us", start.elapsed().as_micros() as u64);
    }
}
