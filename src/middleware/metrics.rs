use dashmap::DashMap;
use http::Method;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

use super::{Middleware, Next};
use crate::context::Context;

/// Key of a per-route counter: route string, method, final status
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub route: String,
    pub method: String,
    pub status: u16,
}

#[derive(Debug, Default)]
struct RouteStats {
    count: AtomicU64,
    total_latency_ns: AtomicU64,
}

/// Middleware for collecting Prometheus-compatible metrics
///
/// Tracks a global request count and latency plus per (route, method,
/// status) counters. Counters are atomics; the per-route table is a
/// `DashMap`, so recording never takes a global lock.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    routes: DashMap<RouteKey, RouteStats>,
}

impl MetricsMiddleware {
    /// Create a new metrics middleware with all counters initialized to zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests processed
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have been processed yet.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Requests recorded for a route/method/status triple
    pub fn route_count(&self, route: &str, method: &Method, status: u16) -> u64 {
        let key = RouteKey {
            route: route.to_string(),
            method: method.to_string(),
            status,
        };
        self.routes
            .get(&key)
            .map_or(0, |stats| stats.count.load(Ordering::Relaxed))
    }

    /// Create zeroed 200 counters for known routes so they show up before traffic
    pub fn pre_register<'a>(&self, routes: impl IntoIterator<Item = (&'a Method, &'a str)>) {
        for (method, route) in routes {
            self.routes
                .entry(RouteKey {
                    route: route.to_string(),
                    method: method.to_string(),
                    status: 200,
                })
                .or_default();
        }
    }

    fn record(&self, ctx: &Context, latency: Duration) {
        let latency_ns = latency.as_nanos() as u64;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let key = RouteKey {
            route: ctx.route.clone(),
            method: ctx.method.to_string(),
            status: ctx.status(),
        };
        let stats = self.routes.entry(key).or_default();
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
    }

    /// Render all counters in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        if let Err(e) = self.write_prometheus(&mut out) {
            warn!(error = %e, "Failed to render metrics");
        }
        out
    }

    fn write_prometheus(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# HELP brrtweb_requests_total Total requests processed")?;
        writeln!(out, "# TYPE brrtweb_requests_total counter")?;
        writeln!(out, "brrtweb_requests_total {}", self.request_count())?;
        writeln!(
            out,
            "# HELP brrtweb_request_latency_seconds Average request latency"
        )?;
        writeln!(out, "# TYPE brrtweb_request_latency_seconds gauge")?;
        writeln!(
            out,
            "brrtweb_request_latency_seconds {:.6}",
            self.average_latency().as_secs_f64()
        )?;

        let mut rows: Vec<(RouteKey, u64, u64)> = self
            .routes
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.count.load(Ordering::Relaxed),
                    entry.total_latency_ns.load(Ordering::Relaxed),
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        writeln!(
            out,
            "# HELP brrtweb_route_requests_total Requests per route, method and status"
        )?;
        writeln!(out, "# TYPE brrtweb_route_requests_total counter")?;
        for (key, count, _) in &rows {
            writeln!(
                out,
                "brrtweb_route_requests_total{{route=\"{}\",method=\"{}\",status=\"{}\"}} {}",
                key.route, key.method, key.status, count
            )?;
        }
        writeln!(
            out,
            "# HELP brrtweb_route_latency_seconds_sum Total latency per route, method and status"
        )?;
        writeln!(out, "# TYPE brrtweb_route_latency_seconds_sum counter")?;
        for (key, _, latency_ns) in &rows {
            writeln!(
                out,
                "brrtweb_route_latency_seconds_sum{{route=\"{}\",method=\"{}\",status=\"{}\"}} {:.6}",
                key.route,
                key.method,
                key.status,
                Duration::from_nanos(*latency_ns).as_secs_f64()
            )?;
        }
        Ok(())
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let start = Instant::now();
        next.run(ctx);
        self.record(ctx, start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        let metrics = MetricsMiddleware::new();
        let text = metrics.render_prometheus();
        assert!(text.contains("brrtweb_requests_total 0"));
        assert_eq!(metrics.average_latency(), Duration::ZERO);
    }

    #[test]
    fn test_pre_register_creates_zero_rows() {
        let metrics = MetricsMiddleware::new();
        metrics.pre_register([(&Method::GET, "/users/:id")]);
        let text = metrics.render_prometheus();
        assert!(text.contains(
            "brrtweb_route_requests_total{route=\"/users/:id\",method=\"GET\",status=\"200\"} 0"
        ));
    }

    #[test]
    fn test_record_counts_per_status() {
        let metrics = MetricsMiddleware::new();
        let mut ctx = Context::new(Method::GET, "/a");
        ctx.route = "/a".into();
        metrics.record(&ctx, Duration::from_millis(2));
        ctx.resp_status = 404;
        metrics.record(&ctx, Duration::from_millis(4));

        assert_eq!(metrics.request_count(), 2);
        assert_eq!(metrics.average_latency(), Duration::from_millis(3));
        assert_eq!(metrics.route_count("/a", &Method::GET, 200), 1);
        assert_eq!(metrics.route_count("/a", &Method::GET, 404), 1);
        assert_eq!(metrics.route_count("/a", &Method::POST, 200), 0);
    }
}
