use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::context::Context;
use crate::middleware::{Next, SharedMiddleware};
use crate::router::{RouteMatch, Router};

/// Request handler: reads the request from the context and writes the response into it
pub type HandlerFn = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Router specialised to served handlers and middleware
pub type AppRouter = Router<HandlerFn, SharedMiddleware>;

/// Wrap a closure as a [`HandlerFn`]
pub fn handler<F>(f: F) -> HandlerFn
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Default response for unmatched and handler-less routes
pub fn not_found(ctx: &mut Context) {
    ctx.resp_string(404, "404 page not found");
}

/// Resolves requests against the router and runs the matched chain
///
/// A handler-less match still runs its aggregated middleware, ending in the
/// 404 endpoint instead of a handler. A panic anywhere in the chain is
/// caught and turned into a 500 response.
pub struct Dispatcher {
    router: Arc<AppRouter>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: Arc<AppRouter>) -> Self {
        Self { router }
    }

    #[must_use]
    pub fn router(&self) -> &AppRouter {
        &self.router
    }

    /// Route `ctx` and run the matched middleware chain and handler
    pub fn dispatch(&self, ctx: &mut Context) {
        let Some(route_match) = self.router.find_route(&ctx.method, &ctx.path) else {
            debug!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                "No route for request"
            );
            not_found(ctx);
            return;
        };

        let RouteMatch {
            node,
            path_params,
            middlewares,
        } = route_match;
        ctx.route = node.route().to_owned();
        ctx.path_params = path_params;

        let endpoint: &(dyn Fn(&mut Context) + Send + Sync) = match node.handler() {
            Some(handler) => &**handler,
            None => &not_found,
        };
        self.run_chain(ctx, &middlewares, endpoint);
    }

    fn run_chain(
        &self,
        ctx: &mut Context,
        middlewares: &[SharedMiddleware],
        endpoint: &(dyn Fn(&mut Context) + Send + Sync),
    ) {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            Next::new(middlewares, endpoint).run(ctx);
        }));

        if let Err(panic) = outcome {
            let panic_message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                request_id = %ctx.request_id,
                route = %ctx.route,
                panic_message = %panic_message,
                "Handler panicked"
            );
            ctx.resp_headers.clear();
            ctx.resp_string(500, "500 internal server error");
            return;
        }

        info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            route = %ctx.route,
            status = ctx.status(),
            middleware_count = middlewares.len(),
            duration_us = start.elapsed().as_micros(),
            "Request dispatched"
        );
    }
}
