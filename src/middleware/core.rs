use std::sync::Arc;

use crate::context::Context;

/// A stage wrapped around the handler
///
/// A middleware receives the request context and the remainder of the chain.
/// Calling [`Next::run`] invokes the inner stages; code before that call
/// sees the request, code after it sees (and may rewrite) the response. Not
/// calling it short-circuits the request.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut Context, next: Next<'_>);
}

/// Shared, type-erased middleware as stored in the router
pub type SharedMiddleware = Arc<dyn Middleware>;

impl<F> Middleware for F
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync,
{
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        self(ctx, next)
    }
}

/// Wrap a closure as [`SharedMiddleware`]
///
/// ```rust
/// use brrtweb::middleware::{from_fn, Next};
/// use brrtweb::Context;
///
/// let mw = from_fn(|ctx: &mut Context, next: Next<'_>| {
///     ctx.set_header("X-Before", "1");
///     next.run(ctx);
/// });
/// # let _ = mw;
/// ```
pub fn from_fn<F>(f: F) -> SharedMiddleware
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The innermost stage of a chain
pub type Endpoint<'a> = &'a (dyn Fn(&mut Context) + 'a);

/// Remainder of a middleware chain
///
/// Holds the middleware still to run, outermost first, and the endpoint the
/// chain ends in. Running it pops one middleware and hands it a `Next` over
/// the rest, so the ordered list folds into nested calls without building
/// closures per request.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middlewares: &'a [SharedMiddleware],
    endpoint: Endpoint<'a>,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(middlewares: &'a [SharedMiddleware], endpoint: Endpoint<'a>) -> Self {
        Self {
            middlewares,
            endpoint,
        }
    }

    /// Number of middleware still ahead of the endpoint
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.middlewares.len()
    }

    /// Run the rest of the chain
    pub fn run(self, ctx: &mut Context) {
        match self.middlewares.split_first() {
            Some((first, rest)) => first.handle(
                ctx,
                Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}
