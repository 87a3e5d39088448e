use http::Method;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::http_server::{HttpServer, ServerHandle};
use super::service::AppService;
use crate::context::Context;
use crate::dispatcher::{handler, AppRouter, Dispatcher, HandlerFn};
use crate::middleware::SharedMiddleware;
use crate::router::RouteError;
use crate::runtime_config::RuntimeConfig;
use crate::template::TemplateEngine;

/// Builder for a served application
///
/// Collects routes, middleware and an optional template engine during
/// startup, then freezes them into an [`AppService`]. Registration errors
/// surface as [`RouteError`] so a misconfigured route table stops startup.
///
/// ```rust
/// use brrtweb::{Context, WebServer};
/// use brrtweb::middleware::{from_fn, Next};
///
/// let mut server = WebServer::new();
/// server
///     .get("/hello/:name", |ctx: &mut Context| {
///         let name = ctx.path_value("name").unwrap_or("world").to_string();
///         ctx.resp_string(200, format!("hello {name}"));
///     }, [])?
///     .use_middleware(http::Method::GET, "/hello", [from_fn(|ctx: &mut Context, next: Next<'_>| {
///         next.run(ctx);
///         ctx.set_header("X-Greeted", "1");
///     })])?;
/// let service = server.into_service();
/// # let _ = service;
/// # Ok::<(), brrtweb::RouteError>(())
/// ```
pub struct WebServer {
    router: AppRouter,
    middlewares: Vec<SharedMiddleware>,
    template_engine: Option<Arc<dyn TemplateEngine>>,
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: AppRouter::new(),
            middlewares: Vec::new(),
            template_engine: None,
        }
    }

    /// Create a server using the runtime config's slow-match threshold
    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            router: AppRouter::new()
                .with_slow_match_threshold(Duration::from_micros(config.slow_match_us)),
            ..Self::new()
        }
    }

    /// Register a handler with route-specific middleware
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: HandlerFn,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError> {
        self.router
            .add_route(method, path, Some(handler), middlewares)?;
        Ok(self)
    }

    /// Register a GET handler
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn get<F>(
        &mut self,
        path: &str,
        f: F,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::GET, path, handler(f), middlewares)
    }

    /// Register a POST handler
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn post<F>(
        &mut self,
        path: &str,
        f: F,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::POST, path, handler(f), middlewares)
    }

    /// Register a PUT handler
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn put<F>(
        &mut self,
        path: &str,
        f: F,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, path, handler(f), middlewares)
    }

    /// Register a DELETE handler
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn delete<F>(
        &mut self,
        path: &str,
        f: F,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, path, handler(f), middlewares)
    }

    /// Attach middleware to a path prefix without binding a handler
    ///
    /// The middleware runs for every `method` request whose path descends
    /// through `path`.
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from the router.
    pub fn use_middleware(
        &mut self,
        method: Method,
        path: &str,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<&mut Self, RouteError> {
        self.router.add_route(method, path, None, middlewares)?;
        Ok(self)
    }

    /// Add middleware that wraps every request, matched or not
    pub fn add_global_middleware(&mut self, middleware: SharedMiddleware) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Set the engine used by [`Context::render`]
    pub fn set_template_engine(&mut self, engine: impl TemplateEngine + 'static) -> &mut Self {
        self.template_engine = Some(Arc::new(engine));
        self
    }

    #[must_use]
    pub fn router(&self) -> &AppRouter {
        &self.router
    }

    /// Freeze the route table into a service
    #[must_use]
    pub fn into_service(self) -> AppService {
        self.router.log_routes();
        let dispatcher = Dispatcher::new(Arc::new(self.router));
        AppService::new(
            Arc::new(dispatcher),
            self.middlewares,
            self.template_engine,
        )
    }

    /// Freeze the route table and start serving on `addr`
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let service = self.into_service();
        let handle = HttpServer(service).start(addr)?;
        info!(addr = %handle.addr(), "brrtweb server started");
        Ok(handle)
    }
}
