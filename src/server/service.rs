use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::warn;

use super::request::parse_request;
use super::response::{write_error, write_response};
use crate::context::Context;
use crate::dispatcher::Dispatcher;
use crate::middleware::{Next, SharedMiddleware};
use crate::template::TemplateEngine;

/// `may_minihttp` service wrapping a finished router
///
/// Cloned once per connection; all clones share the same dispatcher,
/// server-wide middleware and template engine.
#[derive(Clone)]
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
    middlewares: Arc<[SharedMiddleware]>,
    template_engine: Option<Arc<dyn TemplateEngine>>,
}

impl AppService {
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        middlewares: Vec<SharedMiddleware>,
        template_engine: Option<Arc<dyn TemplateEngine>>,
    ) -> Self {
        Self {
            dispatcher,
            middlewares: middlewares.into(),
            template_engine,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run server-wide middleware, then routing and the matched chain
    ///
    /// Server-wide middleware wraps every request, including ones that match
    /// no route, so it sees the final status of 404s too.
    pub fn serve(&self, ctx: &mut Context) {
        ctx.set_template_engine(self.template_engine.clone());
        let endpoint = |ctx: &mut Context| self.dispatcher.dispatch(ctx);
        Next::new(&self.middlewares, &endpoint).run(ctx);
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut ctx = match parse_request(req) {
            Ok(ctx) => ctx,
            Err(method) => {
                warn!(method = %method, "Rejected request with invalid method");
                write_error(res, 400, "400 bad request");
                return Ok(());
            }
        };
        self.serve(&mut ctx);
        write_response(res, &mut ctx);
        Ok(())
    }
}
