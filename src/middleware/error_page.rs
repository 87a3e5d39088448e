use std::collections::HashMap;

use super::{Middleware, Next};
use crate::context::Context;

/// Replaces the response body for selected status codes
///
/// Runs after the inner chain; any response whose final status has a
/// configured page gets that page as its body. The status is kept.
#[derive(Debug, Clone, Default)]
pub struct ErrorPageMiddleware {
    pages: HashMap<u16, Vec<u8>>,
    content_type: Option<String>,
}

impl ErrorPageMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` whenever the response status is `code`
    #[must_use]
    pub fn add_code(mut self, code: u16, page: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(code, page.into());
        self
    }

    /// Content type set alongside a replaced body
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl Middleware for ErrorPageMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        next.run(ctx);

        if let Some(page) = self.pages.get(&ctx.status()) {
            ctx.resp_body.clone_from(page);
            if let Some(ct) = &self.content_type {
                ctx.set_header("Content-Type", ct.clone());
            }
        }
    }
}
