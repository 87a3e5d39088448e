use http::Method;
use may_minihttp::Request;
use std::io::Read;
use tracing::{debug, warn};

use crate::context::Context;

/// Build a [`Context`] from a raw `may_minihttp` request
///
/// Header names are lower-cased and the Cookie header is split into
/// cookies. The body is read last since it consumes the request.
///
/// # Errors
///
/// Returns the offending method token if it is not a valid HTTP method.
pub fn parse_request(req: Request) -> Result<Context, String> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|_| req.method().to_string())?;
    let mut ctx = Context::new(method, req.path());

    for header in req.headers() {
        ctx.push_header(header.name, &String::from_utf8_lossy(header.value));
    }
    debug!(
        request_id = %ctx.request_id,
        header_count = ctx.headers.len(),
        cookie_count = ctx.cookies.len(),
        "Headers extracted"
    );

    let mut body = Vec::new();
    if let Err(e) = req.body().read_to_end(&mut body) {
        warn!(request_id = %ctx.request_id, error = %e, "Failed to read request body");
    }
    ctx.body = body;

    debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        path = %ctx.path,
        body_size_bytes = ctx.body.len(),
        "HTTP request parsed"
    );
    Ok(ctx)
}
