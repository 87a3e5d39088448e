use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::context::Context;

/// Canonical reason phrase for a status code
pub fn status_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Header slots `may_minihttp` holds per response; one more would panic
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// Every distinct header line written so far
///
/// `may_minihttp` only accepts `&'static str` headers, so each line is leaked
/// once and reused for every later response that carries it. Lines that are
/// unique per response (a fresh session cookie, a download file name) still
/// cost one leak each.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

/// `'static` copy of a `Name: value` header line, leaked at most once
#[must_use]
pub fn intern_header(line: String) -> &'static str {
    if let Some(interned) = HEADER_LINES.get(line.as_str()) {
        return *interned;
    }
    match HEADER_LINES.entry(line) {
        Entry::Occupied(existing) => *existing.get(),
        Entry::Vacant(slot) => {
            let leaked: &'static str = Box::leak(slot.key().clone().into_boxed_str());
            slot.insert(leaked);
            leaked
        }
    }
}

/// Flush the response held in `ctx` to the wire
///
/// `may_minihttp` adds `Content-Length` from the body. The body is moved
/// out of the context.
pub fn write_response(res: &mut Response, ctx: &mut Context) {
    let status = ctx.status();
    res.status_code(usize::from(status), status_reason(status));
    if ctx.resp_headers.len() > MAX_RESPONSE_HEADERS {
        warn!(
            count = ctx.resp_headers.len(),
            max = MAX_RESPONSE_HEADERS,
            "Too many response headers, extra headers dropped"
        );
    }
    for (name, value) in ctx.resp_headers.iter().take(MAX_RESPONSE_HEADERS) {
        res.header(intern_header(format!("{name}: {value}")));
    }
    res.body_vec(std::mem::take(&mut ctx.resp_body));
}

/// Plain-text error written without a context (e.g. the request did not parse)
pub fn write_error(res: &mut Response, status: u16, message: &str) {
    res.status_code(usize::from(status), status_reason(status));
    res.header("Content-Type: text/plain; charset=utf-8");
    res.body_vec(message.as_bytes().to_vec());
}
