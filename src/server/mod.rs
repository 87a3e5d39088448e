//! HTTP serving on top of `may_minihttp`.
//!
//! [`WebServer`] collects routes and middleware at startup and freezes them
//! into an [`AppService`], which `may_minihttp` clones per connection. Each
//! request becomes a [`Context`](crate::Context), runs through server-wide
//! middleware and the dispatcher, and is flushed back as one response.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;
mod web_server;

pub use http_server::{HttpServer, ServerHandle};
pub use request::parse_request;
pub use response::{status_reason, write_response};
pub use service::AppService;
pub use web_server::WebServer;
