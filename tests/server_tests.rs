//! End-to-end tests over a real socket
//!
//! Each test starts its own server on a free port; `TestServer` stops it on
//! drop.

mod common;

use brrtweb::middleware::{from_fn, ErrorPageMiddleware, Next};
use brrtweb::{Context, Cookie, WebServer};
use common::http::{get, send_request};
use common::test_server::TestServer;
use http::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Pet {
    name: String,
    age: u32,
}

fn demo_server() -> WebServer {
    let mut server = WebServer::new();
    server.add_global_middleware(Arc::new(
        ErrorPageMiddleware::new().add_code(404, "custom not found"),
    ));
    server
        .use_middleware(
            Method::GET,
            "/api",
            [from_fn(|ctx: &mut Context, next: Next<'_>| {
                next.run(ctx);
                ctx.set_header("X-Api-Version", "1");
            })],
        )
        .unwrap()
        .get(
            "/api/pets/:id([0-9]+)",
            |ctx: &mut Context| {
                let id = ctx.path_value("id").unwrap_or_default().to_string();
                let verbose = ctx.query_value("verbose").is_ok();
                ctx.resp_string(200, format!("pet {id} verbose={verbose}"));
            },
            [],
        )
        .unwrap()
        .post(
            "/api/pets",
            |ctx: &mut Context| match ctx.bind_json::<Pet>() {
                Ok(pet) => {
                    if let Err(e) = ctx.resp_json(201, &pet) {
                        ctx.resp_string(500, e.to_string());
                    }
                }
                Err(e) => ctx.resp_string(400, e.to_string()),
            },
            [],
        )
        .unwrap()
        .get(
            "/cookies",
            |ctx: &mut Context| {
                let seen = ctx.cookie("flavor").unwrap_or("none").to_string();
                let mut a = Cookie::new("a", "1");
                a.path = Some("/".into());
                ctx.set_cookie(&a);
                ctx.set_cookie(&Cookie::new("b", "2"));
                ctx.resp_string(200, seen);
            },
            [],
        )
        .unwrap();
    server
}

#[test]
fn test_get_with_path_and_query() {
    let srv = TestServer::start(demo_server());
    let resp = get(&srv.addr, "/api/pets/42?verbose=1");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "pet 42 verbose=true");
    assert_eq!(resp.header("x-api-version"), Some("1"));
    assert_eq!(
        resp.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
}

#[test]
fn test_regex_mismatch_is_custom_404() {
    let srv = TestServer::start(demo_server());
    let resp = get(&srv.addr, "/api/pets/rex");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.text(), "custom not found");
    assert!(resp.header("x-api-version").is_none());

    // the middleware-only prefix matches without a handler, so its
    // middleware runs around the 404
    let resp = get(&srv.addr, "/api");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.text(), "custom not found");
    assert_eq!(resp.header("x-api-version"), Some("1"));
}

#[test]
fn test_post_json_round_trip() {
    let srv = TestServer::start(demo_server());
    let body = r#"{"name":"rex","age":3}"#;
    let req = format!(
        "POST /api/pets HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = send_request(&srv.addr, &req);
    assert_eq!(resp.status, 201);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    let pet: Pet = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(
        pet,
        Pet {
            name: "rex".into(),
            age: 3
        }
    );

    let req = "POST /api/pets HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n";
    let resp = send_request(&srv.addr, req);
    assert_eq!(resp.status, 400);
}

#[test]
fn test_cookies_in_and_out() {
    let srv = TestServer::start(demo_server());
    let req = "GET /cookies HTTP/1.1\r\nHost: localhost\r\nCookie: flavor=oat; x=y\r\n\r\n";
    let resp = send_request(&srv.addr, req);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "oat");
    assert_eq!(resp.headers_named("set-cookie"), vec!["a=1; Path=/", "b=2"]);
}

#[test]
fn test_method_not_registered_is_404() {
    let srv = TestServer::start(demo_server());
    let req = "DELETE /api/pets/1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let resp = send_request(&srv.addr, req);
    assert_eq!(resp.status, 404);
    assert_eq!(resp.text(), "custom not found");
}

#[test]
fn test_encoded_path_is_routed_decoded() {
    let mut server = WebServer::new();
    server
        .get(
            "/user/:name",
            |ctx: &mut Context| {
                let name = ctx.path_value("name").unwrap_or_default().to_string();
                ctx.resp_string(200, name);
            },
            [],
        )
        .unwrap()
        .get("/docs/getting started", |ctx: &mut Context| ctx.resp_string(200, "docs"), [])
        .unwrap();
    let srv = TestServer::start(server);

    let resp = get(&srv.addr, "/user/a%20b");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "a b");

    let resp = get(&srv.addr, "/docs/getting%20started");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "docs");
}
