//! Session flow through the demo application

mod common;

use brrtweb::cli::{build_app, Cli};
use brrtweb::runtime_config::RuntimeConfig;
use brrtweb::server::AppService;
use brrtweb::session::{CookiePropagator, MemoryStore, SessionManager, Store};
use brrtweb::Context;
use clap::Parser;
use common::http::send_request;
use common::test_server::TestServer;
use http::Method;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn demo_service() -> AppService {
    let cli = Cli::try_parse_from(["brrtweb-demo"]).unwrap();
    build_app(&cli, &RuntimeConfig::default())
        .unwrap()
        .into_service()
}

fn login(service: &AppService, user: &str) -> Context {
    let mut ctx = Context::new(Method::POST, "/login")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(format!("user={user}"));
    service.serve(&mut ctx);
    ctx
}

/// `name=value` part of the response's Set-Cookie header
fn cookie_pair(ctx: &Context) -> String {
    let header = ctx.resp_header("set-cookie").unwrap();
    header.split(';').next().unwrap().to_string()
}

#[test]
fn test_login_profile_logout() {
    let service = demo_service();

    let login_ctx = login(&service, "tom");
    assert_eq!(login_ctx.status(), 200);
    let set_cookie = login_ctx.resp_header("set-cookie").unwrap();
    assert!(set_cookie.starts_with("sessid="), "{set_cookie}");
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = cookie_pair(&login_ctx);

    let mut profile = Context::new(Method::GET, "/profile").with_header("Cookie", &cookie);
    service.serve(&mut profile);
    assert_eq!(profile.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(&profile.resp_body).unwrap();
    assert_eq!(body, json!({ "user": "tom" }));

    let mut logout = Context::new(Method::POST, "/logout").with_header("Cookie", &cookie);
    service.serve(&mut logout);
    assert_eq!(logout.status(), 200);
    assert!(logout.resp_header("set-cookie").unwrap().contains("Max-Age=0"));

    let mut after = Context::new(Method::GET, "/profile").with_header("Cookie", &cookie);
    service.serve(&mut after);
    assert_eq!(after.status(), 401);
}

#[test]
fn test_sessions_are_isolated() {
    let service = demo_service();
    let tom = cookie_pair(&login(&service, "tom"));
    let ann = cookie_pair(&login(&service, "ann"));
    assert_ne!(tom, ann);

    for (cookie, user) in [(&tom, "tom"), (&ann, "ann")] {
        let mut ctx = Context::new(Method::GET, "/profile").with_header("Cookie", cookie);
        service.serve(&mut ctx);
        let body: serde_json::Value = serde_json::from_slice(&ctx.resp_body).unwrap();
        assert_eq!(body["user"], user);
    }
}

#[test]
fn test_login_requires_user() {
    let service = demo_service();
    let mut ctx = Context::new(Method::POST, "/login");
    service.serve(&mut ctx);
    assert_eq!(ctx.status(), 400);
    assert!(ctx.resp_header("set-cookie").is_none());

    let mut profile = Context::new(Method::GET, "/profile");
    service.serve(&mut profile);
    assert_eq!(profile.status(), 401);
}

#[test]
fn test_expired_session_is_rejected() {
    let store = Arc::new(MemoryStore::new(Duration::from_millis(100)));
    let manager = SessionManager::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(CookiePropagator::new().with_name("sid")),
    );

    let mut login = Context::new(Method::POST, "/login");
    let session = manager.init_session(&mut login).unwrap();
    let cookie = cookie_pair(&login);
    assert!(cookie.starts_with("sid="));
    assert_eq!(store.len(), 1);

    thread::sleep(Duration::from_millis(200));
    let mut later = Context::new(Method::GET, "/profile").with_header("Cookie", &cookie);
    assert!(manager.get_session(&mut later).is_err());
    assert!(store.get(session.id()).is_err());
}

#[test]
fn test_session_cookie_over_socket() {
    let cli = Cli::try_parse_from(["brrtweb-demo"]).unwrap();
    let srv = TestServer::start(build_app(&cli, &RuntimeConfig::default()).unwrap());

    let body = "user=zoe";
    let req = format!(
        "POST /login HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = send_request(&srv.addr, &req);
    assert_eq!(resp.status, 200);
    let cookie = resp
        .header("set-cookie")
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();

    let req = format!("GET /profile HTTP/1.1\r\nHost: localhost\r\nCookie: {cookie}\r\n\r\n");
    let resp = send_request(&srv.addr, &req);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), r#"{"user":"zoe"}"#);
}
