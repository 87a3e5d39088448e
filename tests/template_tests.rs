//! Template rendering through `Context::render`

mod common;

use brrtweb::cli::{build_app, Cli};
use brrtweb::runtime_config::RuntimeConfig;
use brrtweb::template::{MiniJinjaEngine, TemplateEngine, TemplateError};
use brrtweb::{Context, WebServer};
use clap::Parser;
use common::http::get;
use common::test_server::TestServer;
use http::Method;
use serde_json::json;
use std::fs;

#[test]
fn test_engine_loads_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("list.html"),
        "{% for item in items %}<li>{{ item }}</li>{% endfor %}",
    )
    .unwrap();
    fs::write(dir.path().join("broken.html"), "{% for %}").unwrap();

    let engine = MiniJinjaEngine::from_dir(dir.path());
    let out = engine
        .render("list.html", &json!({ "items": ["a", "<b>"] }))
        .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<li>a</li><li>&lt;b&gt;</li>"
    );

    assert!(matches!(
        engine.render("missing.html", &json!({})),
        Err(TemplateError::NotFound { .. })
    ));
    assert!(matches!(
        engine.render("broken.html", &json!({})),
        Err(TemplateError::Syntax { .. })
    ));
}

#[test]
fn test_render_sets_status_and_content_type() {
    let mut engine = MiniJinjaEngine::new();
    engine
        .add_template("page.html", "<p>{{ title }}</p>")
        .unwrap();
    let mut server = WebServer::new();
    server.set_template_engine(engine);
    server
        .get(
            "/page/:title",
            |ctx: &mut Context| {
                let title = ctx.path_value("title").unwrap_or_default().to_string();
                ctx.render("page.html", &json!({ "title": title })).unwrap();
            },
            [],
        )
        .unwrap()
        .get(
            "/missing",
            |ctx: &mut Context| {
                assert!(ctx.render("nope.html", &json!({})).is_err());
            },
            [],
        )
        .unwrap();
    let service = server.into_service();

    let mut ctx = Context::new(Method::GET, "/page/news");
    service.serve(&mut ctx);
    assert_eq!(ctx.status(), 200);
    assert_eq!(ctx.resp_body, b"<p>news</p>");
    assert_eq!(
        ctx.resp_header("content-type"),
        Some("text/html; charset=utf-8")
    );

    let mut ctx = Context::new(Method::GET, "/missing");
    service.serve(&mut ctx);
    assert_eq!(ctx.status(), 500);
}

#[test]
fn test_demo_hello_over_socket() {
    let cli = Cli::try_parse_from(["brrtweb-demo"]).unwrap();
    let srv = TestServer::start(build_app(&cli, &RuntimeConfig::default()).unwrap());

    let resp = get(&srv.addr, "/hello/brrt");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "<h1>Hello brrt!</h1>");

    let resp = get(&srv.addr, "/not/a/route");
    assert_eq!(resp.status, 404);
    assert!(resp.text().contains("Nothing lives here"));
}
