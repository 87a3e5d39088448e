use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::file::{FileDownloader, FileUploader, StaticResourceHandler};
use crate::middleware::{
    from_fn, AccessLogMiddleware, ErrorPageMiddleware, MetricsMiddleware, Next, SharedMiddleware,
    TracingMiddleware,
};
use crate::runtime_config::RuntimeConfig;
use crate::server::WebServer;
use crate::session::{CookiePropagator, MemoryStore, SessionManager};
use crate::template::MiniJinjaEngine;

const HELLO_TEMPLATE: &str = "<h1>Hello {{ name }}!</h1>";
const NOT_FOUND_PAGE: &str = "<h1>404</h1><p>Nothing lives here.</p>";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "brrtweb-demo")]
#[command(about = "brrtweb demo server", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BRRTWEB_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,

    /// Print the routing table and exit
    #[arg(long, default_value_t = false)]
    pub dump_routes: bool,

    /// Directory served under /static/:file
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Directory served by /download?file=
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Directory that POST /upload stores the `file` form field in
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Directory of templates; an inline hello.html is used without it
    #[arg(long)]
    pub templates_dir: Option<PathBuf>,

    /// Session idle expiry in seconds
    #[arg(long, default_value_t = 1800)]
    pub session_ttl_secs: u64,
}

#[derive(Serialize)]
struct UserBody<'a> {
    id: &'a str,
}

/// Build the demo application described by `cli`
///
/// # Errors
///
/// Fails if a route conflicts or the inline template does not parse.
pub fn build_app(cli: &Cli, config: &RuntimeConfig) -> Result<WebServer> {
    let mut server = WebServer::with_config(config);

    let metrics = Arc::new(MetricsMiddleware::new());
    server
        .add_global_middleware(Arc::new(TracingMiddleware))
        .add_global_middleware(Arc::clone(&metrics) as SharedMiddleware)
        .add_global_middleware(Arc::new(AccessLogMiddleware::new()))
        .add_global_middleware(Arc::new(
            ErrorPageMiddleware::new()
                .add_code(404, NOT_FOUND_PAGE)
                .with_content_type("text/html; charset=utf-8"),
        ));

    let engine = match &cli.templates_dir {
        Some(dir) => MiniJinjaEngine::from_dir(dir),
        None => {
            let mut engine = MiniJinjaEngine::new();
            engine
                .add_template("hello.html", HELLO_TEMPLATE)
                .context("inline template")?;
            engine
        }
    };
    server.set_template_engine(engine);

    let sessions = SessionManager::new(
        Arc::new(MemoryStore::new(Duration::from_secs(cli.session_ttl_secs))),
        Arc::new(CookiePropagator::new()),
    );

    server
        .get("/", |ctx: &mut Context| ctx.resp_string(200, "brrtweb"), [])?
        .get(
            "/health",
            |ctx: &mut Context| {
                if let Err(e) = ctx.resp_json(200, &json!({ "status": "ok" })) {
                    ctx.resp_string(500, e.to_string());
                }
            },
            [],
        )?;

    let metrics_for_route = Arc::clone(&metrics);
    server.get(
        "/metrics",
        move |ctx: &mut Context| {
            ctx.resp_string(200, metrics_for_route.render_prometheus());
            ctx.set_header("Content-Type", "text/plain; version=0.0.4");
        },
        [],
    )?;

    server
        .use_middleware(
            http::Method::GET,
            "/users",
            [from_fn(|ctx: &mut Context, next: Next<'_>| {
                next.run(ctx);
                ctx.set_header("X-Api-Version", "1");
            })],
        )?
        .get(
            "/users/:id([0-9]+)",
            |ctx: &mut Context| {
                let id = ctx.path_value("id").unwrap_or_default().to_string();
                if let Err(e) = ctx.resp_json(200, &UserBody { id: &id }) {
                    ctx.resp_string(500, e.to_string());
                }
            },
            [],
        )?;

    server.get(
        "/hello/:name",
        |ctx: &mut Context| {
            let name = ctx.path_value("name").unwrap_or("world").to_string();
            if let Err(e) = ctx.render("hello.html", &json!({ "name": name })) {
                ctx.resp_string(500, e.to_string());
            }
        },
        [],
    )?;

    let login_sessions = sessions.clone();
    server.post(
        "/login",
        move |ctx: &mut Context| {
            let user = match ctx.form_value("user") {
                Ok(user) => user,
                Err(_) => {
                    ctx.resp_string(400, "missing user");
                    return;
                }
            };
            match login_sessions.init_session(ctx) {
                Ok(session) => match session.set("user", json!(user)) {
                    Ok(()) => ctx.resp_string(200, "logged in"),
                    Err(e) => ctx.resp_string(500, e.to_string()),
                },
                Err(e) => ctx.resp_string(500, e.to_string()),
            }
        },
        [],
    )?;

    let profile_sessions = sessions.clone();
    server.get(
        "/profile",
        move |ctx: &mut Context| {
            let user = profile_sessions
                .get_session(ctx)
                .and_then(|session| session.get("user"));
            match user {
                Ok(user) => {
                    if let Err(e) = ctx.resp_json(200, &json!({ "user": user })) {
                        ctx.resp_string(500, e.to_string());
                    }
                }
                Err(_) => ctx.resp_string(401, "login required"),
            }
        },
        [],
    )?;

    server.post(
        "/logout",
        move |ctx: &mut Context| match sessions.remove_session(ctx) {
            Ok(()) => ctx.resp_string(200, "logged out"),
            Err(_) => ctx.resp_string(401, "login required"),
        },
        [],
    )?;

    if let Some(dir) = &cli.static_dir {
        server.add_route(
            http::Method::GET,
            "/static/:file",
            StaticResourceHandler::new(dir).into_handler(),
            [],
        )?;
    }
    if let Some(dir) = &cli.download_dir {
        server.add_route(
            http::Method::GET,
            "/download",
            FileDownloader::new(dir).into_handler(),
            [],
        )?;
    }
    if let Some(dir) = &cli.upload_dir {
        server.add_route(
            http::Method::POST,
            "/upload",
            FileUploader::new("file", dir).into_handler(),
            [],
        )?;
    }

    let routes = server.router().routes();
    metrics.pre_register(routes.iter().map(|(m, r)| (m, r.as_str())));
    Ok(server)
}
