//! Integration tests for the segment trie router through the public API
//!
//! Unit tests next to the trie cover each precedence and conflict rule; these
//! tests exercise the router the way the server uses it: served handler and
//! middleware types, shared behind an `Arc`, resolved from many threads.

use brrtweb::dispatcher::{handler, AppRouter};
use brrtweb::middleware::{from_fn, Next};
use brrtweb::router::{NodeKind, RouteError, Router};
use brrtweb::Context;
use http::Method;
use std::sync::Arc;
use std::thread;

fn tagging_router() -> Router<&'static str, &'static str> {
    let mut router = Router::new();
    for (path, handler) in [
        ("/", "root"),
        ("/user", "user"),
        ("/user/home", "home"),
        ("/order/*", "order_any"),
        ("/param/:id", "param"),
        ("/param/:id/detail", "param_detail"),
        ("/reg/:id(.*)", "reg"),
        ("/files/:name([a-z]+\\.txt)", "text_file"),
    ] {
        router
            .add_route(Method::GET, path, Some(handler), [])
            .unwrap();
    }
    router
}

#[test]
fn test_registered_literal_paths_resolve_to_their_handler() {
    let router = tagging_router();
    for (path, expected) in [
        ("/", "root"),
        ("/user", "user"),
        ("/user/home", "home"),
        ("/order/*", "order_any"),
        ("/param/:id", "param"),
        ("/reg/:id(.*)", "reg"),
    ] {
        let m = router.find_route(&Method::GET, path).unwrap();
        assert_eq!(m.handler(), Some(&expected), "path {path}");
    }
}

#[test]
fn test_params_regex_and_wildcards() {
    let router = tagging_router();

    let m = router.find_route(&Method::GET, "/param/123").unwrap();
    assert_eq!(m.handler(), Some(&"param"));
    assert_eq!(m.get_path_param("id"), Some("123"));

    let m = router.find_route(&Method::GET, "/param/123/detail").unwrap();
    assert_eq!(m.handler(), Some(&"param_detail"));
    assert_eq!(m.path_params_map().get("id").map(String::as_str), Some("123"));

    let m = router.find_route(&Method::GET, "/reg/123").unwrap();
    assert_eq!(m.handler(), Some(&"reg"));
    assert_eq!(m.node.kind(), NodeKind::Regex);

    let m = router.find_route(&Method::GET, "/files/notes.txt").unwrap();
    assert_eq!(m.get_path_param("name"), Some("notes.txt"));
    assert!(router.find_route(&Method::GET, "/files/NOTES.txt").is_none());

    for path in ["/order/delete", "/order/delete/123", "/order/a/b/c/d"] {
        let m = router.find_route(&Method::GET, path).unwrap();
        assert_eq!(m.handler(), Some(&"order_any"), "path {path}");
        assert_eq!(m.node.kind(), NodeKind::Wildcard);
    }

    assert!(router.find_route(&Method::POST, "/user").is_none());
    assert!(router.find_route(&Method::GET, "/nothing/here").is_none());
}

#[test]
fn test_conflicts_are_errors_not_panics() {
    let mut router: Router<&str, &str> = Router::new();
    router.add_route(Method::GET, "/a/*", Some("w"), []).unwrap();
    assert!(matches!(
        router.add_route(Method::GET, "/a/:id", Some("p"), []),
        Err(RouteError::SegmentConflict { .. })
    ));

    let mut router: Router<&str, &str> = Router::new();
    router.add_route(Method::GET, "/a/:id", Some("p"), []).unwrap();
    let err = router
        .add_route(Method::GET, "/a/:name", Some("q"), [])
        .unwrap_err();
    assert!(matches!(err, RouteError::ParamNameConflict { .. }));
    assert!(err.to_string().contains("/a/:name"));

    let mut router: Router<&str, &str> = Router::new();
    router
        .add_route(Method::GET, "/a/:id(.*)", Some("r"), [])
        .unwrap();
    assert!(router.add_route(Method::GET, "/a/:id", Some("p"), []).is_err());

    // same conflicting shape under another method is independent
    assert!(router.add_route(Method::POST, "/a/:id", Some("p"), []).is_ok());
}

#[test]
fn test_prefix_middleware_reaches_deeper_handler() {
    let mut router: Router<&str, &str> = Router::new();
    router.add_route(Method::GET, "/a", None, ["mw_a"]).unwrap();
    router.add_route(Method::GET, "/a/b", None, ["mw_ab"]).unwrap();
    router
        .add_route(Method::GET, "/a/b/c", Some("abc"), [])
        .unwrap();

    let m = router.find_route(&Method::GET, "/a/b/c").unwrap();
    assert_eq!(m.handler(), Some(&"abc"));
    assert_eq!(m.middlewares, vec!["mw_a", "mw_ab"]);

    let prefix = router.find_route(&Method::GET, "/a/b").unwrap();
    assert!(prefix.handler().is_none());
    assert_eq!(prefix.middlewares, vec!["mw_a", "mw_ab"]);
}

#[test]
fn test_shared_router_resolves_concurrently() {
    let mut router = AppRouter::new();
    router
        .add_route(
            Method::GET,
            "/users/:id",
            Some(handler(|ctx: &mut Context| ctx.resp_string(200, "user"))),
            [from_fn(|ctx: &mut Context, next: Next<'_>| next.run(ctx))],
        )
        .unwrap();
    let router = Arc::new(router);

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for n in 0..200 {
                    let path = format!("/users/{}", i * 1000 + n);
                    let m = router.find_route(&Method::GET, &path).unwrap();
                    assert!(m.handler().is_some());
                    assert_eq!(m.middlewares.len(), 1);
                    assert_eq!(
                        m.get_path_param("id"),
                        Some((i * 1000 + n).to_string().as_str())
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_routes_listing_skips_middleware_only_nodes() {
    let mut router: Router<&str, &str> = Router::new();
    router.add_route(Method::GET, "/api", None, ["mw"]).unwrap();
    router
        .add_route(Method::GET, "/api/users", Some("users"), [])
        .unwrap();
    router
        .add_route(Method::DELETE, "/api/users/:id", Some("delete"), [])
        .unwrap();

    assert_eq!(
        router.routes(),
        vec![
            (Method::DELETE, "/api/users/:id".to_string()),
            (Method::GET, "/api/users".to_string()),
        ]
    );
}
