//! End-to-end harness: drives the full request -> rewrite -> graph
//! pipeline over a temp-dir project, with no real TCP listener involved.

use http_body_util::BodyExt;
use loom_server::{build_router, default_plugins, ProjectConfig, ServerContext};
use tower::ServiceExt;

fn write(root: &std::path::Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn serves_rewritten_module_and_responds_304_on_revalidation() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", "<html><head></head><body></body></html>");
    write(dir.path(), "main.js", "import { greet } from './greet';\ngreet();\n");
    write(dir.path(), "greet.js", "export function greet() { console.log('hi'); }\n");

    let ctx = ServerContext::new(ProjectConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });
    let app = build_router(&ctx, &default_plugins());

    let request = axum::http::Request::builder()
        .uri("/main.js")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let etag = response
        .headers()
        .get(axum::http::header::ETAG)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("\"/greet.js\""));

    // First response for this URL can never be a 304 even with a matching etag.
    let request = axum::http::Request::builder()
        .uri("/main.js")
        .header(axum::http::header::IF_NONE_MATCH, &etag)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    // Second time around with the same etag, it is eligible for 304.
    let request = axum::http::Request::builder()
        .uri("/main.js")
        .header(axum::http::header::IF_NONE_MATCH, &etag)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn version_stamp_appears_once_importee_is_dirty() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", "<html></html>");
    write(dir.path(), "main.js", "import { greet } from './greet';\n");
    write(dir.path(), "greet.js", "export function greet() {}\n");

    let ctx = ServerContext::new(ProjectConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });
    let app = build_router(&ctx, &default_plugins());

    let request = axum::http::Request::builder()
        .uri("/main.js")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!String::from_utf8_lossy(&body).contains("?t="));

    // Simulate the watcher observing a change to greet.js.
    let timestamp = ctx.graph.next_timestamp(1_000);
    loom_core::propagate(&ctx.graph, "/greet.js", timestamp);

    // A plain refetch of main.js is still served from the rewrite cache,
    // so it does not see the freshly recorded version yet.
    let request = axum::http::Request::builder()
        .uri("/main.js")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!String::from_utf8_lossy(&body).contains("?t="));

    // An HMR-driven refetch (carrying a `t=` query) bypasses the rewrite
    // cache and re-derives the stamp fresh.
    let request = axum::http::Request::builder()
        .uri(format!("/main.js?t={timestamp}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains(&format!("?t={timestamp}")));
}

#[tokio::test]
async fn serves_index_html_with_hmr_client_injected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", "<html><head><title>t</title></head><body></body></html>");

    let ctx = ServerContext::new(ProjectConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });
    let app = build_router(&ctx, &default_plugins());

    let request = axum::http::Request::builder()
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("/@hmr-client"));
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", "<html></html>");

    let ctx = ServerContext::new(ProjectConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });
    let app = build_router(&ctx, &default_plugins());

    let request = axum::http::Request::builder()
        .uri("/does-not-exist.js")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}
