//! Module rewriter plugin: the catch-all leaf for any request
//! under the project root. JS-source-extension files go through
//! `loom_core::rewrite_module` with ETag/304 semantics and a
//! content-addressed rewrite cache in front of the parse step; everything
//! else is served as raw bytes straight from the file cache (CSS/JSON/WASM
//! import-wrapper loaders are out of scope, so a non-JS asset is always
//! served as itself, never as a generated JS module).

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use loom_core::cache::ReadOutcome;
use loom_core::specifier;
use tracing::{debug, trace, warn};

use crate::error::AppError;
use crate::ServerContext;

pub fn register(router: Router<ServerContext>, _ctx: &ServerContext) -> Router<ServerContext> {
    router.route("/*path", get(handle))
}

async fn handle(
    State(ctx): State<ServerContext>,
    axum::extract::Path(path): axum::extract::Path<String>,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let public_path = format!("/{path}");
    let abs_path = ctx.resolver.request_to_file(&public_path);

    if !abs_path.is_file() {
        return Err(AppError::Core(loom_core::CoreError::NotFound(public_path)));
    }

    let if_none_match = headers
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    serve_resolved(&ctx, &abs_path, &public_path, if_none_match, is_hmr_refetch(&query)).await
}

/// A request carrying a `t=` query is an HMR-driven refetch: the rewrite
/// cache is bypassed so nested import version stamps are re-derived fresh
/// rather than served from a body-hash-addressed entry that predates the
/// dependency's version bump.
pub(crate) fn is_hmr_refetch(query: &Option<String>) -> bool {
    query.as_deref().is_some_and(|q| q.split('&').any(|p| p.starts_with("t=")))
}

/// Dispatches on extension: JS source goes through the rewrite pipeline,
/// everything else is served as-is. Shared with the `/@modules/...` plugin.
pub(crate) async fn serve_resolved(
    ctx: &ServerContext,
    abs_path: &Path,
    public_path: &str,
    if_none_match: Option<&str>,
    is_hmr_refetch: bool,
) -> Result<Response, AppError> {
    if specifier::has_non_js_extension(public_path) {
        serve_raw(ctx, abs_path, public_path, if_none_match).await
    } else {
        serve_rewritten(ctx, abs_path, public_path, if_none_match, is_hmr_refetch).await
    }
}

async fn serve_raw(
    ctx: &ServerContext,
    abs_path: &Path,
    public_path: &str,
    if_none_match: Option<&str>,
) -> Result<Response, AppError> {
    let outcome = ctx
        .file_cache
        .read_for_request(abs_path, public_path, if_none_match)?;

    match outcome {
        ReadOutcome::NotModified { etag } => {
            trace!(%public_path, "304 not modified");
            Ok(build_response(StatusCode::NOT_MODIFIED, &etag, mime_for(public_path), None, None))
        }
        ReadOutcome::Fresh(entry) => {
            let last_modified = entry.last_modified_millis;
            Ok(build_response(
                StatusCode::OK,
                &entry.etag,
                mime_for(public_path),
                Some(entry.content),
                Some(last_modified),
            ))
        }
    }
}

async fn serve_rewritten(
    ctx: &ServerContext,
    abs_path: &Path,
    public_path: &str,
    if_none_match: Option<&str>,
    is_hmr_refetch: bool,
) -> Result<Response, AppError> {
    let outcome = ctx
        .file_cache
        .read_for_request(abs_path, public_path, if_none_match)?;

    let entry = match outcome {
        ReadOutcome::NotModified { etag } => {
            trace!(%public_path, "304 not modified");
            return Ok(build_response(StatusCode::NOT_MODIFIED, &etag, "application/javascript; charset=utf-8", None, None));
        }
        ReadOutcome::Fresh(entry) => entry,
    };

    let last_modified = entry.last_modified_millis;
    let clean_id = specifier::clean_url(public_path).to_string();
    let cache_key = loom_core::RewriteCache::key(&clean_id, &entry.content);

    if !is_hmr_refetch {
        if let Some(cached) = ctx.rewrite_cache.get(&cache_key) {
            trace!(%public_path, "rewrite cache hit, skipping parse");
            return Ok(build_response(
                StatusCode::OK,
                &entry.etag,
                "application/javascript; charset=utf-8",
                Some(cached),
                Some(last_modified),
            ));
        }
    }

    debug!(%public_path, "rewrite cache miss, parsing module");
    let rewritten = rewrite_blocking(
        ctx.clone(),
        abs_path.to_path_buf(),
        clean_id.clone(),
        entry.content.clone(),
    )
    .await;

    let body = match rewritten {
        Ok(code) => code.into_bytes(),
        Err(e) => {
            // A faulty transform degrades to the original body rather
            // than an opaque server failure.
            warn!(%public_path, error = %e, "rewrite failed, serving original body");
            entry.content.clone()
        }
    };

    ctx.rewrite_cache.put(cache_key.clone(), body.clone());
    trace!(%public_path, key = %cache_key, "rewrite cache populated");

    Ok(build_response(
        StatusCode::OK,
        &entry.etag,
        "application/javascript; charset=utf-8",
        Some(body),
        Some(last_modified),
    ))
}

/// Parsing is CPU-bound and synchronous (swc has no async entry point), so
/// it runs on the blocking pool rather than stalling the executor.
async fn rewrite_blocking(
    ctx: ServerContext,
    abs_path: PathBuf,
    clean_id: String,
    content: Vec<u8>,
) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let source = String::from_utf8_lossy(&content).into_owned();
        loom_core::rewrite_module(&ctx.resolver, &ctx.graph, &abs_path, &clean_id, &source)
            .map(|r| r.code)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
    .map_err(AppError::from)
}

fn mime_for(public_path: &str) -> &'static str {
    match public_path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

fn build_response(
    status: StatusCode,
    etag: &str,
    content_type: &str,
    body: Option<Vec<u8>>,
    last_modified_millis: Option<i64>,
) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(axum::http::header::ETAG, format!("\"{etag}\""))
        .header(axum::http::header::CACHE_CONTROL, "no-cache")
        .header(axum::http::header::CONTENT_TYPE, content_type);

    if let Some(millis) = last_modified_millis {
        let time = UNIX_EPOCH + Duration::from_millis(millis.max(0) as u64);
        builder = builder.header(axum::http::header::LAST_MODIFIED, httpdate::fmt_http_date(time));
    }

    match body {
        Some(body) => builder.body(axum::body::Body::from(body)).unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hmr_refetch_query() {
        assert!(is_hmr_refetch(&Some("t=123".to_string())));
        assert!(is_hmr_refetch(&Some("import=1&t=123".to_string())));
        assert!(!is_hmr_refetch(&Some("import=1".to_string())));
        assert!(!is_hmr_refetch(&None));
    }

    #[test]
    fn mime_for_known_and_unknown_extensions() {
        assert_eq!(mime_for("/a.css"), "text/css; charset=utf-8");
        assert_eq!(mime_for("/a.json"), "application/json; charset=utf-8");
        assert_eq!(mime_for("/a.bin"), "application/octet-stream");
    }
}
