//! Bare-module resolver plugin (`/@modules/<pkg>[/<subpath>]`): resolves
//! an npm package id to its installed entry file and serves it through the
//! same rewrite pipeline as project source.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::plugins::module_rewrite::{is_hmr_refetch, serve_resolved};
use crate::ServerContext;

pub fn register(router: Router<ServerContext>, _ctx: &ServerContext) -> Router<ServerContext> {
    router.route("/@modules/*pkg", get(handle))
}

async fn handle(
    State(ctx): State<ServerContext>,
    Path(pkg): Path<String>,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let abs_path = ctx.resolver.resolve_bare(&pkg)?;
    let public_path = format!("/@modules/{pkg}");

    let if_none_match = headers
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    serve_resolved(&ctx, &abs_path, &public_path, if_none_match, is_hmr_refetch(&query))
        .await
        .map(IntoResponse::into_response)
}
