//! Env module plugin: serves the synthetic module that
//! `rewrite::ENV_PREAMBLE` imports for files referencing `import.meta.env`.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::ServerContext;

pub fn register(router: Router<ServerContext>, _ctx: &ServerContext) -> Router<ServerContext> {
    router.route(loom_core::ENV_PUBLIC_PATH, get(serve))
}

async fn serve(axum::extract::State(ctx): axum::extract::State<ServerContext>) -> impl IntoResponse {
    let body = format!(
        "export default {{ MODE: \"development\", BASE_URL: \"/\", HOST: \"{}\", PORT: {} }};\n",
        ctx.config.host, ctx.config.port
    );
    (
        [(axum::http::header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        body,
    )
}
