//! HTML entry-point plugin: serves `index.html` for
//! the root route and any other extensionless (SPA) route, injecting a
//! `<script>` tag that opens the `/__hmr` WebSocket before any other script
//! on the page runs.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::ServerContext;

pub fn register(router: Router<ServerContext>, _ctx: &ServerContext) -> Router<ServerContext> {
    router.route("/", get(serve_index))
}

async fn serve_index(State(ctx): State<ServerContext>) -> Response {
    let index_path = ctx.config.root.join("index.html");

    match tokio::fs::read_to_string(&index_path).await {
        Ok(html) => Html(inject_hmr_client(&html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "index.html not found").into_response(),
    }
}

fn inject_hmr_client(html: &str) -> String {
    let script = "<script type=\"module\" src=\"/@hmr-client\"></script>\n";
    match html.find("<head>") {
        Some(pos) => {
            let insert_at = pos + "<head>".len();
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..insert_at]);
            out.push('\n');
            out.push_str(script);
            out.push_str(&html[insert_at..]);
            out
        }
        None => format!("{script}{html}"),
    }
}
