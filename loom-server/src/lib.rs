//! Plugin pipeline: wires the loom-core primitives into a single axum
//! `Router` built from an ordered list of plugin functions, each one
//! attaching its own routes to the project's `ServerContext`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod plugins;

use std::sync::Arc;

use axum::Router;
use loom_core::{FileCache, ImportGraph, Resolver, RewriteCache};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use config::ProjectConfig;
pub use error::AppError;

/// The shared handle injected into every middleware and watcher callback.
/// Every field is cheap to clone (`Arc`, concurrent maps, or a channel
/// handle) so the context can be handed to any number of async tasks
/// without locking the whole server.
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<ProjectConfig>,
    pub file_cache: Arc<FileCache>,
    pub rewrite_cache: Arc<RewriteCache>,
    pub graph: Arc<ImportGraph>,
    pub resolver: Arc<Resolver>,
    pub hmr_tx: broadcast::Sender<loom_core::HmrMessage>,
}

impl ServerContext {
    pub fn new(config: ProjectConfig) -> Self {
        let aliases = config.aliases.iter().cloned().map(Into::into).collect();
        let resolver = Resolver::new(config.root.clone()).with_aliases(aliases);
        let (hmr_tx, _rx) = broadcast::channel(256);

        Self {
            file_cache: Arc::new(FileCache::new(config.file_cache_capacity)),
            rewrite_cache: Arc::new(RewriteCache::new(config.rewrite_cache_capacity)),
            graph: Arc::new(ImportGraph::new()),
            resolver: Arc::new(resolver),
            config: Arc::new(config),
            hmr_tx,
        }
    }
}

/// A registered plugin: synchronously attaches routes/middlewares to the
/// router being built.
pub type Plugin = fn(Router<ServerContext>, &ServerContext) -> Router<ServerContext>;

/// Default pipeline order: module rewriter and bare-module resolver ahead
/// of the HMR websocket and the static-file fallback.
pub fn default_plugins() -> Vec<Plugin> {
    vec![
        plugins::hmr_ws::register,
        plugins::env::register,
        plugins::modules::register,
        plugins::module_rewrite::register,
        plugins::static_files::register,
    ]
}

pub fn build_router(ctx: &ServerContext, plugins: &[Plugin]) -> Router {
    let mut router = Router::new();
    for plugin in plugins {
        router = plugin(router, ctx);
    }

    if ctx.config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(middleware::ServerTimeLayer)
        .with_state(ctx.clone())
}

pub async fn start_server(ctx: ServerContext, plugins: &[Plugin]) -> anyhow::Result<()> {
    let addr = format!("{}:{}", ctx.config.host, ctx.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);

    let app = build_router(&ctx, plugins);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> ServerContext {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.js"), "export default 1;\n").unwrap();
        let dir = Box::leak(Box::new(dir));
        ServerContext::new(ProjectConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn context_clone_shares_graph() {
        let ctx = test_context();
        let clone = ctx.clone();
        ctx.graph.mark_self_accepting("/main.js");
        assert!(clone.graph.is_self_accepting("/main.js"));
    }
}
