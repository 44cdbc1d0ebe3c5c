//! Watcher & invalidation: a recursive filesystem watcher over the
//! project root, excluding `node_modules` and `.git`. On every debounced
//! batch, each changed path is read through the file cache (refreshing its
//! mtime), its rewrite-cache entries are evicted by `cleanId` prefix, and
//! the event is handed to the HMR propagator for a broadcast.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use loom_core::HmrMessage;
use loom_server::ServerContext;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use tracing::{info, trace, warn};

const IGNORED_DIRS: &[&str] = &["node_modules", ".git"];
const DEBOUNCE_MS: u64 = 50;

/// Starts the watcher on a background thread and returns the `Debouncer`
/// handle — dropping it stops the watch (mirrors `notify`'s own lifetime
/// contract, so the caller keeps it alive for the server's lifetime).
pub fn spawn(ctx: ServerContext) -> notify::Result<Debouncer<notify::RecommendedWatcher>> {
    let root = ctx.config.root.clone();

    let mut debouncer = new_debouncer(
        Duration::from_millis(DEBOUNCE_MS),
        move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
            match result {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }
                        if !should_watch(&event.path) {
                            continue;
                        }
                        handle_path_event(&ctx, &event.path);
                    }
                }
                Err(e) => warn!(error = %e, "watcher error"),
            }
        },
    )?;

    debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching for changes");

    Ok(debouncer)
}

fn should_watch(path: &Path) -> bool {
    !path.components().any(|c| match c {
        std::path::Component::Normal(name) => {
            IGNORED_DIRS.contains(&name.to_string_lossy().as_ref())
        }
        _ => false,
    })
}

fn handle_path_event(ctx: &ServerContext, abs_path: &Path) {
    let public_path = ctx.resolver.file_to_request(abs_path);
    let clean_id = loom_core::clean_url(&public_path).to_string();

    if !abs_path.exists() {
        handle_unlink(ctx, abs_path, &clean_id);
        return;
    }

    trace!(%clean_id, "file changed");

    // Refresh the file cache so the next request sees the new mtime/etag.
    if let Err(e) = ctx.file_cache.read(abs_path) {
        warn!(%clean_id, error = %e, "failed to re-read changed file");
        return;
    }

    ctx.rewrite_cache.evict_prefix(&clean_id);

    let timestamp = ctx.graph.next_timestamp(now_millis());
    let message = loom_core::propagate(&ctx.graph, &clean_id, timestamp);
    broadcast(ctx, message);
}

fn handle_unlink(ctx: &ServerContext, abs_path: &Path, clean_id: &str) {
    info!(%clean_id, "file removed");
    ctx.file_cache.evict(abs_path);
    ctx.rewrite_cache.evict_prefix(clean_id);
    ctx.graph.clear_importees(clean_id);

    let timestamp = ctx.graph.next_timestamp(now_millis());
    let message = loom_core::propagate(&ctx.graph, clean_id, timestamp);
    broadcast(ctx, message);
}

fn broadcast(ctx: &ServerContext, message: HmrMessage) {
    match &message {
        HmrMessage::Update { updates, .. } => {
            info!(count = updates.len(), "hmr update");
        }
        HmrMessage::FullReload { path, .. } => {
            info!(%path, "hmr full reload");
        }
    }
    let _ = ctx.hmr_tx.send(message);
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ignores_node_modules_and_git() {
        assert!(!should_watch(&PathBuf::from("/proj/node_modules/lodash/index.js")));
        assert!(!should_watch(&PathBuf::from("/proj/.git/HEAD")));
        assert!(should_watch(&PathBuf::from("/proj/src/main.js")));
    }
}
