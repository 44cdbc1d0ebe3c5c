//! HMR WebSocket plugin: the transport half of the HMR
//! propagator. Every connection subscribes to the context's broadcast
//! channel and forwards `HmrMessage`s as JSON text frames until the client
//! disconnects.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, trace};

use crate::ServerContext;

const CLIENT_SCRIPT: &str = include_str!("hmr_client.js");

pub fn register(router: Router<ServerContext>, _ctx: &ServerContext) -> Router<ServerContext> {
    router
        .route("/__hmr", get(upgrade))
        .route("/@hmr-client", get(serve_client))
}

async fn serve_client() -> impl IntoResponse {
    ([(axum::http::header::CONTENT_TYPE, "application/javascript; charset=utf-8")], CLIENT_SCRIPT)
}

async fn upgrade(ws: WebSocketUpgrade, State(ctx): State<ServerContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: ServerContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = ctx.hmr_tx.subscribe();

    info!("hmr client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text == "ping" => {
                        if sender.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(message) => {
                        let json = serde_json::to_string(&message).unwrap_or_default();
                        trace!(%json, "broadcasting hmr update");
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!(skipped, "hmr client lagged, continuing");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("hmr client disconnected");
}
