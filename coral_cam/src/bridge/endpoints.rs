//! Endpoints of HTTP server.
//!
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::header,
    response::{Html, IntoResponse},
    Extension,
};
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::{feed::EngineCmd, BridgeState};

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../web/index.html"))
}

pub async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        include_str!("../../web/script.js"),
    )
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut messages = BroadcastStream::new(state.subscribe());

    log::info!("UI connected");

    // The UI asks for the catalog itself once it is connected
    state.send_cmd(EngineCmd::ReportEngine).await.ok();

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = state.handle_event(&text).await {
                        match reply.to_json() {
                            Ok(json) => {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => log::error!("Failed to serialize reply: {err}"),
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::warn!("Websocket receive error: {err}");
                    break;
                }
            },
            msg = messages.next() => match msg {
                Some(Ok(json)) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                // Slow UIs skip frames
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    log::debug!("UI lagged by {skipped} messages")
                }
                None => break,
            },
        }
    }

    log::info!("UI disconnected");
}
