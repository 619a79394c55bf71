//! Websocket bridge between the frame loop and the browser UI.
//!
//! The frame loop publishes serialized `BridgeMsg`s on a broadcast channel which every
//! websocket forwards to its UI. `UiEvent`s from the UIs reach the frame loop as `EngineCmd`s.
use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use common::protocol::{BridgeMsg, ModelEntry, UiEvent};
use tokio::sync::{broadcast, mpsc};

mod endpoints;
mod feed;

pub use endpoints::{healthcheck, index, script, ws_handler};
pub use feed::{spawn_frame_loop, EngineCmd, FrameFeed, Tick};

use crate::engine::CamEngine;

/// Messages buffered per UI before it starts skipping.
pub const MSG_CHANNEL_CAPACITY: usize = 4;
const CMD_CHANNEL_CAPACITY: usize = 16;

/// State shared by all websocket connections.
pub struct BridgeState {
    cmd_tx: mpsc::Sender<EngineCmd>,
    msg_tx: broadcast::Sender<String>,
    catalog: Vec<ModelEntry>,
}

impl BridgeState {
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.msg_tx.subscribe()
    }

    pub fn catalog_msg(&self) -> BridgeMsg {
        BridgeMsg::Catalog {
            models: self.catalog.clone(),
        }
    }

    pub async fn send_cmd(&self, cmd: EngineCmd) -> anyhow::Result<()> {
        self.cmd_tx.send(cmd).await?;
        Ok(())
    }

    /// Handle a text message of a UI, returns the reply for this UI only.
    pub async fn handle_event(&self, text: &str) -> Option<BridgeMsg> {
        match UiEvent::from_json(text) {
            Ok(UiEvent::SetEngine {
                mode,
                model,
                accelerator,
            }) => {
                log::info!("UI requested {model} for {mode}");
                let cmd = EngineCmd::SetEngine {
                    mode,
                    model,
                    accelerator,
                };
                match self.send_cmd(cmd).await {
                    Ok(()) => None,
                    Err(_) => Some(BridgeMsg::error("Frame loop is not running")),
                }
            }
            Ok(UiEvent::RequestCatalog) => Some(self.catalog_msg()),
            Err(err) => {
                log::warn!("Invalid message from UI: {err}");
                Some(BridgeMsg::error(format!("Invalid message: {err}")))
            }
        }
    }
}

/// Wire the engine into a frame loop and the state shared with the endpoints.
pub fn bridge(engine: CamEngine) -> (FrameFeed, Arc<BridgeState>) {
    let catalog = engine.registry().catalog();
    let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
    let (msg_tx, _) = broadcast::channel(MSG_CHANNEL_CAPACITY);

    let state = BridgeState {
        cmd_tx,
        msg_tx: msg_tx.clone(),
        catalog,
    };

    (FrameFeed::new(engine, cmd_rx, msg_tx), Arc::new(state))
}

/// HTTP server with the UI pages and the websocket.
pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/script.js", get(script))
        .route("/healthcheck", get(healthcheck))
        .route("/ws", get(ws_handler))
        .layer(Extension(state))
}

#[cfg(test)]
mod test {

    use common::protocol::LogLevel;

    use super::*;
    use crate::{labels::LabelTables, registry::ModelRegistry, InferenceMode};

    fn test_bridge() -> (FrameFeed, Arc<BridgeState>) {
        let engine = CamEngine::new(
            Box::new(|| None),
            ModelRegistry::new("test_data"),
            Arc::new(LabelTables::default()),
            80,
        );
        bridge(engine)
    }

    #[tokio::test]
    async fn catalog_on_request() {
        let (_feed, state) = test_bridge();

        let reply = state.handle_event(r#"{"type":"request_catalog"}"#).await;
        match reply {
            Some(BridgeMsg::Catalog { models }) => {
                assert_eq!(models, ModelRegistry::new("test_data").catalog())
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_engine_is_forwarded() {
        let (_feed, state) = test_bridge();
        let (cmd_tx, mut cmd_rx) = mpsc::channel(1);
        let state = BridgeState {
            cmd_tx,
            msg_tx: state.msg_tx.clone(),
            catalog: Vec::new(),
        };

        let reply = state
            .handle_event(
                r#"{"type":"set_engine","mode":"segmentation","model":"DeepLab V3 MobileNet V2"}"#,
            )
            .await;
        assert_eq!(reply, None);
        assert_eq!(
            cmd_rx.recv().await,
            Some(EngineCmd::SetEngine {
                mode: InferenceMode::Segmentation,
                model: "DeepLab V3 MobileNet V2".into(),
                accelerator: false,
            })
        );
    }

    #[tokio::test]
    async fn invalid_messages_are_answered() {
        let (_feed, state) = test_bridge();

        for text in ["no json", r#"{"type":"reboot"}"#, r#"{"type":"set_engine"}"#] {
            match state.handle_event(text).await {
                Some(BridgeMsg::Log { level, .. }) => assert_eq!(level, LogLevel::Error),
                other => panic!("unexpected reply {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn stopped_frame_loop_is_reported() {
        let (feed, state) = test_bridge();
        drop(feed);

        let reply = state
            .handle_event(r#"{"type":"set_engine","mode":"detection","model":"SSD MobileNet V1"}"#)
            .await;
        assert!(matches!(reply, Some(BridgeMsg::Log { .. })));
    }

    #[tokio::test]
    async fn healthy() {
        assert_eq!(healthcheck().await, "healthy");
    }
}
