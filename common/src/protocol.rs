//! Protocol definition for the websocket bridge.
//!
//! Every message is a JSON object with a `type` tag. The browser sends
//! `UiEvent`s, the server answers with `BridgeMsg`s.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of inference pass run on every frame.
///
/// The serialized names match the values of the inference selector in the UI.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InferenceMode {
    Classification,
    Detection,
    PoseEstimation,
    Segmentation,
}

impl InferenceMode {
    pub const ALL: [InferenceMode; 4] = [
        InferenceMode::Classification,
        InferenceMode::Detection,
        InferenceMode::PoseEstimation,
        InferenceMode::Segmentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceMode::Classification => "classification",
            InferenceMode::Detection => "detection",
            InferenceMode::PoseEstimation => "pose-estimation",
            InferenceMode::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InferenceMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown inference mode {s}"))
    }
}

/// Messages sent from the browser to the server.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Switch inference mode and model.
    SetEngine {
        mode: InferenceMode,
        model: String,
        #[serde(default)]
        accelerator: bool,
    },
    /// Ask for the model catalog again.
    RequestCatalog,
}

/// Messages sent from the server to the browser.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMsg {
    /// Base64 encoded JPEG frame.
    Frame { data: String },
    /// Models the UI can choose from.
    Catalog { models: Vec<ModelEntry> },
    /// The engine was switched successfully.
    EngineChanged {
        mode: InferenceMode,
        model: String,
        accelerator: bool,
        input_size: String,
    },
    /// Log line to show in the UI.
    Log { level: LogLevel, message: String },
}

/// Catalog entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub mode: InferenceMode,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl UiEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl BridgeMsg {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn error(message: impl Into<String>) -> Self {
        BridgeMsg::Log {
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}
