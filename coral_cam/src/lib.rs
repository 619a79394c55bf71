//! Run a selectable inference pass on a live webcam stream and show it in the browser.
pub mod adaptor;
pub mod bridge;
pub mod draw;
pub mod engine;
pub mod labels;
pub mod meter;
pub mod nn;
pub mod registry;
pub mod sensors;

pub use common::protocol::InferenceMode;

/// Capture width requested from the camera.
pub const FRAME_WIDTH: u32 = 1280;
/// Capture height requested from the camera.
pub const FRAME_HEIGHT: u32 = 720;
