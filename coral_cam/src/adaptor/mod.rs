//! Inference adaptor.
//!
//! Maps every inference mode to the same sequence: invoke the model on the frame, decode the raw
//! output tensors and draw the result onto the frame. The adaptor keeps no state between frames.
use anyhow::{anyhow, bail, Result};
use image::RgbImage;
use tract_onnx::prelude::{Datum, Tensor};

use crate::{labels::LabelTables, nn::InferModel, registry::ModelSpec, InferenceMode};

pub mod classify;
pub mod detect;
pub mod pose;
pub mod segment;

/// Minimum confidence of detections and poses to be drawn.
pub const SCORE_THRESHOLD: f32 = 0.5;

/// Run one inference pass and draw its result onto the frame.
///
/// Returns the number of drawn results.
pub fn annotate(
    spec: &ModelSpec,
    model: &dyn InferModel,
    labels: &LabelTables,
    frame: &mut RgbImage,
) -> Result<usize> {
    let outputs = model.run(frame)?;
    let (width, height) = frame.dimensions();

    let drawn = match spec.mode {
        InferenceMode::Classification => {
            let classification = classify::decode(&outputs)?;
            classify::draw(frame, &classification, labels);
            1
        }
        InferenceMode::Detection => {
            let detections = detect::decode(&outputs, width, height)?;
            detect::draw(frame, &detections, labels);
            detections.len()
        }
        InferenceMode::PoseEstimation => {
            let layout = spec
                .pose_layout
                .ok_or_else(|| anyhow!("model {} has no pose layout", spec.name))?;
            let poses = pose::decode(&outputs, layout, width, height)?;
            pose::draw(frame, &poses);
            poses.len()
        }
        InferenceMode::Segmentation => {
            let class_map = segment::decode(&outputs)?;
            segment::draw(frame, &class_map)
        }
    };

    Ok(drawn)
}

/// Get an output tensor by position.
fn output(outputs: &[Tensor], index: usize) -> Result<&Tensor> {
    outputs
        .get(index)
        .ok_or_else(|| anyhow!("model has {} outputs, expected output {index}", outputs.len()))
}

/// All values of a tensor as `f32`.
fn values(tensor: &Tensor) -> Result<Vec<f32>> {
    Ok(tensor.cast_to::<f32>()?.as_slice::<f32>()?.to_vec())
}

/// Values of a tensor as `f32`, dequantized if the tensor holds `u8`.
///
/// Plain `u8` outputs carry the softmax quantization with scale 1/256 and zero point 0.
fn dequantized(tensor: &Tensor) -> Result<Vec<f32>> {
    let datum_type = tensor.datum_type();
    if datum_type.unquantized() != u8::datum_type() {
        return values(tensor);
    }

    let (zero_point, scale) = datum_type
        .qparams()
        .map(|qparams| qparams.zp_scale())
        .unwrap_or((0, 1.0 / 256.0));

    let raw = tensor.as_slice::<u8>()?;
    if raw.is_empty() {
        bail!("empty output tensor");
    }

    Ok(raw
        .iter()
        .map(|q| scale * (*q as i32 - zero_point) as f32)
        .collect())
}
