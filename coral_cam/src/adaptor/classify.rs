//! Classification: top class of the whole frame.
use anyhow::{bail, Result};
use image::RgbImage;
use tract_onnx::prelude::Tensor;

use super::{dequantized, output};
use crate::{
    draw::{self, CORAL, LABEL_SCALE},
    labels::LabelTables,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub class: usize,
    pub score: f32,
}

/// Pick the most likely class from the squeezed scores of the first output.
pub fn decode(outputs: &[Tensor]) -> Result<Classification> {
    let scores = dequantized(output(outputs, 0)?)?;

    match scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        Some((class, score)) => Ok(Classification {
            class,
            score: *score,
        }),
        None => bail!("classification output is empty"),
    }
}

/// Write class and score into the top right corner.
pub fn draw(frame: &mut RgbImage, classification: &Classification, labels: &LabelTables) {
    let class_label = format!(
        "class: {}",
        labels.classification_class(classification.class)
    );
    let (label_width, label_height) = draw::measure(&class_label, LABEL_SCALE);
    let x = frame.width() as i32 - (label_width + 30);
    let y = 5;
    draw::text(frame, &class_label, x, y, LABEL_SCALE, CORAL);

    let score_text = score_label(classification.score);
    draw::text(
        frame,
        &score_text,
        x,
        y + label_height + 5,
        LABEL_SCALE,
        CORAL,
    );
}

/// Score line with the unrounded dequantized score.
fn score_label(score: f32) -> String {
    format!("score: {score}")
}
