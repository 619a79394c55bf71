//! Object detection with SSD style post-processed outputs.
//!
//! Outputs 0, 1 and 2 hold the boxes as normalized `[ymin, xmin, ymax, xmax]`, the class indices
//! and the scores of every candidate.
use anyhow::Result;
use image::RgbImage;
use tract_onnx::prelude::Tensor;

use super::{output, values, SCORE_THRESHOLD};
use crate::{
    draw::{self, CORAL, LABEL_SCALE, WHITE},
    labels::LabelTables,
};

/// Box in pixel coordinates of the frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: usize,
    pub score: f32,
}

/// Decode all candidates with `SCORE_THRESHOLD < score < 1.0` for a frame of the given size.
pub fn decode(outputs: &[Tensor], width: u32, height: u32) -> Result<Vec<Detection>> {
    let boxes = values(output(outputs, 0)?)?;
    let classes = values(output(outputs, 1)?)?;
    let scores = values(output(outputs, 2)?)?;

    let (width, height) = (width as f32, height as f32);

    let detections = boxes
        .chunks_exact(4)
        .zip(classes.iter())
        .zip(scores.iter())
        .filter(|(_, score)| SCORE_THRESHOLD < **score && **score < 1.0)
        .map(|((bbox, class), score)| {
            // The model can return coordinates outside of the image, keep them inside.
            let bbox = BoundingBox {
                y_min: f32::max(1.0, bbox[0] * height) as i32,
                x_min: f32::max(1.0, bbox[1] * width) as i32,
                y_max: f32::min(height, bbox[2] * height) as i32,
                x_max: f32::min(width, bbox[3] * width) as i32,
            };
            Detection {
                bbox,
                class: *class as usize,
                score: *score,
            }
        })
        .collect();

    Ok(detections)
}

/// Draw boxes with class name and confidence.
pub fn draw(frame: &mut RgbImage, detections: &[Detection], labels: &LabelTables) {
    for detection in detections {
        let bbox = detection.bbox;
        draw::thick_rect(
            frame,
            (bbox.x_min, bbox.y_min),
            (bbox.x_max, bbox.y_max),
            4,
            CORAL,
        );

        let label = format!(
            "{}: {}%",
            labels.detection_class(detection.class),
            (detection.score * 100.0) as i32
        );
        let (_, label_height) = draw::measure(&label, LABEL_SCALE);
        // Do not draw the label too close to the top of the frame
        let label_y = i32::max(bbox.y_min, label_height + 10);
        draw::boxed_text(
            frame,
            &label,
            bbox.x_min,
            label_y - label_height - 10,
            LABEL_SCALE,
            CORAL,
            WHITE,
        );
    }
}
