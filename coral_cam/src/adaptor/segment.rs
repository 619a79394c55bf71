//! Semantic segmentation drawn as a colored overlay.
use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use lazy_static::lazy_static;
use ndarray::{Array2, ArrayView3, Axis};
use tract_onnx::prelude::Tensor;

use super::{output, values};
use crate::draw::create_pascal_label_colormap;

lazy_static! {
    static ref COLORMAP: Vec<Rgb<u8>> = create_pascal_label_colormap();
}

/// Decode the class of every pixel at model resolution.
///
/// The first output is either a class map `[1, H, W]` or per-class scores `[1, H, W, C]`.
pub fn decode(outputs: &[Tensor]) -> Result<Array2<usize>> {
    let tensor = output(outputs, 0)?;
    let raw = values(tensor)?;

    let (height, width, classes) = match *tensor.shape() {
        [height, width] | [1, height, width] => (height, width, 1),
        [1, height, width, classes] => (height, width, classes),
        ref shape => bail!("unexpected segmentation output shape {:?}", shape),
    };

    if classes <= 1 {
        return Ok(Array2::from_shape_vec(
            (height, width),
            raw.iter().map(|class| *class as usize).collect(),
        )?);
    }

    let scores = ArrayView3::from_shape((height, width, classes), &raw[..])?;
    Ok(scores.map_axis(Axis(2), |pixel| {
        pixel
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(class, _)| class)
            .unwrap_or(0)
    }))
}

/// Blend the class colors over the frame, the background class 0 is left untouched.
///
/// Returns the number of distinct classes drawn.
pub fn draw(frame: &mut RgbImage, class_map: &Array2<usize>) -> usize {
    let (map_height, map_width) = class_map.dim();
    if map_height == 0 || map_width == 0 {
        return 0;
    }

    let (width, height) = frame.dimensions();
    let mut seen = [false; 256];

    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        // Nearest neighbour lookup in the class map
        let map_y = y as usize * map_height / height as usize;
        let map_x = x as usize * map_width / width as usize;
        let class = class_map[[map_y, map_x]];
        if class == 0 {
            continue;
        }

        let color = COLORMAP[class % COLORMAP.len()];
        seen[class % COLORMAP.len()] = true;
        for (value, overlay) in pixel.0.iter_mut().zip(color.0) {
            *value = ((*value as u16 + overlay as u16) / 2) as u8;
        }
    }

    seen.iter().filter(|seen| **seen).count()
}
