//! Inference runtime.
//!
//! The models are opaque to the rest of the crate: an `InferModel` takes a frame and returns the
//! raw output tensors, decoding them is up to the `adaptor` module.
use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded model which can be invoked on frames.
pub trait InferModel: Send {
    /// Width and height of the model input.
    fn input_size(&self) -> (u32, u32);

    /// Set the frame as input, invoke the model and return all output tensors.
    fn run(&self, frame: &RgbImage) -> Result<Vec<Tensor>>;
}

/// ONNX model executed by `tract`.
pub struct TractModel {
    model: NnModel,
    width: u32,
    height: u32,
}

impl TractModel {
    /// Load a model with a `u8 [1, height, width, 3]` input.
    ///
    /// With `use_accelerator`, the graph is compiled into the optimized plan with fused kernels.
    /// Otherwise only decluttered and run with the reference operators.
    pub fn load(path: &Path, input_size: (u32, u32), use_accelerator: bool) -> Result<Self> {
        let (width, height) = input_size;
        let input_fact = InferenceFact::dt_shape(
            u8::datum_type(),
            tvec!(1, height as usize, width as usize, 3),
        );

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read model {}", path.display()))?
            .with_input_fact(0, input_fact)?;

        let model = match use_accelerator {
            true => model.into_optimized()?.into_runnable()?,
            false => model.into_typed()?.into_decluttered()?.into_runnable()?,
        };

        Ok(Self {
            model,
            width,
            height,
        })
    }
}

impl InferModel for TractModel {
    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn run(&self, frame: &RgbImage) -> Result<Vec<Tensor>> {
        let input = preproc(frame, self.input_size());
        let outputs = self.model.run(tvec!(input.into()))?;

        Ok(outputs.iter().map(|output| (**output).clone()).collect())
    }
}

/// Resize a frame to the model input size and expand it to a `[1, height, width, 3]` tensor.
pub fn preproc(frame: &RgbImage, (width, height): (u32, u32)) -> Tensor {
    let resized: RgbImage =
        image::imageops::resize(frame, width, height, image::imageops::FilterType::Triangle);

    tract_ndarray::Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| resized[(x as _, y as _)][c],
    )
    .into()
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    #[test]
    fn preproc_keeps_channels_in_hwc_order() -> Result<()> {
        let frame = RgbImage::from_pixel(64, 32, Rgb([10, 20, 30]));
        let tensor = preproc(&frame, (16, 8));

        assert_eq!(tensor.shape(), &[1, 8, 16, 3]);
        assert_eq!(tensor.datum_type(), u8::datum_type());

        let view = tensor.to_array_view::<u8>()?;
        assert_eq!(view[[0, 7, 15, 0]], 10);
        assert_eq!(view[[0, 7, 15, 1]], 20);
        assert_eq!(view[[0, 0, 0, 2]], 30);

        Ok(())
    }

    /// Single `Cast` node from the u8 frame to f32 values.
    const CAST_MODEL: &str = "test_data/cast_u8_to_f32.onnx";

    #[test]
    fn runs_with_both_plans() -> Result<()> {
        let frame = RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]));

        for use_accelerator in [true, false] {
            let model = TractModel::load(Path::new(CAST_MODEL), (16, 12), use_accelerator)?;
            assert_eq!(model.input_size(), (16, 12));

            let outputs = model.run(&frame)?;
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].shape(), &[1, 12, 16, 3]);
            assert_eq!(outputs[0].datum_type(), f32::datum_type());

            let values = outputs[0].to_array_view::<f32>()?;
            assert_eq!(values[[0, 0, 0, 0]], 10.0);
            assert_eq!(values[[0, 11, 15, 1]], 20.0);
            assert_eq!(values[[0, 5, 7, 2]], 30.0);
        }

        Ok(())
    }

    #[test]
    fn missing_model_file() {
        let result = TractModel::load(Path::new("test_data/missing.onnx"), (224, 224), true);
        assert!(result.is_err());
    }
}
