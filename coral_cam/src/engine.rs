//! Camera and inference engine session.
//!
//! A `CamEngine` owns the capture function and the currently loaded model. It is owned by
//! the frame loop, changes of mode or model are applied between two frames.
use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};

use crate::{
    adaptor,
    draw::{self, CORAL, INFO_SCALE},
    labels::LabelTables,
    meter::METER,
    nn::{InferModel, TractModel},
    registry::{ModelRegistry, ModelSpec},
    sensors::CaptureFn,
    InferenceMode,
};

/// Description of the active engine, reported to the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineInfo {
    pub mode: InferenceMode,
    pub model: String,
    pub accelerator: bool,
    /// Model input size as `WxH`.
    pub input_size: String,
}

struct EngineState {
    spec: &'static ModelSpec,
    model_path: PathBuf,
    use_accelerator: bool,
    model: Box<dyn InferModel>,
    model_size: String,
}

impl EngineState {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            mode: self.spec.mode,
            model: self.spec.name.to_owned(),
            accelerator: self.use_accelerator,
            input_size: self.model_size.clone(),
        }
    }
}

pub struct CamEngine {
    capture: CaptureFn,
    registry: ModelRegistry,
    labels: Arc<LabelTables>,
    jpeg_quality: i32,
    state: Option<EngineState>,
}

impl CamEngine {
    pub fn new(
        capture: CaptureFn,
        registry: ModelRegistry,
        labels: Arc<LabelTables>,
        jpeg_quality: i32,
    ) -> Self {
        Self {
            capture,
            registry,
            labels,
            jpeg_quality,
            state: None,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Mode of the active engine, `None` before the first successful `set_engine`.
    pub fn mode(&self) -> Option<InferenceMode> {
        self.state.as_ref().map(|state| state.spec.mode)
    }

    pub fn info(&self) -> Option<EngineInfo> {
        self.state.as_ref().map(EngineState::info)
    }

    /// Switch inference mode and load the named model.
    ///
    /// The previous engine stays active if the model cannot be loaded.
    pub fn set_engine(
        &mut self,
        mode: InferenceMode,
        model_name: &str,
        use_accelerator: bool,
    ) -> Result<EngineInfo> {
        let spec = match self.registry.get(model_name) {
            Some(spec) => spec,
            None => bail!("unknown model {model_name}"),
        };
        if spec.mode != mode {
            bail!("model {} does not support {}", model_name, mode);
        }

        let model_path = self.registry.path_of(spec);
        log::info!(
            "Mode: {mode}, model name: {model_name}, model path: {}, accelerator: {use_accelerator}",
            model_path.display()
        );

        let model = TractModel::load(&model_path, spec.input_size, use_accelerator)?;

        Ok(self.install(spec, model_path, use_accelerator, Box::new(model)))
    }

    /// Make an already loaded model the active engine.
    pub fn install(
        &mut self,
        spec: &'static ModelSpec,
        model_path: PathBuf,
        use_accelerator: bool,
        model: Box<dyn InferModel>,
    ) -> EngineInfo {
        let (width, height) = model.input_size();
        let state = EngineState {
            spec,
            model_path,
            use_accelerator,
            model,
            model_size: format!("{width}x{height}"),
        };
        let info = state.info();
        self.state = Some(state);

        info
    }

    /// Capture, annotate and encode the next frame.
    ///
    /// Returns `None` if no frame could be captured or decoded, callers simply try again.
    pub fn get_frame(&self) -> Option<Vec<u8>> {
        let data = match (self.capture)() {
            Some(data) => data,
            None => {
                METER.tick_dropped();
                return None;
            }
        };
        METER.tick_captured();

        let mut frame: RgbImage = match turbojpeg::decompress_image::<Rgb<u8>>(&data) {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("Skipping undecodable frame: {err}");
                METER.tick_dropped();
                return None;
            }
        };

        self.process(&mut frame);

        match turbojpeg::compress_image(&frame, self.jpeg_quality, turbojpeg::Subsamp::Sub2x2) {
            Ok(buf) => Some(buf.to_vec()),
            Err(err) => {
                log::warn!("Failed to encode frame: {err}");
                None
            }
        }
    }

    /// Run the active engine on the frame and draw results and model information.
    ///
    /// Inference errors leave the frame without annotations.
    pub fn process(&self, frame: &mut RgbImage) {
        let state = match &self.state {
            Some(state) => state,
            None => return,
        };

        match adaptor::annotate(state.spec, state.model.as_ref(), &self.labels, frame) {
            Ok(num_results) => {
                METER.tick_infered();
                log::trace!("Drew {num_results} results");
            }
            Err(err) => log::warn!("Inference with {} failed: {err:#}", state.spec.name),
        }

        add_model_info(frame, state);
    }
}

/// Write the model file name and its input size into the top left corner.
fn add_model_info(frame: &mut RgbImage, state: &EngineState) {
    let model_name = state
        .model_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| state.spec.name.to_owned());

    let (_, name_height) = draw::measure(&model_name, INFO_SCALE);
    draw::text(frame, &model_name, 10, 5, INFO_SCALE, CORAL);
    draw::text(
        frame,
        &state.model_size,
        10,
        5 + name_height + 5,
        INFO_SCALE,
        CORAL,
    );
}
