//! Registry of the models selectable in the UI.
//!
//! Maps display names to model files below the model directory. All models take a single
//! `u8 [1, height, width, 3]` input.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use common::protocol::{
    InferenceMode::{Classification, Detection, Segmentation},
    ModelEntry,
};

use crate::InferenceMode;

/// Layout of the first output tensor of pose models.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoseLayout {
    /// `[1, 1, 17, 3]` with `(y, x, score)` per keypoint.
    SinglePose,
    /// `[1, N, 56]`: 17 keypoints, `[ymin, xmin, ymax, xmax]` and the instance score.
    MultiPose,
}

/// Static description of a model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub mode: InferenceMode,
    pub file: &'static str,
    /// Input width and height.
    pub input_size: (u32, u32),
    pub pose_layout: Option<PoseLayout>,
}

const fn model(
    name: &'static str,
    mode: InferenceMode,
    file: &'static str,
    input_size: (u32, u32),
) -> ModelSpec {
    ModelSpec {
        name,
        mode,
        file,
        input_size,
        pose_layout: None,
    }
}

const fn pose_model(
    name: &'static str,
    file: &'static str,
    input_size: (u32, u32),
    layout: PoseLayout,
) -> ModelSpec {
    ModelSpec {
        name,
        mode: InferenceMode::PoseEstimation,
        file,
        input_size,
        pose_layout: Some(layout),
    }
}

static MODELS: &[ModelSpec] = &[
    model("MobileNet V1", Classification, "mobilenet_v1_1.0_224_quant.onnx", (224, 224)),
    model("MobileNet V2", Classification, "mobilenet_v2_1.0_224_quant.onnx", (224, 224)),
    model("Inception V1", Classification, "inception_v1_224_quant.onnx", (224, 224)),
    model("Inception V2", Classification, "inception_v2_224_quant.onnx", (224, 224)),
    model("Inception V3", Classification, "inception_v3_299_quant.onnx", (299, 299)),
    model("Inception V4", Classification, "inception_v4_299_quant.onnx", (299, 299)),
    model("ResNet-50", Classification, "tfhub_tf2_resnet_50_imagenet_ptq.onnx", (224, 224)),
    model("EfficientNet (S)", Classification, "efficientnet-S_quant.onnx", (224, 224)),
    model("EfficientNet (M)", Classification, "efficientnet-M_quant.onnx", (240, 240)),
    model("EfficientNet (L)", Classification, "efficientnet-L_quant.onnx", (300, 300)),
    model("SSD MobileNet V1", Detection, "ssd_mobilenet_v1_coco_quant_postprocess.onnx", (300, 300)),
    model("SSD MobileNet V2", Detection, "ssd_mobilenet_v2_coco_quant_postprocess.onnx", (300, 300)),
    model("SSDLite MobileDet", Detection, "ssdlite_mobiledet_coco_qat_postprocess.onnx", (320, 320)),
    model("EfficientDet-Lite0", Detection, "efficientdet_lite0_320_ptq.onnx", (320, 320)),
    model("EfficientDet-Lite1", Detection, "efficientdet_lite1_384_ptq.onnx", (384, 384)),
    model("EfficientDet-Lite2", Detection, "efficientdet_lite2_448_ptq.onnx", (448, 448)),
    model("EfficientDet-Lite3", Detection, "efficientdet_lite3_512_ptq.onnx", (512, 512)),
    pose_model(
        "MoveNet.SinglePose.Lightning",
        "movenet_single_pose_lightning_ptq.onnx",
        (192, 192),
        PoseLayout::SinglePose,
    ),
    pose_model(
        "MoveNet.SinglePose.Thunder",
        "movenet_single_pose_thunder_ptq.onnx",
        (256, 256),
        PoseLayout::SinglePose,
    ),
    pose_model(
        "MoveNet.MultiPose.Lightning",
        "movenet_multipose_lightning_256x256.onnx",
        (256, 256),
        PoseLayout::MultiPose,
    ),
    model("DeepLab V3 MobileNet V2", Segmentation, "deeplabv3_mnv2_pascal_quant.onnx", (513, 513)),
    model("DeepLab V3 MobileNet V2 (DM 0.5)", Segmentation, "deeplabv3_mnv2_dm05_pascal_quant.onnx", (513, 513)),
];

/// Lookup of models below a model directory.
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    model_dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static ModelSpec> {
        MODELS.iter().find(|spec| spec.name == name)
    }

    /// Path of the model file with the given display name.
    pub fn model_path(&self, name: &str) -> Result<PathBuf> {
        self.get(name)
            .map(|spec| self.path_of(spec))
            .ok_or_else(|| anyhow!("unknown model {name}"))
    }

    pub fn path_of(&self, spec: &ModelSpec) -> PathBuf {
        self.model_dir.join(spec.file)
    }

    pub fn models_for(&self, mode: InferenceMode) -> impl Iterator<Item = &'static ModelSpec> {
        MODELS.iter().filter(move |spec| spec.mode == mode)
    }

    /// All models in the order the UI should offer them.
    pub fn catalog(&self) -> Vec<ModelEntry> {
        MODELS
            .iter()
            .map(|spec| ModelEntry {
                name: spec.name.to_owned(),
                mode: spec.mode,
            })
            .collect()
    }
}
