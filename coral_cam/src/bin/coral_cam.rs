//! Coral camera binary.
//!
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use coral_cam::{
    bridge::{bridge, router, spawn_frame_loop},
    engine::CamEngine,
    labels::LabelTables,
    meter::spawn_meter_logger,
    registry::ModelRegistry,
    sensors::{get_capture_fn, CameraSettings},
    InferenceMode, FRAME_HEIGHT, FRAME_WIDTH,
};
use env_logger::TimestampPrecision;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the UI on
    #[clap(long, default_value = "127.0.0.1:8000")]
    server_address: String,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    #[clap(long, default_value_t = FRAME_WIDTH)]
    width: u32,

    #[clap(long, default_value_t = FRAME_HEIGHT)]
    height: u32,

    /// Frames per second, the camera maximum if not given
    #[clap(long)]
    fps: Option<u32>,

    /// Directory with the model files
    #[clap(long, default_value = "test_data")]
    model_dir: PathBuf,

    /// Labels of the detection models
    #[clap(long, default_value = "test_data/coco_labels.txt")]
    detection_labels: PathBuf,

    /// Labels of the classification models
    #[clap(long, default_value = "test_data/imagenet_labels.txt")]
    classification_labels: PathBuf,

    /// Quality of the JPEG frames sent to the UI
    #[clap(long, default_value_t = 80, value_parser = clap::value_parser!(i32).range(1..=100))]
    jpeg_quality: i32,

    /// Inference mode to start with
    #[clap(long, requires = "model")]
    mode: Option<InferenceMode>,

    /// Model to start with
    #[clap(long, requires = "mode")]
    model: Option<String>,

    /// Use the optimized execution plan for the initial model
    #[clap(long)]
    accelerator: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let labels = LabelTables::load(&args.detection_labels, &args.classification_labels)?;

    let settings = CameraSettings {
        device: args.device,
        resolution: Some((args.width, args.height)),
        frame_rate: args.fps.map(|fps| (1, fps)),
        ..Default::default()
    };
    let capture = get_capture_fn(&settings)?;

    let mut engine = CamEngine::new(
        capture,
        ModelRegistry::new(args.model_dir),
        Arc::new(labels),
        args.jpeg_quality,
    );
    if let (Some(mode), Some(model)) = (args.mode, &args.model) {
        engine
            .set_engine(mode, model, args.accelerator)
            .with_context(|| format!("failed to start with {model}"))?;
    }

    let (feed, state) = bridge(engine);
    spawn_frame_loop(feed);
    spawn_meter_logger(Duration::from_secs(2));

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Serving UI on http://{addr}");
    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await?;

    Ok(())
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn defaults() -> Result<()> {
        let args = Args::try_parse_from(["coral_cam"])?;
        assert_eq!(args.server_address, "127.0.0.1:8000");
        assert_eq!(args.jpeg_quality, 80);
        assert_eq!(args.mode, None);

        Ok(())
    }

    #[test]
    fn jpeg_quality_in_range() -> Result<()> {
        let args = Args::try_parse_from(["coral_cam", "--jpeg-quality", "100"])?;
        assert_eq!(args.jpeg_quality, 100);

        for quality in ["0", "101", "-5"] {
            assert!(Args::try_parse_from(["coral_cam", "--jpeg-quality", quality]).is_err());
        }

        Ok(())
    }

    #[test]
    fn initial_engine_needs_mode_and_model() -> Result<()> {
        assert!(Args::try_parse_from(["coral_cam", "--mode", "detection"]).is_err());

        let args = Args::try_parse_from([
            "coral_cam",
            "--mode",
            "pose-estimation",
            "--model",
            "MoveNet.SinglePose.Thunder",
        ])?;
        assert_eq!(args.mode, Some(InferenceMode::PoseEstimation));

        Ok(())
    }
}
