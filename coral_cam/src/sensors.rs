//! Sensors module.
//!
use anyhow::{Context, Result};
use rscam::{Camera, Config};
use simple_error::simple_error;

use crate::{FRAME_HEIGHT, FRAME_WIDTH};

/// Returns the next JPEG encoded frame, `None` if the capture failed.
pub type CaptureFn = Box<dyn Fn() -> Option<Vec<u8>> + Send + Sync>;

/// Camera parameters.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub device: String,
    pub format: String,
    pub resolution: Option<(u32, u32)>,
    pub frame_rate: Option<(u32, u32)>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            format: "MJPG".into(),
            resolution: Some((FRAME_WIDTH, FRAME_HEIGHT)),
            frame_rate: None,
        }
    }
}

/// Get a capture function to a video device on a Linux machine.
///
/// Missing resolution or frame rate settings are replaced by the maximum the camera supports
/// for the requested format.
pub fn get_capture_fn(settings: &CameraSettings) -> Result<CaptureFn> {
    let mut cam = Camera::new(&settings.device)
        .with_context(|| format!("failed to open camera {}", &settings.device))?;
    log_supported_formats(&cam, &settings.format);
    let format = settings.format.as_bytes();

    log::info!("Using camera {}", &settings.device);

    let resolution = settings
        .resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let frame_rate = settings
        .frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;

    log::info!(
        "Capturing {}x{} at {}/{} s per frame",
        resolution.0,
        resolution.1,
        frame_rate.0,
        frame_rate.1
    );

    cam.start(&Config {
        interval: frame_rate,
        resolution,
        format,
        ..Default::default()
    })
    .context("failed to start camera")?;

    let callback = move || match cam.capture() {
        Ok(frame) => Some(frame[..].to_vec()),
        Err(err) => {
            log::debug!("Capture failed: {err}");
            None
        }
    };
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32)> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            // Map to iterator over ((width, height) num_pixels)
            .map(|res| (res, res.0 * res.1))
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|res| *res.0),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| simple_error!("No resolution found").into())
}

/// Get the maximum supported frame rate for the given format and resolution.
fn get_max_frame_rate(cam: &Camera, format: &[u8], resolution: (u32, u32)) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        // Intervals are seconds per frame, the shortest one is the highest frame rate
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .min_by(|a, b| (a.0 * b.1).cmp(&(b.0 * a.1)))
            .copied(),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}
