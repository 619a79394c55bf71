//! Frame rate meter.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Counts frames at the stages of the frame loop.
#[derive(Default)]
pub struct Meter {
    captured_frames: AtomicU64,
    infered_frames: AtomicU64,
    dropped_frames: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            captured_frames: AtomicU64::new(0),
            infered_frames: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_captured(&self) {
        self.captured_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_infered(&self) {
        self.infered_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame could not be captured or decoded.
    pub fn tick_dropped(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_captured(&self) -> u64 {
        self.captured_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_infered(&self) -> u64 {
        self.infered_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_dropped(&self) -> u64 {
        self.dropped_frames.swap(0, Ordering::Relaxed)
    }
}

pub fn spawn_meter_logger(period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log_interval = interval(period);
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let captured_frames = METER.get_reset_captured();
            let infered_frames = METER.get_reset_infered();
            let dropped_frames = METER.get_reset_dropped();
            let elapsed = start.elapsed().as_secs_f32();
            let fps_captured = captured_frames as f32 / elapsed;
            let fps_infered = infered_frames as f32 / elapsed;

            if captured_frames > 0 {
                log::info!("Captured frames per second: {fps_captured:.2}")
            }
            if infered_frames > 0 {
                log::info!("Infered frames per second: {fps_infered:.2}")
            }
            if dropped_frames > 0 {
                log::warn!("Dropped {dropped_frames} frames in {elapsed:.1} s")
            }
        }
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn counters_reset_on_read() {
        let meter = Meter::new();
        meter.tick_captured();
        meter.tick_captured();
        meter.tick_infered();

        assert_eq!(meter.get_reset_captured(), 2);
        assert_eq!(meter.get_reset_captured(), 0);
        assert_eq!(meter.get_reset_infered(), 1);
        assert_eq!(meter.get_reset_dropped(), 0);
    }
}
