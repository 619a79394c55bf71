//! Frame loop owning the engine session.
use std::{thread, time::Duration};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::protocol::BridgeMsg;
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, error::TryRecvError},
    },
    task::JoinHandle,
};

use crate::{
    engine::{CamEngine, EngineInfo},
    InferenceMode,
};

/// Wait between checks for connected UIs while nobody watches.
const IDLE_WAIT: Duration = Duration::from_millis(100);
/// Wait after a run of skipped frames, an unplugged camera fails without blocking.
const SKIP_WAIT: Duration = Duration::from_millis(50);
const SKIPS_BEFORE_WAIT: u32 = 3;

/// Commands from the UIs to the frame loop.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCmd {
    SetEngine {
        mode: InferenceMode,
        model: String,
        accelerator: bool,
    },
    /// Publish the active engine again, sent when a UI connects.
    ReportEngine,
}

/// Result of one iteration of the frame loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tick {
    /// No UI connected, nothing was captured.
    Idle,
    Pushed,
    /// Capturing or encoding failed, the frame was skipped.
    Skipped,
    /// All command senders are gone.
    Closed,
}

pub struct FrameFeed {
    engine: CamEngine,
    cmd_rx: mpsc::Receiver<EngineCmd>,
    msg_tx: broadcast::Sender<String>,
}

impl FrameFeed {
    pub fn new(
        engine: CamEngine,
        cmd_rx: mpsc::Receiver<EngineCmd>,
        msg_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            engine,
            cmd_rx,
            msg_tx,
        }
    }

    pub fn engine(&self) -> &CamEngine {
        &self.engine
    }

    /// Apply queued commands, then capture and push one frame if a UI is connected.
    pub fn tick(&mut self) -> Tick {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => self.apply(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Tick::Closed,
            }
        }

        if self.msg_tx.receiver_count() == 0 {
            return Tick::Idle;
        }

        match self.engine.get_frame() {
            Some(jpeg) => {
                self.publish(&BridgeMsg::Frame {
                    data: BASE64.encode(jpeg),
                });
                Tick::Pushed
            }
            None => Tick::Skipped,
        }
    }

    /// Run until the command channel is closed.
    pub fn run(mut self) {
        log::info!("Starting frame loop");
        let mut skipped = 0;
        loop {
            let tick = self.tick();
            if tick == Tick::Closed {
                break;
            }
            if let Some(wait) = pause_after(tick, &mut skipped) {
                thread::sleep(wait);
            }
        }
        log::info!("Frame loop stopped");
    }

    fn apply(&mut self, cmd: EngineCmd) {
        match cmd {
            EngineCmd::SetEngine {
                mode,
                model,
                accelerator,
            } => match self.engine.set_engine(mode, &model, accelerator) {
                Ok(info) => self.publish(&engine_changed(info)),
                Err(err) => {
                    log::error!("Failed to load {model} for {mode}: {err:#}");
                    self.publish(&BridgeMsg::error(format!(
                        "Failed to load {model} for {mode}: {err:#}"
                    )));
                }
            },
            EngineCmd::ReportEngine => {
                if let Some(info) = self.engine.info() {
                    self.publish(&engine_changed(info));
                }
            }
        }
    }

    fn publish(&self, msg: &BridgeMsg) {
        match msg.to_json() {
            // Sending only fails without subscribers
            Ok(json) => {
                self.msg_tx.send(json).ok();
            }
            Err(err) => log::error!("Failed to serialize message: {err}"),
        }
    }
}

/// How long the loop waits after a tick. `skipped` counts the consecutive skipped frames.
fn pause_after(tick: Tick, skipped: &mut u32) -> Option<Duration> {
    match tick {
        Tick::Skipped => {
            *skipped += 1;
            (*skipped >= SKIPS_BEFORE_WAIT).then_some(SKIP_WAIT)
        }
        Tick::Idle => {
            *skipped = 0;
            Some(IDLE_WAIT)
        }
        Tick::Pushed | Tick::Closed => {
            *skipped = 0;
            None
        }
    }
}

fn engine_changed(info: EngineInfo) -> BridgeMsg {
    BridgeMsg::EngineChanged {
        mode: info.mode,
        model: info.model,
        accelerator: info.accelerator,
        input_size: info.input_size,
    }
}

/// Run the frame loop on a blocking task, capturing and inference block the thread.
pub fn spawn_frame_loop(feed: FrameFeed) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || feed.run())
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use base64::Engine as _;
    use common::protocol::LogLevel;
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::{labels::LabelTables, registry::ModelRegistry, sensors::CaptureFn};

    fn feed_with(capture: CaptureFn) -> (mpsc::Sender<EngineCmd>, FrameFeed) {
        let engine = CamEngine::new(
            capture,
            ModelRegistry::new("test_data/missing"),
            Arc::new(LabelTables::default()),
            80,
        );
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (msg_tx, _) = broadcast::channel(8);

        (cmd_tx, FrameFeed::new(engine, cmd_rx, msg_tx))
    }

    fn jpeg_capture() -> CaptureFn {
        let frame = RgbImage::from_pixel(64, 48, Rgb([10, 200, 10]));
        let data = turbojpeg::compress_image(&frame, 90, turbojpeg::Subsamp::Sub2x2)
            .expect("failed to compress")
            .to_vec();
        Box::new(move || Some(data.clone()))
    }

    #[test]
    fn idle_without_subscribers() {
        let (_cmd_tx, mut feed) = feed_with(jpeg_capture());
        assert_eq!(feed.tick(), Tick::Idle);
    }

    #[test]
    fn pushes_base64_frames() -> anyhow::Result<()> {
        let (_cmd_tx, mut feed) = feed_with(jpeg_capture());
        let mut rx = feed.msg_tx.subscribe();

        assert_eq!(feed.tick(), Tick::Pushed);

        let msg: BridgeMsg = serde_json::from_str(&rx.try_recv()?)?;
        let data = match msg {
            BridgeMsg::Frame { data } => data,
            other => panic!("unexpected message {other:?}"),
        };
        let jpeg = BASE64.decode(data)?;
        let frame: RgbImage = turbojpeg::decompress_image(&jpeg)?;
        assert_eq!(frame.dimensions(), (64, 48));

        Ok(())
    }

    #[test]
    fn failed_capture_is_skipped() {
        let (_cmd_tx, mut feed) = feed_with(Box::new(|| None));
        let _rx = feed.msg_tx.subscribe();

        assert_eq!(feed.tick(), Tick::Skipped);
    }

    #[test]
    fn repeated_skips_slow_down() {
        let mut skipped = 0;
        assert_eq!(pause_after(Tick::Skipped, &mut skipped), None);
        assert_eq!(pause_after(Tick::Skipped, &mut skipped), None);
        assert_eq!(pause_after(Tick::Skipped, &mut skipped), Some(SKIP_WAIT));
        assert_eq!(pause_after(Tick::Skipped, &mut skipped), Some(SKIP_WAIT));

        assert_eq!(pause_after(Tick::Pushed, &mut skipped), None);
        assert_eq!(pause_after(Tick::Skipped, &mut skipped), None);
        assert_eq!(pause_after(Tick::Idle, &mut skipped), Some(IDLE_WAIT));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn load_failure_is_reported() -> anyhow::Result<()> {
        let (cmd_tx, mut feed) = feed_with(Box::new(|| None));
        let mut rx = feed.msg_tx.subscribe();

        cmd_tx.try_send(EngineCmd::SetEngine {
            mode: InferenceMode::Detection,
            model: "SSD MobileNet V1".into(),
            accelerator: true,
        })?;
        feed.tick();

        match serde_json::from_str::<BridgeMsg>(&rx.try_recv()?)? {
            BridgeMsg::Log { level, message } => {
                assert_eq!(level, LogLevel::Error);
                assert!(message.contains("SSD MobileNet V1"));
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(feed.engine().mode(), None);

        Ok(())
    }

    #[test]
    fn report_without_engine_is_silent() -> anyhow::Result<()> {
        let (cmd_tx, mut feed) = feed_with(Box::new(|| None));
        let mut rx = feed.msg_tx.subscribe();

        cmd_tx.try_send(EngineCmd::ReportEngine)?;
        feed.tick();
        assert!(rx.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn closes_with_command_channel() {
        let (cmd_tx, mut feed) = feed_with(jpeg_capture());
        drop(cmd_tx);
        assert_eq!(feed.tick(), Tick::Closed);
    }
}
