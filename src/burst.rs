use crate::config::Config;
use crate::device_frame_grabber::interface::FrameGrabber;
use crate::library::logger::interface::Logger;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BurstReport {
    pub succeeded: u32,
    pub total: u32,
}

/// Grabs `config.burst_shots` frames from a stream that is already up.
/// Nothing is launched on the board and failed shots are not retried.
pub fn run(
    config: &Config,
    logger: Arc<dyn Logger + Send + Sync>,
    frame_grabber: Arc<dyn FrameGrabber + Send + Sync>,
) -> BurstReport {
    let logger = logger.with_namespace("burst");
    let total = config.burst_shots;
    let mut succeeded = 0;

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        let _ = logger.warn(&format!(
            "Cannot create {}: {}",
            config.output_dir.display(),
            e
        ));
    }

    for shot in 1..=total {
        let path = config.output_dir.join(format!("img{:03}.jpg", shot));
        let _ = logger.info(&format!("Capturing shot {}/{}", shot, total));

        if frame_grabber.capture_frame(&config.stream_uri, &path, config.frame_timeout) {
            succeeded += 1;
            let _ = logger.info(&format!("Saved {}", path.display()));
        } else {
            let _ = logger.warn(&format!("Shot {} failed", shot));
        }

        if shot < total {
            std::thread::sleep(config.burst_interval);
        }
    }

    let _ = logger.info(&format!("Burst finished: {}/{} frames saved", succeeded, total));
    BurstReport { succeeded, total }
}
