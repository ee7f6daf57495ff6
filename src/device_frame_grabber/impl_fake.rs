use crate::device_frame_grabber::interface::FrameGrabber;
use crate::library::logger::interface::Logger;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Grabs nothing. Outcomes come from a script, then from `failure_rate`.
pub struct FrameGrabberFake {
    scripted: Mutex<VecDeque<bool>>,
    failure_rate: f32,
    calls: Mutex<Vec<PathBuf>>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl FrameGrabberFake {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            failure_rate: 0.0,
            calls: Mutex::new(Vec::new()),
            logger: logger.with_namespace("frame_grabber").with_namespace("fake"),
        }
    }

    pub fn with_outcomes(self, outcomes: Vec<bool>) -> Self {
        Self {
            scripted: Mutex::new(outcomes.into()),
            ..self
        }
    }

    pub fn with_failure_rate(self, failure_rate: f32) -> Self {
        Self {
            failure_rate,
            ..self
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl FrameGrabber for FrameGrabberFake {
    fn capture_frame(&self, stream_uri: &str, output_path: &Path, _timeout: Duration) -> bool {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(output_path.to_path_buf());
        }

        let scripted = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        let captured = scripted.unwrap_or_else(|| rand::random::<f32>() >= self.failure_rate);

        let _ = self.logger.info(&format!(
            "Capturing {} from {} -> {}",
            output_path.display(),
            stream_uri,
            if captured { "ok" } else { "failed" }
        ));
        captured
    }
}
