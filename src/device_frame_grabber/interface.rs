use std::path::Path;
use std::time::Duration;

pub trait FrameGrabber: Send + Sync {
    /// Saves one frame of `stream_uri` to `output_path`. Failures are
    /// reported, never retried.
    fn capture_frame(&self, stream_uri: &str, output_path: &Path, timeout: Duration) -> bool;
}
