use crate::device_frame_grabber::interface::FrameGrabber;
use crate::library::logger::interface::Logger;
use crate::library::process;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

const STDERR_TAIL_LINES: usize = 5;

pub struct FrameGrabberFfmpeg {
    program: String,
    quality: u8,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl FrameGrabberFfmpeg {
    pub fn new(quality: u8, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self::with_program("ffmpeg", quality, logger)
    }

    pub fn with_program(program: &str, quality: u8, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            program: program.to_string(),
            quality,
            logger: logger.with_namespace("frame_grabber").with_namespace("ffmpeg"),
        }
    }

    fn command(&self, stream_uri: &str, output_path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-rtsp_transport", "tcp"])
            .args(["-i", stream_uri])
            .args(["-vframes", "1"])
            .args(["-q:v", &self.quality.to_string()])
            .arg("-y")
            .arg(output_path);
        command
    }
}

impl FrameGrabber for FrameGrabberFfmpeg {
    fn capture_frame(&self, stream_uri: &str, output_path: &Path, timeout: Duration) -> bool {
        let command = self.command(stream_uri, output_path);

        match process::run_with_timeout(command, timeout) {
            Ok(output) if output.success() => true,
            Ok(output) => {
                let tail: Vec<&str> = output.stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
                let tail: Vec<&str> = tail.into_iter().rev().collect();
                let _ = self.logger.warn(&format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.exit_code,
                    tail.join(" | ")
                ));
                false
            }
            Err(e) => {
                let _ = self.logger.warn(&e.to_string());
                false
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::library::logger::impl_fake::LoggerFake;

    #[test]
    fn test_command_line() {
        let grabber = FrameGrabberFfmpeg::new(2, Arc::new(LoggerFake::new()));

        let command = grabber.command("rtsp://192.168.42.1/h264", Path::new("img.jpg"));
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(command.get_program(), "ffmpeg");
        assert!(args.windows(2).any(|w| w == ["-rtsp_transport", "tcp"]));
        assert!(args.windows(2).any(|w| w == ["-i", "rtsp://192.168.42.1/h264"]));
        assert!(args.windows(2).any(|w| w == ["-q:v", "2"]));
        assert_eq!(args.last().map(String::as_str), Some("img.jpg"));
    }

    #[test]
    fn test_missing_binary_is_a_failed_capture() {
        let logger = LoggerFake::new();
        let grabber =
            FrameGrabberFfmpeg::with_program("no-such-ffmpeg-4711", 2, Arc::new(logger.clone()));

        let captured = grabber.capture_frame("rtsp://x/h264", Path::new("x.jpg"), Duration::from_secs(1));

        assert!(!captured);
        assert!(logger.contains("no-such-ffmpeg-4711"));
    }

    #[test]
    fn test_nonzero_exit_is_a_failed_capture() {
        let logger = LoggerFake::new();
        let grabber = FrameGrabberFfmpeg::with_program("false", 2, Arc::new(logger.clone()));

        let captured = grabber.capture_frame("rtsp://x/h264", Path::new("x.jpg"), Duration::from_secs(1));

        assert!(!captured);
        assert!(logger.contains("exited with 1"));
    }

    #[test]
    fn test_zero_exit_is_a_capture() {
        let grabber = FrameGrabberFfmpeg::with_program("true", 2, Arc::new(LoggerFake::new()));

        assert!(grabber.capture_frame("rtsp://x/h264", Path::new("x.jpg"), Duration::from_secs(1)));
    }
}
