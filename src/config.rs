use crate::bring_up::readiness::Markers;
use crate::error::ConfigError;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// `None` means key based authentication.
    pub password: Option<Arc<SecretString>>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub control_path: PathBuf,
}

impl BoardConfig {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            host: "192.168.42.1".to_string(),
            port: 22,
            user: "root".to_string(),
            password: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            control_path: std::env::temp_dir().join("board-camera-%r@%h:%p"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub board: BoardConfig,
    pub camera_script: String,
    pub check_script: bool,
    /// Name of the vendor capture program as it shows up in `ps`.
    pub process_name: String,
    /// Everything that may still hold the camera device from an earlier run.
    pub cleanup_targets: Vec<String>,
    pub stream_uri: String,
    pub markers: Markers,
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub attempt_timeout: Option<Duration>,
    pub cooldown: Duration,
    pub capture_window: Duration,
    pub capture_period: Duration,
    pub frame_timeout: Duration,
    pub image_quality: u8,
    pub output_dir: PathBuf,
    pub interrupt_grace: Duration,
    pub shutdown_verify_attempts: u32,
    /// Fixed-count capture without bring-up, for a stream that is already up.
    pub burst_shots: u32,
    pub burst_interval: Duration,
    pub logger_timezone: chrono::FixedOffset,
}

impl Default for Config {
    fn default() -> Self {
        let board = BoardConfig::default();
        let stream_uri = format!("rtsp://{}/h264", board.host);
        Self {
            board,
            camera_script: "/mnt/system/usr/bin/camera-test.sh".to_string(),
            check_script: true,
            process_name: "sample_vi_fd".to_string(),
            cleanup_targets: vec!["sample_vi_fd".to_string(), "rtsp2web.json".to_string()],
            stream_uri,
            markers: Markers::default(),
            max_attempts: 5,
            poll_interval: Duration::from_millis(100),
            attempt_timeout: None,
            cooldown: Duration::from_secs(2),
            capture_window: Duration::from_secs(60),
            capture_period: Duration::from_secs(3),
            frame_timeout: Duration::from_secs(15),
            image_quality: 2,
            output_dir: PathBuf::from("."),
            interrupt_grace: Duration::from_secs(1),
            shutdown_verify_attempts: 3,
            burst_shots: 10,
            burst_interval: Duration::from_secs(2),
            logger_timezone: china_standard_time(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_period.is_zero() {
            return Err(ConfigError::ZeroCapturePeriod);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.markers.ready.is_empty() {
            return Err(ConfigError::NoReadyMarkers);
        }
        if let Some(marker) = self
            .markers
            .ready
            .iter()
            .find(|ready| self.markers.failed.contains(*ready))
        {
            return Err(ConfigError::OverlappingMarker(marker.clone()));
        }
        Ok(())
    }

    /// Number of frame grabs that fit in the capture window.
    pub fn capture_ticks(&self) -> u32 {
        if self.capture_period.is_zero() {
            return 0;
        }
        let ticks = self.capture_window.as_nanos() / self.capture_period.as_nanos();
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

pub fn timezone_from_hours(hours: i32) -> Result<chrono::FixedOffset, ConfigError> {
    chrono::FixedOffset::east_opt(hours * 3600).ok_or(ConfigError::Timezone(hours))
}

fn china_standard_time() -> chrono::FixedOffset {
    chrono::FixedOffset::east_opt(8 * 3600).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.stream_uri, "rtsp://192.168.42.1/h264");
        assert_eq!(config.board.destination(), "root@192.168.42.1");
    }

    #[test]
    fn test_default_window_fits_twenty_ticks() {
        assert_eq!(Config::default().capture_ticks(), 20);
    }

    #[test]
    fn test_ticks_round_down() {
        let config = Config {
            capture_window: Duration::from_millis(1000),
            capture_period: Duration::from_millis(300),
            ..Config::default()
        };

        assert_eq!(config.capture_ticks(), 3);
    }

    #[test]
    fn test_rejects_zero_period() {
        let config = Config {
            capture_period: Duration::ZERO,
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroCapturePeriod));
        assert_eq!(config.capture_ticks(), 0);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn test_rejects_overlapping_markers() {
        let mut config = Config::default();
        config.markers.failed.push("rtsp://".to_string());

        assert_eq!(
            config.validate(),
            Err(ConfigError::OverlappingMarker("rtsp://".to_string()))
        );
    }

    #[test]
    fn test_timezone_out_of_range() {
        assert!(timezone_from_hours(8).is_ok());
        assert_eq!(timezone_from_hours(30), Err(ConfigError::Timezone(30)));
    }
}
