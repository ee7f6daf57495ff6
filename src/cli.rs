use crate::config::{timezone_from_hours, Config};
use crate::error::ConfigError;
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the board password. Unset means key based auth.
pub const PASSWORD_ENV: &str = "BOARD_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "board-camera")]
#[command(about = "Brings up the camera on an embedded board over SSH and captures frames")]
#[command(long_about = "
Brings up the vendor camera program on an embedded board over SSH, retrying
with cleanup between attempts, then grabs frames from its RTSP stream for a
fixed window and shuts it down again.

The board password is read from BOARD_PASSWORD (a .env file works too).
")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Board address
    #[arg(long, global = true)]
    pub host: Option<String>,

    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[arg(long, global = true)]
    pub user: Option<String>,

    /// RTSP stream to grab from, defaults to rtsp://<host>/h264
    #[arg(long, global = true)]
    pub stream_uri: Option<String>,

    /// Directory the frames are written to
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// ffmpeg JPEG quality, 2 is best
    #[arg(long, global = true)]
    pub quality: Option<u8>,

    /// Log timestamp offset from UTC in hours
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub timezone_hours: Option<i32>,

    #[arg(long, global = true, value_enum, default_value = "console")]
    pub display: DisplayKind,

    /// Run against a simulated board instead of a real one
    #[arg(long, global = true, default_value = "false")]
    pub simulate: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Bring the camera up, capture for a window, shut it down (default)
    Run(RunArgs),
    /// Capture a fixed number of frames from a stream that is already up
    Burst(BurstArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Camera start script on the board
    #[arg(long)]
    pub script: Option<String>,

    /// Vendor program name as shown by ps
    #[arg(long)]
    pub process_name: Option<String>,

    #[arg(long)]
    pub attempts: Option<u32>,

    #[arg(long)]
    pub window_secs: Option<u64>,

    #[arg(long)]
    pub period_secs: Option<u64>,

    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Give up on a silent attempt after this long
    #[arg(long)]
    pub attempt_timeout_secs: Option<u64>,

    /// Skip checking that the script exists before launching it
    #[arg(long, default_value = "false")]
    pub no_script_check: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BurstArgs {
    #[arg(long)]
    pub shots: Option<u32>,

    #[arg(long)]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayKind {
    #[value(name = "console")]
    Console,
    #[value(name = "gui")]
    Gui,
    #[value(name = "none")]
    Off,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }

    /// Layers the command line over `config`. The stream URI follows a new
    /// host unless it was given explicitly.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(host) = &self.host {
            config.board.host = host.clone();
            config.stream_uri = format!("rtsp://{}/h264", host);
        }
        if let Some(port) = self.port {
            config.board.port = port;
        }
        if let Some(user) = &self.user {
            config.board.user = user.clone();
        }
        if let Some(stream_uri) = &self.stream_uri {
            config.stream_uri = stream_uri.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(quality) = self.quality {
            config.image_quality = quality;
        }
        if let Some(hours) = self.timezone_hours {
            config.logger_timezone = timezone_from_hours(hours)?;
        }

        match self.command() {
            Command::Run(run) => run.apply(config),
            Command::Burst(burst) => {
                if let Some(shots) = burst.shots {
                    config.burst_shots = shots;
                }
                if let Some(secs) = burst.interval_secs {
                    config.burst_interval = Duration::from_secs(secs);
                }
            }
        }

        Ok(())
    }
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(script) = &self.script {
            config.camera_script = script.clone();
        }
        if let Some(process_name) = &self.process_name {
            config.process_name = process_name.clone();
            if !config.cleanup_targets.contains(process_name) {
                config.cleanup_targets.insert(0, process_name.clone());
            }
        }
        if let Some(attempts) = self.attempts {
            config.max_attempts = attempts;
        }
        if let Some(secs) = self.window_secs {
            config.capture_window = Duration::from_secs(secs);
        }
        if let Some(secs) = self.period_secs {
            config.capture_period = Duration::from_secs(secs);
        }
        if let Some(secs) = self.cooldown_secs {
            config.cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = self.attempt_timeout_secs {
            config.attempt_timeout = Some(Duration::from_secs(secs));
        }
        if self.no_script_check {
            config.check_script = false;
        }
    }
}

/// Reads the board password from the environment, loading `.env` first if
/// there is one. Empty counts as unset.
pub fn password_from_env() -> Option<Arc<SecretString>> {
    dotenvy::dotenv().ok();
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|password| !password.is_empty())
        .map(|password| Arc::new(SecretString::from(password)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("board-camera").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let args = parse(&[]);

        assert!(matches!(args.command(), Command::Run(_)));
        assert_eq!(args.display, DisplayKind::Console);
        assert!(!args.simulate);
    }

    #[test]
    fn test_host_moves_stream_uri() {
        let args = parse(&["--host", "10.0.0.7"]);
        let mut config = Config::default();

        args.apply(&mut config).unwrap();

        assert_eq!(config.board.host, "10.0.0.7");
        assert_eq!(config.stream_uri, "rtsp://10.0.0.7/h264");
    }

    #[test]
    fn test_explicit_stream_uri_wins() {
        let args = parse(&["--host", "10.0.0.7", "--stream-uri", "rtsp://10.0.0.7:8554/live"]);
        let mut config = Config::default();

        args.apply(&mut config).unwrap();

        assert_eq!(config.stream_uri, "rtsp://10.0.0.7:8554/live");
    }

    #[test]
    fn test_run_options() {
        let args = parse(&[
            "run",
            "--attempts",
            "3",
            "--window-secs",
            "30",
            "--period-secs",
            "5",
            "--attempt-timeout-secs",
            "20",
            "--no-script-check",
            "--process-name",
            "sample_vi",
        ]);
        let mut config = Config::default();

        args.apply(&mut config).unwrap();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.capture_ticks(), 6);
        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(20)));
        assert!(!config.check_script);
        assert_eq!(config.process_name, "sample_vi");
        assert_eq!(config.cleanup_targets[0], "sample_vi");
    }

    #[test]
    fn test_burst_options() {
        let args = parse(&["burst", "--shots", "3", "--interval-secs", "1", "--display", "none"]);
        let mut config = Config::default();

        args.apply(&mut config).unwrap();

        assert!(matches!(args.command(), Command::Burst(_)));
        assert_eq!(args.display, DisplayKind::Off);
        assert_eq!(config.burst_shots, 3);
        assert_eq!(config.burst_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bad_timezone_is_rejected() {
        let args = parse(&["--timezone-hours", "-30"]);
        let mut config = Config::default();

        assert_eq!(args.apply(&mut config), Err(ConfigError::Timezone(-30)));
    }
}
