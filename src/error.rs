use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShellError {
    #[error("could not reach {destination}: {reason}")]
    Connect { destination: String, reason: String },

    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("session already closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("capture period must be greater than zero")]
    ZeroCapturePeriod,

    #[error("attempt cap must be at least 1")]
    ZeroAttempts,

    #[error("at least one ready marker is required")]
    NoReadyMarkers,

    #[error("ready marker {0:?} is also listed as a failure marker")]
    OverlappingMarker(String),

    #[error("invalid timezone offset {0} hours")]
    Timezone(i32),
}
