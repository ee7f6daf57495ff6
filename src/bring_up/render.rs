use crate::bring_up::core::{Outcome, Shutdown, State};
use crate::config::Config;
use crate::device_display::interface::DeviceDisplay;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Render {
    device_display: Arc<Mutex<dyn DeviceDisplay + Send + Sync>>,
    config: Config,
}

impl Render {
    pub fn new(device_display: Arc<Mutex<dyn DeviceDisplay + Send + Sync>>, config: Config) -> Self {
        Self {
            device_display,
            config,
        }
    }

    pub fn render(&self, state: &State) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut device_display = self.device_display.lock().map_err(|e| e.to_string())?;
        let [first, second] = lines(&self.config, state);

        device_display.clear()?;
        device_display.write_line(0, &first)?;
        device_display.write_line(1, &second)?;
        device_display.flush()?;

        Ok(())
    }
}

pub fn lines(config: &Config, state: &State) -> [String; 2] {
    let attempts = |attempt: &u32| format!("Attempt {}/{}", attempt, config.max_attempts);

    match state {
        State::Connecting => ["Connecting...".to_string(), config.board.host.clone()],
        State::Preparing => ["Checking script".to_string(), String::new()],
        State::Launching { attempt } => ["Launching...".to_string(), attempts(attempt)],
        State::Polling { attempt, .. } => ["Waiting stream".to_string(), attempts(attempt)],
        State::Failed { attempt } => ["Cleaning up".to_string(), format!("Attempt {} failed", attempt)],
        State::CoolingDown { attempt } => ["Cooling down".to_string(), attempts(attempt)],
        State::Capturing {
            tick,
            total,
            succeeded,
            ..
        } => [
            format!("Capturing {}/{}", tick + 1, total),
            format!("Saved {}", succeeded),
        ],
        State::ShuttingDown { succeeded, total, .. } => [
            "Stopping camera".to_string(),
            format!("Saved {}/{}", succeeded, total),
        ],
        State::Closing { .. } => ["Closing session".to_string(), String::new()],
        State::Terminal(outcome) => match outcome {
            Outcome::Captured {
                succeeded,
                total,
                shutdown: Shutdown::Confirmed,
            } => ["Done".to_string(), format!("Saved {}/{}", succeeded, total)],
            Outcome::Captured {
                succeeded, total, ..
            } => [
                "Stop unconfirmed".to_string(),
                format!("Saved {}/{}", succeeded, total),
            ],
            Outcome::BringUpFailed { .. } => {
                ["Bring-up failed".to_string(), "Reboot the board".to_string()]
            }
            Outcome::ConnectionFailed { .. } => ["No connection".to_string(), config.board.host.clone()],
            Outcome::ScriptMissing { .. } => ["Script missing".to_string(), String::new()],
            Outcome::Aborted { .. } => ["Aborted".to_string(), String::new()],
        },
    }
}
