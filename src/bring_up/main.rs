use crate::bring_up::core::{init, transition, Effect, Event, Outcome, Shutdown, State};
use crate::bring_up::render::Render;
use crate::bring_up::run_effect::RunEffect;
use crate::config::Config;
use crate::device_display::interface::DeviceDisplay;
use crate::device_frame_grabber::interface::FrameGrabber;
use crate::device_shell::interface::RemoteShell;
use crate::library::logger::interface::Logger;
use crate::library::state_machine::StateMachine;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct BringUp {
    pub config: Config,
    pub logger: Arc<dyn Logger + Send + Sync>,
    pub shell: Arc<dyn RemoteShell + Send + Sync>,
    pub frame_grabber: Arc<dyn FrameGrabber + Send + Sync>,
    pub device_display: Arc<Mutex<dyn DeviceDisplay + Send + Sync>>,
}

impl BringUp {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        shell: Arc<dyn RemoteShell + Send + Sync>,
        frame_grabber: Arc<dyn FrameGrabber + Send + Sync>,
        device_display: Arc<Mutex<dyn DeviceDisplay + Send + Sync>>,
    ) -> Self {
        Self {
            config,
            logger: logger.with_namespace("bring_up"),
            shell,
            frame_grabber,
            device_display,
        }
    }

    /// Runs one full bring-up and capture cycle. The session is closed on
    /// every path, including the ones that never reach `Terminal`.
    pub fn run(&self) -> Outcome {
        let mut runner = RunEffect::new(
            self.config.clone(),
            self.logger.clone(),
            self.shell.clone(),
            self.frame_grabber.clone(),
        );
        let render = Render::new(self.device_display.clone(), self.config.clone());
        let logger = self.logger.clone();
        let config = self.config.clone();

        let machine = StateMachine::new(
            init(),
            |state: State, event: Event| {
                let from = state.name();
                let (new_state, effects) = transition(&config, state, event);
                if from != new_state.name() {
                    let _ = logger.info(&format!("{} -> {}", from, new_state.name()));
                }
                (new_state, effects)
            },
            |state: &State| {
                if let Err(e) = render.render(state) {
                    let _ = self.logger.warn(&format!("Render failed: {}", e));
                }
            },
            |effect: Effect| runner.run_effect(effect),
        );

        let last = machine.run(State::is_terminal);

        let outcome = match last {
            State::Terminal(outcome) => outcome,
            other => Outcome::Aborted {
                reason: format!("stopped in {} with nothing left to do", other.name()),
            },
        };
        drop(runner);

        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &Outcome) {
        let _ = match outcome {
            Outcome::Captured {
                succeeded,
                total,
                shutdown,
            } => match shutdown {
                Shutdown::Confirmed => self.logger.info(&format!(
                    "Capture finished: {}/{} frames saved",
                    succeeded, total
                )),
                Shutdown::Leftover(pids) => self.logger.error(&format!(
                    "Capture finished: {}/{} frames saved, but {} is still running as {:?}, recommend a full reboot of the board",
                    succeeded, total, self.config.process_name, pids
                )),
                Shutdown::Unverified(reason) => self.logger.error(&format!(
                    "Capture finished: {}/{} frames saved, but {} could not be confirmed stopped: {}",
                    succeeded, total, self.config.process_name, reason
                )),
            },
            Outcome::BringUpFailed { attempts } => self.logger.error(&format!(
                "Bring-up failed after {} attempts, recommend a full reboot of the board",
                attempts
            )),
            Outcome::ConnectionFailed { reason } => self
                .logger
                .error(&format!("Cannot reach the board: {}", reason)),
            Outcome::ScriptMissing { path } => self
                .logger
                .error(&format!("Camera script {} is missing", path)),
            Outcome::Aborted { reason } => self.logger.error(&format!("Aborted: {}", reason)),
        };
    }
}
