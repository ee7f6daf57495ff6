use crate::bring_up::readiness::Readiness;
use crate::config::Config;
use crate::error::ShellError;
use std::time::Instant;

/// Pids still listed after a kill, or why the list could not be read.
/// Only `Ok(vec![])` proves the program is gone.
pub type ProcessCheck = Result<Vec<u32>, ShellError>;

/// How the vendor program ended once the capture window was over.
#[derive(Debug, Clone, PartialEq)]
pub enum Shutdown {
    Confirmed,
    /// Still listed after the last verification round.
    Leftover(Vec<u32>),
    /// The process list could not be read on the last round.
    Unverified(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Captured {
        succeeded: u32,
        total: u32,
        shutdown: Shutdown,
    },
    BringUpFailed { attempts: u32 },
    ConnectionFailed { reason: String },
    ScriptMissing { path: String },
    Aborted { reason: String },
}

impl Outcome {
    /// A captured window only counts once the vendor program is confirmed gone.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Captured {
                shutdown: Shutdown::Confirmed,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Connecting,
    Preparing,
    /// Cleanup or launch of `attempt` (1-based) in flight.
    Launching {
        attempt: u32,
    },
    Polling {
        attempt: u32,
        since: Instant,
    },
    /// `attempt` failed; cleanup in flight.
    Failed {
        attempt: u32,
    },
    CoolingDown {
        attempt: u32,
    },
    Capturing {
        ready_at: Instant,
        tick: u32,
        total: u32,
        succeeded: u32,
    },
    ShuttingDown {
        succeeded: u32,
        total: u32,
        verifications: u32,
    },
    Closing {
        outcome: Outcome,
    },
    Terminal(Outcome),
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Connecting => "Connecting",
            State::Preparing => "Preparing",
            State::Launching { .. } => "Launching",
            State::Polling { .. } => "Polling",
            State::Failed { .. } => "Failed",
            State::CoolingDown { .. } => "CoolingDown",
            State::Capturing { .. } => "Capturing",
            State::ShuttingDown { .. } => "ShuttingDown",
            State::Closing { .. } => "Closing",
            State::Terminal(_) => "Terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Terminal(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionOpened(Result<(), ShellError>),
    /// `Ok(false)` when the board answered that the script is not there.
    ScriptChecked(Result<bool, ShellError>),
    CleanupDone { survivors: ProcessCheck },
    Launched { result: Result<(), ShellError>, at: Instant },
    Polled { readiness: Readiness, exited: bool, at: Instant },
    CooldownDone,
    FrameCaptured { tick: u32, success: bool },
    InterruptSent(Result<(), ShellError>),
    StopVerified { remaining: ProcessCheck },
    SessionClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenSession,
    CheckScript,
    Cleanup,
    Launch { attempt: u32 },
    Poll,
    Cooldown,
    CaptureFrame { tick: u32, due: Instant },
    Interrupt,
    VerifyStopped,
    CloseSession,
}

pub fn init() -> (State, Vec<Effect>) {
    (State::Connecting, vec![Effect::OpenSession])
}

pub fn transition(config: &Config, state: State, event: Event) -> (State, Vec<Effect>) {
    match (state.clone(), event) {
        // Session
        (State::Connecting, Event::SessionOpened(Ok(()))) => {
            if config.check_script {
                (State::Preparing, vec![Effect::CheckScript])
            } else {
                (State::Launching { attempt: 1 }, vec![Effect::Cleanup])
            }
        }
        (State::Connecting, Event::SessionOpened(Err(error))) => (
            State::Terminal(Outcome::ConnectionFailed {
                reason: error.to_string(),
            }),
            vec![],
        ),
        (State::Preparing, Event::ScriptChecked(Ok(false))) => (
            State::Closing {
                outcome: Outcome::ScriptMissing {
                    path: config.camera_script.clone(),
                },
            },
            vec![Effect::CloseSession],
        ),
        // An unanswered check is not proof of absence; the launch will tell.
        (State::Preparing, Event::ScriptChecked(_)) => {
            (State::Launching { attempt: 1 }, vec![Effect::Cleanup])
        }

        // Bring-up. Nothing is launched unless the process list shows the
        // camera free; an unconfirmed cleanup spends the attempt instead.
        (State::Launching { attempt }, Event::CleanupDone { survivors }) => {
            if is_clear(&survivors) {
                (State::Launching { attempt }, vec![Effect::Launch { attempt }])
            } else {
                fail_attempt(attempt)
            }
        }
        (State::Launching { attempt }, Event::Launched { result: Ok(()), at }) => {
            (State::Polling { attempt, since: at }, vec![Effect::Poll])
        }
        (State::Launching { attempt }, Event::Launched { result: Err(_), .. }) => {
            fail_attempt(attempt)
        }
        (
            State::Polling { attempt, since },
            Event::Polled {
                readiness,
                exited,
                at,
            },
        ) => match readiness {
            Readiness::Ready { .. } => start_capture(config, at),
            Readiness::Failed { .. } => fail_attempt(attempt),
            Readiness::Pending if exited => fail_attempt(attempt),
            Readiness::Pending
                if config
                    .attempt_timeout
                    .is_some_and(|timeout| at.saturating_duration_since(since) >= timeout) =>
            {
                fail_attempt(attempt)
            }
            Readiness::Pending => (state, vec![Effect::Poll]),
        },
        (State::Failed { attempt }, Event::CleanupDone { survivors }) => {
            if attempt >= config.max_attempts {
                (
                    State::Closing {
                        outcome: Outcome::BringUpFailed { attempts: attempt },
                    },
                    vec![Effect::CloseSession],
                )
            } else if is_clear(&survivors) {
                (State::CoolingDown { attempt }, vec![Effect::Cooldown])
            } else {
                fail_attempt(attempt + 1)
            }
        }
        (State::CoolingDown { attempt }, Event::CooldownDone) => {
            let attempt = attempt + 1;
            (State::Launching { attempt }, vec![Effect::Launch { attempt }])
        }

        // Capture window
        (
            State::Capturing {
                ready_at,
                tick,
                total,
                succeeded,
            },
            Event::FrameCaptured {
                tick: captured,
                success,
            },
        ) if captured == tick => {
            let succeeded = succeeded + u32::from(success);
            let next = tick + 1;
            if next < total {
                (
                    State::Capturing {
                        ready_at,
                        tick: next,
                        total,
                        succeeded,
                    },
                    vec![Effect::CaptureFrame {
                        tick: next,
                        due: ready_at + config.capture_period * next,
                    }],
                )
            } else {
                shut_down(succeeded, total)
            }
        }

        // Shutdown. A failed interrupt changes nothing: the process list decides.
        (State::ShuttingDown { .. }, Event::InterruptSent(_)) => {
            (state, vec![Effect::VerifyStopped])
        }
        (
            State::ShuttingDown {
                succeeded,
                total,
                verifications,
            },
            Event::StopVerified { remaining },
        ) => {
            let verifications = verifications + 1;
            let shutdown = match remaining {
                Ok(pids) if pids.is_empty() => Some(Shutdown::Confirmed),
                Ok(pids) if verifications >= config.shutdown_verify_attempts => {
                    Some(Shutdown::Leftover(pids))
                }
                Err(error) if verifications >= config.shutdown_verify_attempts => {
                    Some(Shutdown::Unverified(error.to_string()))
                }
                _ => None,
            };
            if let Some(shutdown) = shutdown {
                (
                    State::Closing {
                        outcome: Outcome::Captured {
                            succeeded,
                            total,
                            shutdown,
                        },
                    },
                    vec![Effect::CloseSession],
                )
            } else {
                (
                    State::ShuttingDown {
                        succeeded,
                        total,
                        verifications,
                    },
                    vec![Effect::VerifyStopped],
                )
            }
        }
        (State::Closing { outcome }, Event::SessionClosed) => (State::Terminal(outcome), vec![]),

        _ => (state, vec![]),
    }
}

fn is_clear(check: &ProcessCheck) -> bool {
    matches!(check, Ok(pids) if pids.is_empty())
}

fn fail_attempt(attempt: u32) -> (State, Vec<Effect>) {
    (State::Failed { attempt }, vec![Effect::Cleanup])
}

fn start_capture(config: &Config, ready_at: Instant) -> (State, Vec<Effect>) {
    let total = config.capture_ticks();
    if total == 0 {
        return shut_down(0, 0);
    }
    (
        State::Capturing {
            ready_at,
            tick: 0,
            total,
            succeeded: 0,
        },
        vec![Effect::CaptureFrame {
            tick: 0,
            due: ready_at,
        }],
    )
}

fn shut_down(succeeded: u32, total: u32) -> (State, Vec<Effect>) {
    (
        State::ShuttingDown {
            succeeded,
            total,
            verifications: 0,
        },
        vec![Effect::Interrupt],
    )
}
