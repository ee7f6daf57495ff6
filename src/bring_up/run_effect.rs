use crate::bring_up::core::{Effect, Event, ProcessCheck};
use crate::bring_up::readiness::{classify, Readiness};
use crate::config::Config;
use crate::device_frame_grabber::interface::FrameGrabber;
use crate::device_shell::commands;
use crate::device_shell::interface::{Channel, RemoteShell, Session, CTRL_C};
use crate::error::ShellError;
use crate::library::logger::interface::Logger;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Enough trailing output to hold any marker split across reads.
const OUTPUT_WINDOW: usize = 4096;

/// Interprets effects against the board. Owns the session and the vendor
/// program's channel for the whole run, and releases both on drop.
pub struct RunEffect {
    config: Config,
    logger: Arc<dyn Logger + Send + Sync>,
    shell: Arc<dyn RemoteShell + Send + Sync>,
    frame_grabber: Arc<dyn FrameGrabber + Send + Sync>,
    session: Option<Box<dyn Session>>,
    channel: Option<Box<dyn Channel>>,
    attempt_output: String,
}

impl RunEffect {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        shell: Arc<dyn RemoteShell + Send + Sync>,
        frame_grabber: Arc<dyn FrameGrabber + Send + Sync>,
    ) -> Self {
        Self {
            config,
            logger,
            shell,
            frame_grabber,
            session: None,
            channel: None,
            attempt_output: String::new(),
        }
    }

    pub fn run_effect(&mut self, effect: Effect) -> Event {
        match effect {
            Effect::OpenSession => self.open_session(),
            Effect::CheckScript => Event::ScriptChecked(self.check_script()),
            Effect::Cleanup => Event::CleanupDone {
                survivors: self.cleanup(),
            },
            Effect::Launch { attempt } => self.launch(attempt),
            Effect::Poll => self.poll(),
            Effect::Cooldown => {
                let _ = self.logger.info(&format!(
                    "Waiting {:?} for the camera to settle",
                    self.config.cooldown
                ));
                std::thread::sleep(self.config.cooldown);
                Event::CooldownDone
            }
            Effect::CaptureFrame { tick, due } => self.capture_frame(tick, due),
            Effect::Interrupt => Event::InterruptSent(self.interrupt()),
            Effect::VerifyStopped => Event::StopVerified {
                remaining: self.verify_stopped(),
            },
            Effect::CloseSession => {
                self.close();
                Event::SessionClosed
            }
        }
    }

    fn session(&mut self) -> Result<&mut Box<dyn Session>, ShellError> {
        self.session.as_mut().ok_or(ShellError::Closed)
    }

    fn open_session(&mut self) -> Event {
        match self.shell.open_session() {
            Ok(session) => {
                self.session = Some(session);
                Event::SessionOpened(Ok(()))
            }
            Err(e) => {
                let _ = self.logger.error(&format!("Cannot open session: {}", e));
                Event::SessionOpened(Err(e))
            }
        }
    }

    fn check_script(&mut self) -> Result<bool, ShellError> {
        let script = self.config.camera_script.clone();
        let session = self.session()?;

        let listing = session.exec(&commands::script_exists(&script))?;
        if !listing.success() {
            let _ = self.logger.error(&format!("{} not found on the board", script));
            return Ok(false);
        }

        let session = self.session()?;
        match session.exec(&commands::make_executable(&script)) {
            Ok(output) if output.success() => {}
            Ok(output) => {
                let _ = self
                    .logger
                    .warn(&format!("chmod +x {} failed: {}", script, output.stderr));
            }
            Err(e) => {
                let _ = self.logger.warn(&format!("chmod +x {} failed: {}", script, e));
            }
        }
        Ok(true)
    }

    /// Best effort: every step may find nothing to kill. The process list
    /// has the last word, and anything still listed is killed by pid.
    fn cleanup(&mut self) -> ProcessCheck {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }

        let targets = self.config.cleanup_targets.clone();
        let Some(session) = self.session.as_mut() else {
            let _ = self.logger.warn("Cleanup skipped, no session");
            return Err(ShellError::Closed);
        };

        for target in &targets {
            for step in commands::kill_escalation(target) {
                match session.exec(&step) {
                    Ok(output) if output.success() => {}
                    // Nothing matched; the expected outcome on a clean board
                    Ok(_) => {}
                    Err(e) => {
                        let _ = self.logger.warn(&format!("`{}` failed: {}", step, e));
                    }
                }
            }
        }

        let mut survivors = Vec::new();
        for target in &targets {
            match kill_survivors(session, target, self.logger.as_ref()) {
                Ok(pids) => survivors.extend(pids),
                Err(e) => {
                    let _ = self.logger.error(&format!(
                        "Cannot confirm {} is gone, not launching: {}",
                        target, e
                    ));
                    return Err(e);
                }
            }
        }

        if survivors.is_empty() {
            let _ = self.logger.info("No stale camera processes left");
        } else {
            let _ = self.logger.error(&format!(
                "Processes survived cleanup, not launching: {:?}",
                survivors
            ));
        }
        Ok(survivors)
    }

    fn launch(&mut self, attempt: u32) -> Event {
        let _ = self.logger.info(&format!(
            "Attempt {}/{}: launching {}",
            attempt, self.config.max_attempts, self.config.camera_script
        ));
        self.attempt_output.clear();

        let script = self.config.camera_script.clone();
        let result = match self.session.as_mut() {
            Some(session) => session.open_interactive(&script),
            None => Err(ShellError::Closed),
        }
        .map(|channel| {
            self.channel = Some(channel);
        });

        if let Err(e) = &result {
            let _ = self.logger.error(&format!("Launch failed: {}", e));
        }

        Event::Launched {
            result,
            at: Instant::now(),
        }
    }

    fn poll(&mut self) -> Event {
        std::thread::sleep(self.config.poll_interval);

        let Some(channel) = self.channel.as_mut() else {
            return Event::Polled {
                readiness: Readiness::Pending,
                exited: true,
                at: Instant::now(),
            };
        };

        let chunk = match channel.read_nonblocking() {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = self.logger.warn(&format!("Reading vendor output failed: {}", e));
                return Event::Polled {
                    readiness: Readiness::Pending,
                    exited: true,
                    at: Instant::now(),
                };
            }
        };

        let text = String::from_utf8_lossy(&chunk);
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let _ = self.logger.info(&format!("board> {}", line));
        }
        self.attempt_output.push_str(&text);
        trim_front(&mut self.attempt_output, OUTPUT_WINDOW);

        let readiness = classify(&self.attempt_output, &self.config.markers);
        let exited = matches!(readiness, Readiness::Pending) && channel.exited();

        match &readiness {
            Readiness::Ready { marker } => {
                let _ = self.logger.info(&format!("Stream is up ({} seen)", marker));
            }
            Readiness::Failed { marker } => {
                let _ = self.logger.warn(&format!("Vendor program failed ({} seen)", marker));
            }
            Readiness::Pending if exited => {
                let _ = self.logger.warn("Vendor program exited before the stream came up");
            }
            Readiness::Pending => {}
        }

        Event::Polled {
            readiness,
            exited,
            at: Instant::now(),
        }
    }

    fn capture_frame(&mut self, tick: u32, due: Instant) -> Event {
        let wait = due.saturating_duration_since(Instant::now());
        std::thread::sleep(wait);

        if let Err(e) = std::fs::create_dir_all(&self.config.output_dir) {
            let _ = self.logger.warn(&format!(
                "Cannot create {}: {}",
                self.config.output_dir.display(),
                e
            ));
        }

        let path = self.frame_path(tick);
        let success = self.frame_grabber.capture_frame(
            &self.config.stream_uri,
            &path,
            self.config.frame_timeout,
        );

        let total = self.config.capture_ticks();
        if success {
            let _ = self.logger.info(&format!(
                "Frame {}/{} saved to {}",
                tick + 1,
                total,
                path.display()
            ));
        } else {
            let _ = self
                .logger
                .warn(&format!("Frame {}/{} failed", tick + 1, total));
        }

        Event::FrameCaptured { tick, success }
    }

    fn frame_path(&self, tick: u32) -> PathBuf {
        let stamp = Utc::now()
            .with_timezone(&self.config.logger_timezone)
            .format("%Y%m%d_%H%M%S");
        self.config
            .output_dir
            .join(format!("img_{}_{:03}.jpg", stamp, tick + 1))
    }

    fn interrupt(&mut self) -> Result<(), ShellError> {
        let _ = self.logger.info("Capture window over, interrupting vendor program");
        let result = match self.channel.as_mut() {
            Some(channel) => channel.send_signal(CTRL_C),
            None => Err(ShellError::Channel("no vendor channel".to_string())),
        };
        if let Err(e) = &result {
            let _ = self
                .logger
                .warn(&format!("Interrupt failed, assuming it already died: {}", e));
        }
        std::thread::sleep(self.config.interrupt_grace);
        result
    }

    fn verify_stopped(&mut self) -> ProcessCheck {
        let name = self.config.process_name.clone();
        let Some(session) = self.session.as_mut() else {
            let _ = self.logger.warn("Cannot verify shutdown, no session");
            return Err(ShellError::Closed);
        };

        let remaining = kill_survivors(session, &name, self.logger.as_ref());
        match &remaining {
            Ok(pids) if pids.is_empty() => {
                let _ = self.logger.info(&format!("{} is gone", name));
            }
            Ok(pids) => {
                let _ = self
                    .logger
                    .warn(&format!("{} still running as {:?}", name, pids));
            }
            Err(e) => {
                let _ = self
                    .logger
                    .warn(&format!("Cannot verify {} stopped: {}", name, e));
            }
        }
        remaining
    }

    fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl Drop for RunEffect {
    fn drop(&mut self) {
        self.close();
    }
}

/// Force-kills every listed `name` process and returns what is still listed
/// afterwards. An unreadable process list is an error, never an empty one.
fn kill_survivors(session: &mut Box<dyn Session>, name: &str, logger: &dyn Logger) -> ProcessCheck {
    let pids = session.list_processes_matching(name).inspect_err(|e| {
        let _ = logger.warn(&format!("Cannot list {} processes: {}", name, e));
    })?;
    if pids.is_empty() {
        return Ok(pids);
    }

    for pid in &pids {
        let _ = logger.info(&format!("Force killing {} ({})", name, pid));
        if let Err(e) = session.exec(&commands::force_kill(*pid)) {
            let _ = logger.warn(&format!("kill -9 {} failed: {}", pid, e));
        }
    }

    session.list_processes_matching(name).inspect_err(|e| {
        let _ = logger.warn(&format!("Cannot re-list {} processes: {}", name, e));
    })
}

fn trim_front(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = text.len() - max;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text.drain(..cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_front_keeps_tail_on_char_boundary() {
        let mut text = "ééééé".to_string();

        trim_front(&mut text, 5);

        assert_eq!(text, "éé");
    }

    #[test]
    fn test_trim_front_leaves_short_text() {
        let mut text = "rtsp://".to_string();

        trim_front(&mut text, 64);

        assert_eq!(text, "rtsp://");
    }
}
