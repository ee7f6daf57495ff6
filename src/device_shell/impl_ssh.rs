use crate::config::BoardConfig;
use crate::device_shell::interface::{Channel, CommandOutput, RemoteShell, Session};
use crate::error::ShellError;
use crate::library::logger::interface::Logger;
use crate::library::process;
use secrecy::ExposeSecret;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MASTER_CHECK_INTERVAL: Duration = Duration::from_millis(100);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(3);
const READ_CHUNK: usize = 1024;
/// Chunks held for the controller between polls. Output past this is dropped
/// while the pipe keeps being read, so the remote program never blocks.
const CHANNEL_BACKLOG: usize = 64;

/// Remote shell backed by the system `ssh` binary.
///
/// A session is an OpenSSH control master; every command and interactive
/// channel of that session is multiplexed over its socket, so the password
/// (through `sshpass`) is only ever needed once.
pub struct RemoteShellSsh {
    config: BoardConfig,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl RemoteShellSsh {
    pub fn new(config: BoardConfig, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            config,
            logger: logger.with_namespace("ssh"),
        }
    }

    fn master_command(&self) -> Command {
        let mut command = match &self.config.password {
            Some(password) => {
                let mut command = Command::new("sshpass");
                command
                    .arg("-e")
                    .env("SSHPASS", password.expose_secret())
                    .arg("ssh");
                command
            }
            None => {
                let mut command = Command::new("ssh");
                command.args(["-o", "BatchMode=yes"]);
                command
            }
        };
        command
            .args(common_args(&self.config))
            .args(["-M", "-N"])
            .arg(self.config.destination());
        command
    }
}

impl RemoteShell for RemoteShellSsh {
    fn open_session(&self) -> Result<Box<dyn Session>, ShellError> {
        let destination = self.config.destination();
        let _ = self
            .logger
            .info(&format!("Opening session to {}:{}", destination, self.config.port));

        let mut command = self.master_command();
        let program = command.get_program().to_string_lossy().into_owned();
        let mut master = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ShellError::Spawn {
                program,
                reason: e.to_string(),
            })?;
        let stderr = process::drain(master.stderr.take());

        let deadline = Instant::now() + self.config.connect_timeout + CONTROL_TIMEOUT;
        loop {
            if let Ok(Some(status)) = master.try_wait() {
                let reason = process::join(stderr);
                return Err(ShellError::Connect {
                    destination,
                    reason: if reason.is_empty() {
                        format!("ssh exited with {}", status)
                    } else {
                        reason
                    },
                });
            }

            if control(&self.config, "check").is_ok_and(|output| output.success()) {
                break;
            }

            if Instant::now() >= deadline {
                let _ = master.kill();
                let _ = master.wait();
                return Err(ShellError::Connect {
                    destination,
                    reason: format!("no answer within {:?}", self.config.connect_timeout),
                });
            }

            std::thread::sleep(MASTER_CHECK_INTERVAL);
        }

        let _ = self.logger.info("Session established");

        Ok(Box::new(SessionSsh {
            config: self.config.clone(),
            master: Some(master),
            logger: self.logger.clone(),
        }))
    }
}

fn common_args(config: &BoardConfig) -> Vec<String> {
    vec![
        "-p".to_string(),
        config.port.to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout.as_secs().max(1)),
        "-S".to_string(),
        config.control_path.to_string_lossy().into_owned(),
    ]
}

fn control(config: &BoardConfig, operation: &str) -> Result<CommandOutput, ShellError> {
    let mut command = Command::new("ssh");
    command
        .args(common_args(config))
        .args(["-O", operation])
        .arg(config.destination());
    process::run_with_timeout(command, CONTROL_TIMEOUT)
}

pub struct SessionSsh {
    config: BoardConfig,
    master: Option<Child>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl SessionSsh {
    fn client(&self) -> Result<Command, ShellError> {
        if self.master.is_none() {
            return Err(ShellError::Closed);
        }
        let mut command = Command::new("ssh");
        command
            .args(common_args(&self.config))
            .args(["-o", "ControlMaster=no"]);
        Ok(command)
    }
}

impl Session for SessionSsh {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let mut ssh = self.client()?;
        ssh.arg(self.config.destination()).arg(command);
        process::run_with_timeout(ssh, self.config.command_timeout)
    }

    fn open_interactive(&mut self, command: &str) -> Result<Box<dyn Channel>, ShellError> {
        let mut ssh = self.client()?;
        ssh.arg("-tt").arg(self.config.destination()).arg(command);
        let child = ssh
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ShellError::Spawn {
                program: "ssh".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(ChannelSsh::new(child)))
    }

    fn close(&mut self) {
        if let Some(mut master) = self.master.take() {
            if let Err(e) = control(&self.config, "exit") {
                let _ = self.logger.warn(&format!("Control exit failed: {}", e));
            }
            let _ = master.kill();
            let _ = master.wait();
            let _ = self.logger.info("Session closed");
        }
    }
}

impl Drop for SessionSsh {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct ChannelSsh {
    child: Child,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    drained: bool,
}

impl ChannelSsh {
    fn new(mut child: Child) -> Self {
        let (sender, chunks) = mpsc::sync_channel(CHANNEL_BACKLOG);
        if let Some(stdout) = child.stdout.take() {
            forward(stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward(stderr, sender.clone());
        }
        drop(sender);

        Self {
            stdin: child.stdin.take(),
            child,
            chunks,
            pending: Vec::new(),
            drained: false,
        }
    }

    fn pump(&mut self) {
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.drained = true;
                    break;
                }
            }
        }
    }
}

fn forward<R: Read + Send + 'static>(mut pipe: R, sender: SyncSender<Vec<u8>>) {
    std::thread::spawn(move || {
        let mut buffer = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => match sender.try_send(buffer[..n].to_vec()) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                },
            }
        }
    });
}

impl Channel for ChannelSsh {
    fn read_nonblocking(&mut self) -> Result<Vec<u8>, ShellError> {
        self.pump();
        Ok(std::mem::take(&mut self.pending))
    }

    fn send_signal(&mut self, byte: u8) -> Result<(), ShellError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShellError::Channel("stdin already closed".to_string()))?;
        stdin
            .write_all(&[byte])
            .and_then(|_| stdin.flush())
            .map_err(|e| ShellError::Channel(e.to_string()))
    }

    fn exited(&mut self) -> bool {
        self.pump();
        let gone = !matches!(self.child.try_wait(), Ok(None));
        gone && self.drained && self.pending.is_empty()
    }

    fn close(&mut self) {
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ChannelSsh {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::device_shell::interface::CTRL_C;

    fn channel_for(script: &str) -> ChannelSsh {
        let child = Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        ChannelSsh::new(child)
    }

    fn read_until_exit(channel: &mut ChannelSsh) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = Vec::new();
        while !channel.exited() && Instant::now() < deadline {
            output.extend(channel.read_nonblocking().unwrap());
            std::thread::sleep(Duration::from_millis(10));
        }
        output.extend(channel.read_nonblocking().unwrap());
        String::from_utf8_lossy(&output).to_string()
    }

    #[test]
    fn test_channel_collects_both_streams_before_reporting_exit() {
        let mut channel = channel_for("echo out; echo err >&2");

        let output = read_until_exit(&mut channel);

        assert!(channel.exited());
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn test_signal_byte_reaches_stdin() {
        let mut channel = channel_for("head -c 1 | od -An -tx1");

        channel.send_signal(CTRL_C).unwrap();
        let output = read_until_exit(&mut channel);

        assert!(output.contains("03"));
    }

    #[test]
    fn test_unread_output_is_capped() {
        let mut channel = channel_for("head -c 300000 /dev/zero");
        let deadline = Instant::now() + Duration::from_secs(5);
        while matches!(channel.child.try_wait(), Ok(None)) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        std::thread::sleep(Duration::from_millis(200));

        let output = channel.read_nonblocking().unwrap();

        assert!(!matches!(channel.child.try_wait(), Ok(None)));
        assert!(!output.is_empty());
        assert!(output.len() <= CHANNEL_BACKLOG * READ_CHUNK);
    }

    #[test]
    fn test_close_stops_running_process() {
        let mut channel = channel_for("sleep 30");
        assert!(!channel.exited());

        channel.close();

        assert!(!matches!(channel.child.try_wait(), Ok(None)));
    }

    #[test]
    fn test_common_args_point_at_control_socket() {
        let config = BoardConfig {
            port: 2222,
            ..BoardConfig::default()
        };

        let args = common_args(&config);

        assert_eq!(args[0..2], ["-p".to_string(), "2222".to_string()]);
        assert!(args.contains(&"-S".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
    }
}
