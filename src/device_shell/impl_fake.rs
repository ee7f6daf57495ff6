use crate::device_shell::commands;
use crate::device_shell::interface::{Channel, CommandOutput, RemoteShell, Session, CTRL_C};
use crate::error::ShellError;
use crate::library::logger::interface::Logger;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// What one launch of the vendor program prints, one chunk per read.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeAttempt {
    pub chunks: Vec<String>,
    /// The process dies once every chunk has been read.
    pub exits: bool,
}

impl FakeAttempt {
    pub fn ready() -> Self {
        Self {
            chunks: vec![
                "sensor probe ok\r\n".to_string(),
                "Initialize RTSP\r\n".to_string(),
                "rtsp://192.168.42.1/h264\r\n".to_string(),
            ],
            exits: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            chunks: vec![
                "sensor probe ok\r\n".to_string(),
                "[E] init vpss failed\r\n".to_string(),
            ],
            exits: false,
        }
    }

    pub fn crashed() -> Self {
        Self {
            chunks: vec!["Segmentation fault\r\n".to_string()],
            exits: true,
        }
    }

    pub fn silent() -> Self {
        Self {
            chunks: vec![],
            exits: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeProcess {
    pub pid: u32,
    pub name: String,
}

/// Board state shared between the fake shell and the test that inspects it.
#[derive(Debug)]
pub struct FakeBoard {
    pub reachable: bool,
    pub script_exists: bool,
    pub honors_interrupt: bool,
    pub attempts: VecDeque<FakeAttempt>,
    pub processes: Vec<FakeProcess>,
    pub next_pid: u32,
    pub commands: Vec<String>,
    pub failing_commands: Vec<String>,
    pub launches: u32,
    pub sessions_opened: u32,
    pub sessions_closed: u32,
    pub signals: Vec<u8>,
}

impl Default for FakeBoard {
    fn default() -> Self {
        Self {
            reachable: true,
            script_exists: true,
            honors_interrupt: true,
            attempts: VecDeque::new(),
            processes: Vec::new(),
            next_pid: 400,
            commands: Vec::new(),
            failing_commands: Vec::new(),
            launches: 0,
            sessions_opened: 0,
            sessions_closed: 0,
            signals: Vec::new(),
        }
    }
}

impl FakeBoard {
    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.processes.iter().any(|p| p.name.contains(name))
    }

    fn spawn(&mut self, name: &str) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.push(FakeProcess {
            pid,
            name: name.to_string(),
        });
        pid
    }

    fn remove_pid(&mut self, pid: u32) -> bool {
        let before = self.processes.len();
        self.processes.retain(|p| p.pid != pid);
        before != self.processes.len()
    }

    fn ps(&self) -> String {
        let mut output = String::from("  PID USER     TIME  COMMAND\n");
        for process in &self.processes {
            output.push_str(&format!("{:>5} root      0:00 {}\n", process.pid, process.name));
        }
        output
    }

    fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        self.commands.push(command.to_string());

        if self.failing_commands.iter().any(|c| command.contains(c.as_str())) {
            return Err(ShellError::Channel(format!("injected failure for `{}`", command)));
        }

        let exit_code = if command.starts_with("ls ") {
            if self.script_exists {
                0
            } else {
                2
            }
        } else if command.starts_with("killall ") || command.starts_with("pkill ") {
            // `[s]ample` patterns match like the plain name
            let target = command.replace(['[', ']'], "");
            let before = self.processes.len();
            self.processes.retain(|p| !target.contains(p.name.as_str()));
            if before == self.processes.len() {
                1
            } else {
                0
            }
        } else if let Some(pid) = command.strip_prefix("kill -9 ") {
            match pid.trim().parse() {
                Ok(pid) if self.remove_pid(pid) => 0,
                _ => 1,
            }
        } else if command == commands::PROCESS_LIST {
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: self.ps(),
                stderr: String::new(),
            });
        } else {
            0
        };

        Ok(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

pub struct RemoteShellFake {
    board: Arc<Mutex<FakeBoard>>,
    process_name: String,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl RemoteShellFake {
    pub fn new(process_name: &str, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            board: Arc::new(Mutex::new(FakeBoard::default())),
            process_name: process_name.to_string(),
            logger: logger.with_namespace("shell").with_namespace("fake"),
        }
    }

    pub fn with_attempts(self, attempts: Vec<FakeAttempt>) -> Self {
        lock(&self.board).attempts = attempts.into();
        self
    }

    pub fn with_stale_process(self, name: &str) -> Self {
        lock(&self.board).spawn(name);
        self
    }

    pub fn unreachable(self) -> Self {
        lock(&self.board).reachable = false;
        self
    }

    pub fn ignoring_interrupt(self) -> Self {
        lock(&self.board).honors_interrupt = false;
        self
    }

    pub fn without_script(self) -> Self {
        lock(&self.board).script_exists = false;
        self
    }

    pub fn failing_commands(self, fragment: &str) -> Self {
        lock(&self.board).failing_commands.push(fragment.to_string());
        self
    }

    pub fn board(&self) -> Arc<Mutex<FakeBoard>> {
        self.board.clone()
    }
}

fn lock(board: &Arc<Mutex<FakeBoard>>) -> MutexGuard<'_, FakeBoard> {
    board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RemoteShell for RemoteShellFake {
    fn open_session(&self) -> Result<Box<dyn Session>, ShellError> {
        let mut board = lock(&self.board);
        if !board.reachable {
            let _ = self.logger.info("Board unreachable");
            return Err(ShellError::Connect {
                destination: "root@fake-board".to_string(),
                reason: "Authentication failed".to_string(),
            });
        }
        board.sessions_opened += 1;
        let _ = self.logger.info("Session opened");

        Ok(Box::new(SessionFake {
            board: self.board.clone(),
            process_name: self.process_name.clone(),
            closed: false,
        }))
    }
}

pub struct SessionFake {
    board: Arc<Mutex<FakeBoard>>,
    process_name: String,
    closed: bool,
}

impl Session for SessionFake {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        if self.closed {
            return Err(ShellError::Closed);
        }
        lock(&self.board).exec(command)
    }

    fn open_interactive(&mut self, command: &str) -> Result<Box<dyn Channel>, ShellError> {
        if self.closed {
            return Err(ShellError::Closed);
        }
        let mut board = lock(&self.board);
        board.commands.push(format!("launch {}", command));
        if board.failing_commands.iter().any(|c| command.contains(c.as_str())) {
            return Err(ShellError::Spawn {
                program: command.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        board.launches += 1;
        let attempt = board.attempts.pop_front().unwrap_or_else(FakeAttempt::crashed);
        let pid = board.spawn(&self.process_name);

        Ok(Box::new(ChannelFake {
            board: self.board.clone(),
            pid,
            chunks: attempt.chunks.into(),
            exits: attempt.exits,
            closed: false,
        }))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.board).sessions_closed += 1;
        }
    }
}

pub struct ChannelFake {
    board: Arc<Mutex<FakeBoard>>,
    pid: u32,
    chunks: VecDeque<String>,
    exits: bool,
    closed: bool,
}

impl ChannelFake {
    fn alive(&self) -> bool {
        lock(&self.board).processes.iter().any(|p| p.pid == self.pid)
    }
}

impl Channel for ChannelFake {
    fn read_nonblocking(&mut self) -> Result<Vec<u8>, ShellError> {
        if self.closed {
            return Err(ShellError::Closed);
        }
        let chunk = self.chunks.pop_front().unwrap_or_default();
        if self.chunks.is_empty() && self.exits {
            lock(&self.board).remove_pid(self.pid);
        }
        Ok(chunk.into_bytes())
    }

    fn send_signal(&mut self, byte: u8) -> Result<(), ShellError> {
        if self.closed {
            return Err(ShellError::Closed);
        }
        let mut board = lock(&self.board);
        board.signals.push(byte);
        if byte == CTRL_C && board.honors_interrupt {
            board.remove_pid(self.pid);
        }
        Ok(())
    }

    fn exited(&mut self) -> bool {
        self.chunks.is_empty() && !self.alive()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
