use crate::device_shell::commands;
use crate::error::ShellError;

pub use crate::library::process::CommandOutput;

/// Byte a pseudo terminal turns into SIGINT.
pub const CTRL_C: u8 = 0x03;

pub trait RemoteShell: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn Session>, ShellError>;
}

/// One open command channel to exactly one board.
pub trait Session: Send {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError>;

    /// Starts `command` behind a remote pseudo terminal.
    fn open_interactive(&mut self, command: &str) -> Result<Box<dyn Channel>, ShellError>;

    fn list_processes_matching(&mut self, name: &str) -> Result<Vec<u32>, ShellError> {
        let output = self.exec(commands::PROCESS_LIST)?;
        Ok(commands::parse_process_list(&output.stdout, name))
    }

    fn close(&mut self);
}

pub trait Channel: Send {
    /// Everything that arrived since the last call, possibly nothing.
    fn read_nonblocking(&mut self) -> Result<Vec<u8>, ShellError>;
    fn send_signal(&mut self, byte: u8) -> Result<(), ShellError>;
    /// True once the remote process is gone and its output fully read.
    fn exited(&mut self) -> bool;
    fn close(&mut self);
}
