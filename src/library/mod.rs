pub mod logger;
pub mod process;
pub mod state_machine;
