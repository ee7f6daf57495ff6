pub mod commands;
pub mod impl_fake;
pub mod impl_ssh;
pub mod interface;
