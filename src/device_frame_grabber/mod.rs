pub mod impl_fake;
pub mod impl_ffmpeg;
pub mod interface;
