use std::error::Error;

pub const LINES: usize = 2;
pub const CHARS_PER_LINE: usize = 16;

/// Two line status panel, 16 characters per line.
pub trait DeviceDisplay: Send + Sync {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Write text to a line (0-based); longer text is truncated.
    /// Returns error if line number is invalid (must be 0 or 1)
    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Show whatever was written since the last flush.
    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

pub(crate) fn to_row(text: &str) -> [char; CHARS_PER_LINE] {
    let mut row = [' '; CHARS_PER_LINE];
    for (i, c) in text.chars().take(CHARS_PER_LINE).enumerate() {
        row[i] = c;
    }
    row
}
