use crate::device_display::interface::{to_row, DeviceDisplay, CHARS_PER_LINE, LINES};
use std::error::Error;

pub struct DeviceDisplayConsole {
    display_buffer: [[char; CHARS_PER_LINE]; LINES],
    shown: Option<[[char; CHARS_PER_LINE]; LINES]>,
}

impl DeviceDisplayConsole {
    pub fn new() -> Self {
        Self {
            display_buffer: [[' '; CHARS_PER_LINE]; LINES],
            shown: None,
        }
    }

    fn render_display(&self) {
        println!("┌────────────────┐");
        for row in &self.display_buffer {
            let text: String = row.iter().collect();
            println!("│{}│", text);
        }
        println!("└────────────────┘");
    }
}

impl Default for DeviceDisplayConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDisplay for DeviceDisplayConsole {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.display_buffer = [[' '; CHARS_PER_LINE]; LINES];
        Ok(())
    }

    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if line as usize >= LINES {
            return Err("Invalid line number".into());
        }
        self.display_buffer[line as usize] = to_row(text);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Unchanged panels are not reprinted
        if self.shown != Some(self.display_buffer) {
            self.render_display();
            self.shown = Some(self.display_buffer);
        }
        Ok(())
    }
}
