use crate::device_display::interface::DeviceDisplay;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Records every flushed panel as two trimmed lines.
#[derive(Clone, Default)]
pub struct DeviceDisplayFake {
    current: [String; 2],
    history: Arc<Mutex<Vec<[String; 2]>>>,
}

impl DeviceDisplayFake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<[String; 2]> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl DeviceDisplay for DeviceDisplayFake {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.current = Default::default();
        Ok(())
    }

    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let slot = self
            .current
            .get_mut(line as usize)
            .ok_or("Invalid line number")?;
        *slot = text.to_string();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.history
            .lock()
            .map_err(|e| e.to_string())?
            .push(self.current.clone());
        Ok(())
    }
}
