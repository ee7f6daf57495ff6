use crate::device_display::interface::{to_row, DeviceDisplay, CHARS_PER_LINE, LINES};
use eframe::egui;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Panel = [[char; CHARS_PER_LINE]; LINES];

const REPAINT_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone)]
struct DisplayWindow {
    shown: Arc<Mutex<Panel>>,
}

impl eframe::App for DisplayWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let panel = match self.shown.lock() {
            Ok(panel) => *panel,
            Err(poisoned) => *poisoned.into_inner(),
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);

                let border_color = egui::Color32::from_rgb(100, 100, 100);
                let bg_color = egui::Color32::from_rgb(200, 255, 200);

                let rect = ui.available_rect_before_wrap();
                ui.painter().rect_filled(rect, 0.0, bg_color);
                ui.painter()
                    .rect_stroke(rect, 0.0, egui::Stroke::new(2.0, border_color));

                for row in panel.iter() {
                    let text: String = row.iter().collect();
                    ui.label(
                        egui::RichText::new(text)
                            .monospace()
                            .color(egui::Color32::BLACK)
                            .size(20.0),
                    );
                }
            });
        });

        // The controller writes from another thread
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

/// Status panel in a desktop window, for watching a bring-up from the host.
pub struct DeviceDisplayGui {
    display_buffer: Panel,
    shown: Arc<Mutex<Panel>>,
}

impl DeviceDisplayGui {
    pub fn new() -> Self {
        Self {
            display_buffer: [[' '; CHARS_PER_LINE]; LINES],
            shown: Arc::new(Mutex::new([[' '; CHARS_PER_LINE]; LINES])),
        }
    }
}

impl Default for DeviceDisplayGui {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDisplay for DeviceDisplayGui {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let shown = self.shown.clone();

        thread::spawn(move || {
            let options = eframe::NativeOptions {
                viewport: egui::ViewportBuilder::default()
                    .with_inner_size([400.0, 200.0])
                    .with_resizable(false),
                ..Default::default()
            };

            let window = DisplayWindow { shown };

            // Blocks this thread until the window is closed
            let _ = eframe::run_native("Board Camera", options, Box::new(|_cc| Box::new(window)));
        });

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
        let mut shown = self.shown.lock().map_err(|e| e.to_string())?;
        *shown = self.display_buffer;
        Ok(())
    }
}
