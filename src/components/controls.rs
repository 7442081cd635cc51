use eframe::egui;
use egui::{Color32, RichText};
use image::Rgba;

use crate::ops::predict::PredictionDisplay;
use crate::settings::{PadSettings, color_to_hex};

/// Action returned from the controls panel
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ControlsAction {
    None,
    WidthChanged(f32),
    ColorChanged(Rgba<u8>),
    Clear,
    Predict,
}

/// Stroke width slider, pen colour, Clear / Predict buttons and the
/// prediction readout.
pub struct ControlsPanel {
    pub width: f32,
    pub color: Color32,
    width_min: f32,
    width_max: f32,
    /// True while a prediction request is in flight.
    pub pending: bool,
}

impl ControlsPanel {
    pub fn new(settings: &PadSettings) -> Self {
        let c = settings.default_color;
        Self {
            width: settings.default_width,
            color: Color32::from_rgb(c[0], c[1], c[2]),
            width_min: settings.width_min,
            width_max: settings.width_max,
            pending: false,
        }
    }

    pub fn color_rgba(&self) -> Rgba<u8> {
        Rgba([self.color.r(), self.color.g(), self.color.b(), 255])
    }

    /// Draw the panel. At most one action is reported per frame; Clear and
    /// Predict win over style edits made in the same frame.
    pub fn show(&mut self, ui: &mut egui::Ui, display: &PredictionDisplay) -> ControlsAction {
        let mut action = ControlsAction::None;

        ui.horizontal(|ui| {
            ui.label(format!("Line Width: {:.0}px", self.width));
            let slider = egui::Slider::new(&mut self.width, self.width_min..=self.width_max)
                .show_value(false);
            if ui.add(slider).changed() {
                action = ControlsAction::WidthChanged(self.width);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Pen Color:");
            if ui
                .color_edit_button_srgba(&mut self.color)
                .on_hover_text(format!("Pen color {}", color_to_hex(self.color_rgba())))
                .changed()
            {
                // Pen colours are always opaque
                self.color = Color32::from_rgb(self.color.r(), self.color.g(), self.color.b());
                action = ControlsAction::ColorChanged(self.color_rgba());
            }
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let clear = egui::Button::new(RichText::new("Clear").color(Color32::WHITE))
                .fill(Color32::from_rgb(239, 68, 68));
            if ui.add(clear).clicked() {
                action = ControlsAction::Clear;
            }
            let predict = egui::Button::new(RichText::new("Predict").color(Color32::WHITE))
                .fill(Color32::from_rgb(59, 130, 246));
            if ui.add_enabled(!self.pending, predict).clicked() {
                action = ControlsAction::Predict;
            }
            if self.pending {
                ui.spinner();
            }
        });

        if let Some(summary) = display.summary() {
            ui.add_space(8.0);
            ui.label(RichText::new(summary).size(18.0).strong());
            let top = display.top(3);
            if !top.is_empty() {
                let ranked: Vec<String> = top
                    .iter()
                    .map(|(digit, p)| format!("{} ({:.0}%)", digit, p * 100.0))
                    .collect();
                ui.label(format!("Top: {}", ranked.join(", ")));
            }
            if let Some(line) = display.probabilities_line() {
                ui.label(RichText::new(format!("Probabilities: {}", line)).small());
            }
        }

        action
    }
}
