use crate::canvas::{Canvas, DrawingSurface};
use crate::components::controls::{ControlsAction, ControlsPanel};
use crate::ops::predict::{PredictionClient, PredictionDisplay, PredictionQueue};
use crate::settings::PadSettings;
use eframe::egui;

// ============================================================================
// DIGIT PAD APPLICATION
// ============================================================================

pub struct DigitPadApp {
    settings: PadSettings,
    surface: DrawingSurface,
    canvas: Canvas,
    controls: ControlsPanel,
    display: PredictionDisplay,
    /// `None` when the HTTP client could not be built; Predict then only logs.
    client: Option<PredictionClient>,
    predictions: PredictionQueue,
}

impl DigitPadApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: PadSettings) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let density = settings
            .density
            .unwrap_or_else(|| cc.egui_ctx.pixels_per_point());
        let mut surface = DrawingSurface::new(settings.canvas_size, settings.canvas_size, density);
        surface.set_stroke_width(settings.default_width);
        surface.set_stroke_color(settings.default_color);

        let client = match PredictionClient::new(&settings) {
            Ok(c) => Some(c),
            Err(e) => {
                log::error!("could not build prediction client: {}", e);
                None
            }
        };

        log::info!(
            "pad ready: {}px logical, endpoint {}",
            settings.canvas_size,
            settings.endpoint
        );

        Self {
            canvas: Canvas::new(settings.density),
            controls: ControlsPanel::new(&settings),
            settings,
            surface,
            display: PredictionDisplay::default(),
            client,
            predictions: PredictionQueue::default(),
        }
    }

    fn clear(&mut self) {
        self.surface.clear();
        self.display.reset();
        log::debug!("pad cleared");
    }

    fn predict(&mut self) {
        if self.surface.is_blank() {
            log::info!("pad is empty, not sending a prediction request");
            return;
        }
        let Some(client) = self.client.clone() else {
            log::error!("no prediction client available");
            return;
        };
        match self.surface.export_image() {
            Ok(image) => {
                log::debug!("sending {} byte PNG", image.png.len());
                self.predictions.submit(client, image, &self.display);
            }
            Err(e) => log::error!("export failed: {}", e),
        }
    }

    fn endpoint(&self) -> &str {
        self.client
            .as_ref()
            .map_or(self.settings.endpoint.as_str(), PredictionClient::endpoint)
    }
}

impl eframe::App for DigitPadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll prediction results ---
        self.predictions.poll(&mut self.display);
        self.controls.pending = self.predictions.is_pending();
        if self.controls.pending {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(12.0);
                ui.heading("Digit Recognizer");
                ui.add_space(12.0);

                let pad = self.canvas.show(ui, &mut self.surface);
                if pad.hovered {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
                }
                if pad.stroke_ended {
                    log::debug!("stroke finished");
                }
                ui.add_space(10.0);

                match self.controls.show(ui, &self.display) {
                    ControlsAction::WidthChanged(w) => self.surface.set_stroke_width(w),
                    ControlsAction::ColorChanged(c) => self.surface.set_stroke_color(c),
                    ControlsAction::Clear => self.clear(),
                    ControlsAction::Predict => self.predict(),
                    ControlsAction::None => {}
                }

                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new(format!("→ {}", self.endpoint()))
                        .small()
                        .weak(),
                );
            });
        });
    }
}
