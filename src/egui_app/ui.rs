//! egui renderer for the application UI.
mod chrome;
mod map_math;
mod map_render;
mod map_view;
mod pending_changes;
mod side_panel;
pub mod style;

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;

use crate::config::AppSettings;
use crate::egui_app::controller::EguiController;

/// Smallest window the layout still works in.
pub const MIN_VIEWPORT_SIZE: egui::Vec2 = egui::vec2(960.0, 600.0);

const BACKGROUND_REPAINT: Duration = Duration::from_millis(100);

/// Renders the egui UI using the shared controller state.
pub struct EguiApp {
    controller: EguiController,
    visuals_set: bool,
}

impl EguiApp {
    /// Create the app and start the first data loads.
    pub fn new(settings: AppSettings, config_path: Option<PathBuf>) -> Result<Self, String> {
        let mut controller = EguiController::new(settings, config_path)
            .map_err(|err| format!("Failed to reach backend: {err}"))?;
        controller.load_initial_data();
        Ok(Self {
            controller,
            visuals_set: false,
        })
    }

    fn apply_visuals(&mut self, ctx: &egui::Context) {
        if self.visuals_set {
            return;
        }
        let mut visuals = egui::Visuals::dark();
        style::apply_visuals(&mut visuals);
        ctx.set_visuals(visuals);
        self.visuals_set = true;
    }
}

impl eframe::App for EguiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_visuals(ctx);
        self.controller.tick();
        self.render_top_bar(ctx);
        self.render_status(ctx);
        self.render_side_panel(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(style::palette().bg_secondary))
            .show(ctx, |ui| self.render_map_canvas(ui));
        self.render_pending_changes(ctx);
        self.render_session_expired(ctx);
        if self.controller.has_background_work() || self.controller.ui.map.viewport_changed_at.is_some() {
            ctx.request_repaint_after(BACKGROUND_REPAINT);
        }
    }
}
