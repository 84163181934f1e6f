use eframe::egui::{self, RichText};

use super::EguiApp;
use super::chrome::{action_button, destructive_button};
use super::style;

impl EguiApp {
    /// Floating window listing staged batches while any exist. Hidden while
    /// a submission is in flight.
    pub(super) fn render_pending_changes(&mut self, ctx: &egui::Context) {
        if !self.controller.ui.staging.modal_visible {
            return;
        }
        let palette = style::palette();
        let staging = self.controller.ui.staging.clone();
        egui::Window::new("Pending changes")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 48.0))
            .show(ctx, |ui| {
                ui.label(
                    RichText::new(format!(
                        "{} locations in {} selection{}",
                        staging.features,
                        staging.batches,
                        if staging.batches == 1 { "" } else { "s" }
                    ))
                    .color(palette.text_primary),
                );
                for (idx, size) in staging.batch_sizes.iter().enumerate() {
                    ui.label(
                        RichText::new(format!("#{}: {size} locations", idx + 1))
                            .color(palette.text_muted),
                    );
                }
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui
                        .add(action_button("Mark unserved"))
                        .on_hover_text("Mark the newest selection as unserved")
                        .clicked()
                    {
                        self.controller.mark_last_batch_unserved();
                    }
                    if ui
                        .add(destructive_button("Undo"))
                        .on_hover_text("Drop the newest selection")
                        .clicked()
                    {
                        self.controller.undo_last_batch();
                    }
                    if ui.add(action_button("Submit")).clicked() {
                        self.controller.submit_staged_changes();
                    }
                });
            });
    }
}
