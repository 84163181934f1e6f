use eframe::egui::{self, Frame, Margin, RichText, StrokeKind};

use super::EguiApp;
use super::style;

pub(super) fn action_button(label: &str) -> egui::Button<'_> {
    egui::Button::new(RichText::new(label).color(style::palette().text_primary))
}

pub(super) fn destructive_button(label: &str) -> egui::Button<'_> {
    egui::Button::new(RichText::new(label).color(style::palette().warning))
}

impl EguiApp {
    pub(super) fn render_top_bar(&mut self, ctx: &egui::Context) {
        let palette = style::palette();
        egui::TopBottomPanel::top("top_bar")
            .frame(
                Frame::new()
                    .fill(palette.bg_primary)
                    .stroke(style::section_stroke())
                    .inner_margin(Margin::symmetric(8, 4)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Covermap").color(palette.accent_mint).strong());
                    ui.separator();
                    self.render_style_picker(ui);
                    ui.separator();
                    if ui
                        .add_enabled(
                            self.controller.can_reload_data(),
                            action_button("Reload data"),
                        )
                        .clicked()
                    {
                        self.controller.reload_data();
                    }
                    if ui.add(action_button("Reload tiles")).clicked() {
                        self.controller.reload_tiles();
                    }
                    ui.separator();
                    let drawing = self.controller.ui.map.draw.active;
                    if drawing {
                        if ui
                            .add_enabled(
                                self.controller.ui.map.draw.can_finish(),
                                action_button("Finish selection"),
                            )
                            .clicked()
                        {
                            self.controller.finish_drawing();
                        }
                        if ui.add(destructive_button("Cancel")).clicked() {
                            self.controller.cancel_drawing();
                        }
                    } else if ui.add(action_button("Draw selection")).clicked() {
                        self.controller.start_drawing();
                    }
                    if ui
                        .add_enabled(!drawing, action_button("Import polygon..."))
                        .clicked()
                    {
                        self.controller.import_selection_polygon();
                    }
                    if self.controller.ui.loading_markers {
                        ui.spinner();
                    }
                });
            });
    }

    fn render_style_picker(&mut self, ui: &mut egui::Ui) {
        let styles = self.controller.settings().map.styles.clone();
        let current = self.controller.ui.style_name.clone();
        let mut picked = None;
        egui::ComboBox::from_id_salt("base_style")
            .selected_text(current.as_str())
            .show_ui(ui, |ui| {
                for choice in &styles {
                    if ui
                        .selectable_label(choice.name == current, choice.name.as_str())
                        .clicked()
                    {
                        picked = Some(choice.url.clone());
                    }
                }
            });
        if let Some(url) = picked {
            self.controller.set_base_style(&url);
        }
    }

    pub(super) fn render_status(&mut self, ctx: &egui::Context) {
        let palette = style::palette();
        egui::TopBottomPanel::bottom("status_bar")
            .frame(
                Frame::new()
                    .fill(palette.bg_primary)
                    .stroke(style::section_stroke())
                    .inner_margin(Margin::symmetric(8, 4)),
            )
            .show(ctx, |ui| {
                let status = self.controller.ui.status.clone();
                ui.horizontal(|ui| {
                    ui.add_space(6.0);
                    let (badge_rect, _) =
                        ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
                    ui.painter().rect_filled(badge_rect, 0.0, status.badge_color);
                    ui.painter().rect_stroke(
                        badge_rect,
                        0.0,
                        style::inner_border(),
                        StrokeKind::Inside,
                    );
                    ui.add_space(8.0);
                    ui.label(RichText::new(&status.badge_label).color(palette.text_primary));
                    ui.separator();
                    ui.label(RichText::new(&status.text).color(palette.text_primary))
                        .on_hover_text(status.log_text());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let cache = self.controller.cache();
                        ui.label(
                            RichText::new(format!(
                                "{} locations, {} served",
                                cache.len(),
                                cache.served_count()
                            ))
                            .color(palette.text_muted),
                        );
                    });
                });
            });
    }

    pub(super) fn render_session_expired(&mut self, ctx: &egui::Context) {
        if !self.controller.ui.session.expired {
            return;
        }
        let palette = style::palette();
        let modal = egui::Modal::new(egui::Id::new("session_expired")).show(ctx, |ui| {
            ui.set_width(320.0);
            ui.heading(RichText::new("Session expired").color(palette.text_primary));
            ui.add_space(4.0);
            ui.label(
                RichText::new("Your sign-in is no longer valid. Sign in again in the browser, then reload the data.")
                    .color(palette.text_muted),
            );
            ui.label(
                RichText::new(&self.controller.ui.session.login_url)
                    .color(palette.accent_ice)
                    .monospace(),
            );
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.add(action_button("Sign in")).clicked() {
                    self.controller.open_login_page();
                }
                if ui.add(action_button("Dismiss")).clicked() {
                    self.controller.dismiss_session_expired();
                }
            });
        });
        if modal.should_close() {
            self.controller.dismiss_session_expired();
        }
    }
}
