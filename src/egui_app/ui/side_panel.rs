use eframe::egui::{self, RichText, StrokeKind};

use super::EguiApp;
use super::chrome::{action_button, destructive_button};
use super::style;
use crate::egui_app::state::SideTab;
use crate::layers::ActiveLayer;
use crate::uploads::FilingKind;

const SIDE_PANEL_WIDTH: f32 = 320.0;

/// Row action picked while iterating a list; applied after the list is drawn.
enum RowAction {
    DeleteFile(u64),
    DeleteExport(u64),
    DownloadExport(u64, String),
    WatchTask(u64),
    CancelTask(u64),
    RemoveUpload(uuid::Uuid),
}

impl EguiApp {
    pub(super) fn render_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("side_panel")
            .resizable(true)
            .default_width(SIDE_PANEL_WIDTH)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for tab in SideTab::ALL {
                        ui.selectable_value(&mut self.controller.ui.side_tab, tab, tab.label());
                    }
                });
                ui.separator();
                let mut action = None;
                egui::ScrollArea::vertical().show(ui, |ui| match self.controller.ui.side_tab {
                    SideTab::Layers => self.render_layers_tab(ui),
                    SideTab::Filings => action = self.render_filings_tab(ui),
                    SideTab::Files => action = self.render_files_tab(ui),
                    SideTab::Exports => action = self.render_exports_tab(ui),
                    SideTab::Tasks => action = self.render_tasks_tab(ui),
                });
                if let Some(action) = action {
                    self.apply_row_action(action);
                }
            });
    }

    fn apply_row_action(&mut self, action: RowAction) {
        match action {
            RowAction::DeleteFile(id) => self.controller.delete_file(id),
            RowAction::DeleteExport(id) => self.controller.delete_export(id),
            RowAction::DownloadExport(id, name) => self.controller.download_export(id, &name),
            RowAction::WatchTask(id) => self.controller.watch_task(id),
            RowAction::CancelTask(id) => self.controller.cancel_task(id),
            RowAction::RemoveUpload(id) => self.controller.remove_upload(id),
        }
    }

    fn render_layers_tab(&mut self, ui: &mut egui::Ui) {
        let palette = style::palette();
        ui.label(RichText::new("Hex layer").color(palette.text_muted));
        let mut picked = None;
        for layer in ActiveLayer::ALL {
            if ui
                .radio(self.controller.ui.layers.active == layer, layer.label())
                .clicked()
            {
                picked = Some(layer);
            }
        }
        if let Some(layer) = picked {
            self.controller.set_active_layer(layer);
        }
        ui.add_space(6.0);
        let legend = &self.controller.ui.layers.legend;
        ui.label(RichText::new(legend.title).color(palette.text_primary).strong());
        for entry in &legend.entries {
            ui.horizontal(|ui| {
                let (swatch, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                ui.painter()
                    .rect_filled(swatch, 0.0, style::parse_hex_color(entry.color));
                ui.painter()
                    .rect_stroke(swatch, 0.0, style::inner_border(), StrokeKind::Inside);
                ui.label(RichText::new(&entry.label).color(palette.text_muted));
            });
        }

        ui.separator();
        ui.label(RichText::new("Selected feature").color(palette.text_muted));
        match &self.controller.ui.map.inspected {
            Some(inspected) => {
                ui.label(RichText::new(&inspected.layer_id).monospace());
                egui::Grid::new("inspected_properties")
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for (key, value) in &inspected.properties {
                            ui.label(RichText::new(key).color(palette.text_muted));
                            ui.label(value);
                            ui.end_row();
                        }
                    });
            }
            None => {
                ui.label(RichText::new("Click a location or hex cell").color(palette.text_muted));
            }
        }
    }

    fn render_filings_tab(&mut self, ui: &mut egui::Ui) -> Option<RowAction> {
        let palette = style::palette();
        let mut action = None;
        let mut kind = self.controller.ui.filing.kind;
        ui.horizontal(|ui| {
            ui.selectable_value(&mut kind, FilingKind::Fiber, FilingKind::Fiber.label());
            ui.selectable_value(&mut kind, FilingKind::Wireless, FilingKind::Wireless.label());
        });
        if kind != self.controller.ui.filing.kind {
            self.controller.set_filing_kind(kind);
        }

        let filing = &mut self.controller.ui.filing;
        egui::Grid::new("filing_form").num_columns(2).show(ui, |ui| {
            ui.label("Provider ID");
            ui.text_edit_singleline(&mut filing.common.provider_id);
            ui.end_row();
            ui.label("Filing period");
            ui.add(egui::TextEdit::singleline(&mut filing.common.filing_period).hint_text("YYYY-MM"));
            ui.end_row();
            ui.label("Technology code");
            ui.text_edit_singleline(&mut filing.common.technology_code);
            ui.end_row();
            ui.label("Max download (Mbps)");
            ui.add(egui::DragValue::new(&mut filing.common.max_download_mbps).range(0..=100_000));
            ui.end_row();
            ui.label("Max upload (Mbps)");
            ui.add(egui::DragValue::new(&mut filing.common.max_upload_mbps).range(0..=100_000));
            ui.end_row();
            ui.label("Low latency");
            ui.checkbox(&mut filing.common.low_latency, "");
            ui.end_row();
            if filing.kind == FilingKind::Wireless {
                ui.label("Antenna height (m)");
                ui.add(egui::DragValue::new(&mut filing.antenna_height_m).range(0.0..=1_000.0));
                ui.end_row();
                ui.label("Coverage radius (km)");
                ui.add(egui::DragValue::new(&mut filing.coverage_radius_km).range(0.0..=500.0));
                ui.end_row();
            }
        });

        ui.separator();
        ui.label(
            RichText::new(format!(
                "{} files, {:.1} MB",
                filing.queued.len(),
                filing.queued_bytes as f64 / (1024.0 * 1024.0)
            ))
            .color(palette.text_muted),
        );
        for item in &filing.queued {
            ui.horizontal(|ui| {
                if ui.small_button("x").on_hover_text("Remove").clicked() {
                    action = Some(RowAction::RemoveUpload(item.id));
                }
                ui.label(&item.file_name).on_hover_text(item.path.display().to_string());
            });
        }
        if let Some(error) = &filing.last_error {
            ui.label(RichText::new(error).color(palette.warning));
        }
        let submitting = filing.submitting;
        let has_files = !filing.queued.is_empty();
        ui.horizontal(|ui| {
            if ui.add(action_button("Add files...")).clicked() {
                self.controller.pick_upload_files();
            }
            if ui.add_enabled(has_files, action_button("Clear")).clicked() {
                self.controller.clear_uploads();
            }
            if ui
                .add_enabled(has_files && !submitting, action_button("Submit filing"))
                .clicked()
            {
                self.controller.submit_filing();
            }
            if submitting {
                ui.spinner();
            }
        });
        action
    }

    fn render_files_tab(&mut self, ui: &mut egui::Ui) -> Option<RowAction> {
        let palette = style::palette();
        if !self.controller.ui.files.loaded_once && !self.controller.ui.files.loading {
            self.controller.refresh_files();
        }
        let mut action = None;
        ui.horizontal(|ui| {
            if ui.add(action_button("Refresh")).clicked() {
                self.controller.refresh_files();
            }
            if self.controller.ui.files.loading {
                ui.spinner();
            }
        });
        if self.controller.ui.files.loaded_once && self.controller.ui.files.rows.is_empty() {
            ui.label(RichText::new("No uploaded files").color(palette.text_muted));
        }
        for row in &self.controller.ui.files.rows {
            ui.horizontal(|ui| {
                if ui.add(destructive_button("Delete")).clicked() {
                    action = Some(RowAction::DeleteFile(row.id));
                }
                ui.label(&row.name);
                if let Some(uploaded_at) = &row.uploaded_at {
                    ui.label(RichText::new(uploaded_at).color(palette.text_muted));
                }
            });
        }
        action
    }

    fn render_exports_tab(&mut self, ui: &mut egui::Ui) -> Option<RowAction> {
        let palette = style::palette();
        if !self.controller.ui.exports.loaded_once && !self.controller.ui.exports.loading {
            self.controller.refresh_exports();
        }
        let mut action = None;
        ui.horizontal(|ui| {
            if ui.add(action_button("Refresh")).clicked() {
                self.controller.refresh_exports();
            }
            if self.controller.ui.exports.loading {
                ui.spinner();
            }
        });
        if self.controller.ui.exports.loaded_once && self.controller.ui.exports.rows.is_empty() {
            ui.label(RichText::new("No exports yet").color(palette.text_muted));
        }
        let downloading = self.controller.ui.exports.downloading;
        for row in &self.controller.ui.exports.rows {
            ui.horizontal(|ui| {
                if ui.add(destructive_button("Delete")).clicked() {
                    action = Some(RowAction::DeleteExport(row.id));
                }
                if downloading == Some(row.id) {
                    ui.spinner();
                } else if ui
                    .add_enabled(downloading.is_none(), action_button("Download"))
                    .clicked()
                {
                    action = Some(RowAction::DownloadExport(row.id, row.name.clone()));
                }
                ui.label(&row.name);
                if let Some(created_at) = &row.created_at {
                    ui.label(RichText::new(created_at).color(palette.text_muted));
                }
            });
        }
        action
    }

    fn render_tasks_tab(&mut self, ui: &mut egui::Ui) -> Option<RowAction> {
        let palette = style::palette();
        let mut action = None;
        ui.horizontal(|ui| {
            if ui.add(action_button("Refresh")).clicked() {
                self.controller.refresh_tasks();
            }
            if self.controller.ui.tasks.watched.is_some()
                && ui.add(action_button("Stop watching")).clicked()
            {
                self.controller.stop_watching();
            }
            if self.controller.ui.tasks.loading {
                ui.spinner();
            }
        });
        if let Some(watched) = &self.controller.ui.tasks.watched {
            ui.group(|ui| {
                ui.label(format!(
                    "Task {}: {} (check {})",
                    watched.task_id,
                    watched.status.label(),
                    watched.attempts
                ));
                if let Some(progress) = watched.runtime.as_ref().and_then(|runtime| runtime.progress()) {
                    ui.add(egui::ProgressBar::new(progress).show_percentage());
                }
            });
        }
        if let Some(outcome) = &self.controller.ui.tasks.last_outcome {
            ui.label(RichText::new(outcome).color(palette.text_muted));
        }
        ui.separator();
        if self.controller.ui.tasks.loaded_once && self.controller.ui.tasks.rows.is_empty() {
            ui.label(RichText::new("No tasks").color(palette.text_muted));
        }
        let watched_id = self.controller.ui.tasks.watched.as_ref().map(|watched| watched.task_id);
        for row in &self.controller.ui.tasks.rows {
            ui.horizontal(|ui| {
                let terminal = row.status.is_terminal();
                if !terminal {
                    if ui.add(destructive_button("Cancel")).clicked() {
                        action = Some(RowAction::CancelTask(row.id));
                    }
                    if watched_id != Some(row.id) && ui.add(action_button("Watch")).clicked() {
                        action = Some(RowAction::WatchTask(row.id));
                    }
                }
                ui.label(&row.name);
                ui.label(RichText::new(row.status.label()).color(palette.text_muted));
            });
        }
        action
    }
}
