use std::path::Path;

use tracing::{debug, info, warn};

use super::EguiController;
use super::jobs::{JobMessage, MarkersToggledResult};
use crate::backend::{BackendError, MarkerBackend};
use crate::egui_app::ui::style::StatusTone;
use crate::features::{FeatureId, ServedRecord};
use crate::map::{LngLat, MARKERS_SOURCE, SourceData};
use crate::selection::{SelectionPolygon, SpatialIndex};
use crate::staging::{CommitOutcome, StagingError, StagingState};

impl EguiController {
    pub fn start_drawing(&mut self) {
        self.ui.map.draw.reset();
        self.ui.map.draw.active = true;
        self.set_status(
            "Click to add vertices, double-click or Enter to finish",
            StatusTone::Busy,
        );
    }

    pub fn cancel_drawing(&mut self) {
        if self.ui.map.draw.active {
            self.ui.map.draw.reset();
            self.set_status("Selection cancelled", StatusTone::Idle);
        }
    }

    pub fn add_draw_vertex(&mut self, at: LngLat) {
        if self.ui.map.draw.active {
            self.ui.map.draw.vertices.push((at.lon, at.lat));
        }
    }

    /// Close the drawn ring and stage the features inside it.
    pub fn finish_drawing(&mut self) -> usize {
        if !self.ui.map.draw.can_finish() {
            self.set_status("A selection needs at least three points", StatusTone::Warning);
            return 0;
        }
        let polygon = SelectionPolygon::from_ring(&self.ui.map.draw.vertices);
        self.ui.map.draw.reset();
        self.stage_polygon(&polygon)
    }

    /// Stage every loaded location inside `polygon` as one batch.
    pub fn stage_polygon(&mut self, polygon: &SelectionPolygon) -> usize {
        let ids = self.select_ids(polygon);
        let staged = match self.staging.push_batch(&ids, &self.cache, &mut self.session) {
            Ok(0) => {
                self.set_status("No locations inside the selection", StatusTone::Info);
                0
            }
            Ok(count) => {
                self.set_status(format!("Staged {count} locations"), StatusTone::Info);
                count
            }
            Err(err) => {
                self.set_status(err.to_string(), StatusTone::Warning);
                0
            }
        };
        self.refresh_staging_ui();
        staged
    }

    /// Stage the features inside a GeoJSON polygon.
    pub fn stage_geojson_text(&mut self, text: &str) -> usize {
        match SelectionPolygon::from_geojson_str(text) {
            Ok(polygon) => self.stage_polygon(&polygon),
            Err(err) => {
                warn!("Rejected selection polygon: {err}");
                self.set_status(format!("Invalid selection polygon: {err}"), StatusTone::Warning);
                0
            }
        }
    }

    /// Prompt for a GeoJSON file and stage the features inside it.
    pub fn import_selection_polygon(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("GeoJSON", &["geojson", "json"])
            .pick_file()
        else {
            return;
        };
        self.stage_geojson_file(&path);
    }

    fn stage_geojson_file(&mut self, path: &Path) -> usize {
        match std::fs::read_to_string(path) {
            Ok(text) => self.stage_geojson_text(&text),
            Err(err) => {
                warn!(path = %path.display(), "Failed to read polygon: {err}");
                self.set_status(format!("Failed to read {}: {err}", path.display()), StatusTone::Error);
                0
            }
        }
    }

    fn select_ids(&mut self, polygon: &SelectionPolygon) -> Vec<FeatureId> {
        let index = match self.index.take() {
            Some(index) if index.is_current(&self.cache) => index,
            _ => SpatialIndex::build(&self.cache),
        };
        let ids = index.select(polygon, &self.cache);
        self.index = Some(index);
        ids
    }

    pub fn undo_last_batch(&mut self) {
        match self.staging.undo(&mut self.cache, &mut self.session) {
            Some(count) => self.set_status(format!("Reverted {count} locations"), StatusTone::Info),
            None => self.set_status("Nothing to undo", StatusTone::Idle),
        }
        self.refresh_staging_ui();
    }

    pub fn mark_last_batch_unserved(&mut self) {
        let changed = self.staging.mark_unserved(&mut self.cache, &mut self.session);
        if changed > 0 {
            self.set_status(format!("Marked {changed} locations unserved"), StatusTone::Info);
        }
        self.refresh_staging_ui();
    }

    /// Send every staged batch in one request on a worker thread.
    pub fn submit_staged_changes(&mut self) {
        let payload = match self.staging.begin_commit(&self.cache) {
            Ok(payload) => payload,
            Err(err @ (StagingError::NothingStaged | StagingError::Submitting)) => {
                self.set_status(err.to_string(), StatusTone::Warning);
                return;
            }
            Err(err) => {
                self.set_status(err.to_string(), StatusTone::Error);
                return;
            }
        };
        self.refresh_staging_ui();
        self.jobs.commit_in_progress = true;
        let records = payload.records;
        let count = records.len();
        info!(records = count, "Submitting staged changes");
        self.set_status(format!("Submitting {count} changes"), StatusTone::Busy);
        let backend = self.backend.clone();
        self.jobs.spawn(move || {
            JobMessage::MarkersToggled(MarkersToggledResult {
                records: count,
                result: backend.toggle_markers(&records),
            })
        });
    }

    /// Settle the staging stack and reload markers, whatever the server said.
    pub(super) fn apply_markers_toggled(&mut self, message: MarkersToggledResult) {
        self.jobs.commit_in_progress = false;
        let outcome = self
            .staging
            .finish_commit(message.result.is_ok(), &self.cache, &mut self.session);
        self.refresh_staging_ui();
        match message.result {
            Ok(server_message) => {
                info!(records = message.records, %server_message, "Staged changes submitted");
                self.set_status(format!("Submitted {} changes", message.records), StatusTone::Info);
            }
            Err(err) => {
                if let CommitOutcome::Retained { batches } = outcome {
                    info!(batches, "Kept staged batches after failed submit");
                }
                self.report_backend_error("Submit changes", err);
            }
        }
        if self.jobs.served_data_in_progress {
            self.jobs.reload_after_current = true;
        } else {
            self.load_markers();
        }
    }

    /// Manual reload from the top bar; refused while a submission is out.
    pub fn reload_data(&mut self) {
        if !self.can_reload_data() {
            self.set_status("Wait for the submission to finish", StatusTone::Warning);
            return;
        }
        self.load_markers();
        self.load_hex_data();
    }

    pub fn can_reload_data(&self) -> bool {
        !self.jobs.served_data_in_progress
            && !self.jobs.commit_in_progress
            && self.staging.state() != StagingState::Submitting
    }

    /// Fetch served data and rebuild the markers source.
    pub fn load_markers(&mut self) {
        if self.jobs.served_data_in_progress {
            return;
        }
        self.jobs.served_data_in_progress = true;
        self.jobs.served_data_requests += 1;
        self.ui.loading_markers = true;
        let backend = self.backend.clone();
        self.jobs
            .spawn(move || JobMessage::ServedDataLoaded(backend.fetch_served_data()));
    }

    pub(super) fn apply_served_data(&mut self, result: Result<Vec<ServedRecord>, BackendError>) {
        self.jobs.served_data_in_progress = false;
        self.ui.loading_markers = false;
        if std::mem::take(&mut self.jobs.reload_after_current) {
            debug!("Dropping served data fetched before the last commit");
            self.load_markers();
            return;
        }
        let records = match result {
            Ok(records) => records,
            Err(err) => {
                self.report_backend_error("Load served data", err);
                return;
            }
        };
        self.cache.replace(records);
        self.index = Some(SpatialIndex::build(&self.cache));
        self.ui.map.hovered = None;
        let data = SourceData::GeoJson(self.cache.to_feature_collection());
        if let Err(err) = self.reload_source(MARKERS_SOURCE, data) {
            warn!("Markers reload failed: {err}");
            self.set_status(format!("Failed to show locations: {err}"), StatusTone::Error);
            return;
        }
        let replayed = self.staging.restage(&mut self.cache, &mut self.session);
        if replayed > 0 {
            info!(replayed, "Re-applied staged previews after reload");
        }
    }
}
