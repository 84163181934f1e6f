use tracing::{debug, info, warn};

use super::EguiController;
use super::jobs::JobMessage;
use crate::backend::BackendError;
use crate::egui_app::state::{InspectedFeature, LayerPanelState};
use crate::egui_app::ui::style::StatusTone;
use crate::layers::{self, ActiveLayer};
use crate::map::{
    EngineEvent, HEX_SOURCE, LayerSpec, LngLat, MARKERS_LAYER, MARKERS_SOURCE, MapError, Paint,
    RenderedFeature, SourceData, SourceSpec,
};

/// Vector tiles served by the backend; registered but not painted.
pub(crate) const TILES_SOURCE: &str = "coverage-tiles";
/// Static hex aggregate asset fetched at start-up.
pub(crate) const HEX_DATA_PATH: &str = "data.geojson";

const HEX_FILL_OPACITY: f32 = 0.55;
const MARKER_RADIUS: f32 = 4.0;
const SERVED_COLOR: &str = "#66b088";
const UNSERVED_COLOR: &str = "#c08060";
const PENDING_COLOR: &str = "#7fffd4";

/// Map callbacks run inside the session; they report back through this.
#[derive(Debug)]
pub(crate) enum MapNotice {
    SourceLoaded(String),
    FeatureClicked(RenderedFeature),
}

pub(crate) fn empty_collection() -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

impl EguiController {
    /// Register sources and layers, bottom to top: hex fills, tiles, markers.
    pub(super) fn install_map_layers(&mut self) -> Result<(), MapError> {
        let active = self.ui.layers.active;
        self.session.add_source(SourceSpec {
            id: HEX_SOURCE.to_string(),
            data: SourceData::GeoJson(empty_collection()),
        })?;
        for layer in ActiveLayer::ALL {
            self.session.add_layer(LayerSpec {
                id: layer.layer_id().to_string(),
                source: HEX_SOURCE.to_string(),
                paint: Paint::Choropleth {
                    property: layer.property().to_string(),
                    stops: layers::color_stops(layer),
                    opacity: HEX_FILL_OPACITY,
                },
                visible: layer == active,
            })?;
        }
        self.session.add_source(SourceSpec {
            id: TILES_SOURCE.to_string(),
            data: SourceData::VectorTiles {
                tiles: vec![self.backend.tile_url_template()],
            },
        })?;
        self.session.add_source(SourceSpec {
            id: MARKERS_SOURCE.to_string(),
            data: SourceData::GeoJson(self.cache.to_feature_collection()),
        })?;
        self.session.add_layer(LayerSpec {
            id: MARKERS_LAYER.to_string(),
            source: MARKERS_SOURCE.to_string(),
            paint: Paint::Markers {
                radius: MARKER_RADIUS,
                served_color: SERVED_COLOR.to_string(),
                unserved_color: UNSERVED_COLOR.to_string(),
                pending_color: PENDING_COLOR.to_string(),
            },
            visible: true,
        })?;

        let mut clickable = vec![MARKERS_LAYER.to_string()];
        clickable.extend(layers::LAYER_REGISTRY.iter().map(|id| id.to_string()));
        let tx = self.notice_tx.clone();
        self.session.attach_click_handler(clickable, move |feature| {
            let _ = tx.send(MapNotice::FeatureClicked(feature.clone()));
        });
        layers::apply_visibility(active, &mut self.session);
        Ok(())
    }

    pub(super) fn drain_map_notices(&mut self) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            match notice {
                MapNotice::SourceLoaded(source_id) => self.on_source_loaded(&source_id),
                MapNotice::FeatureClicked(feature) => {
                    self.ui.map.inspected = Some(inspect(&feature));
                }
            }
        }
    }

    fn on_source_loaded(&mut self, source_id: &str) {
        let active = self.ui.layers.active;
        let applied = layers::apply_visibility(active, &mut self.session);
        self.ui.layers = LayerPanelState::new(active);
        debug!(source = source_id, applied, "Source loaded, visibility re-applied");
        if source_id == MARKERS_SOURCE {
            self.set_status(
                format!(
                    "{} locations loaded ({} served)",
                    self.cache.len(),
                    self.cache.served_count()
                ),
                StatusTone::Info,
            );
        }
    }

    /// Replace `source_id`'s data and re-apply visibility once it has loaded.
    pub(super) fn reload_source(&mut self, source_id: &str, data: SourceData) -> Result<(), MapError> {
        let tx = self.notice_tx.clone();
        let loaded = source_id.to_string();
        self.session.reload_data_source(source_id, data, move |_| {
            let _ = tx.send(MapNotice::SourceLoaded(loaded));
        })?;
        Ok(())
    }

    /// Show only the hex layer for `layer` and persist the choice.
    pub fn set_active_layer(&mut self, layer: ActiveLayer) {
        if self.ui.layers.active == layer {
            return;
        }
        let applied = layers::apply_visibility(layer, &mut self.session);
        self.ui.layers = LayerPanelState::new(layer);
        info!(layer = layer.label(), applied, "Active layer changed");
        self.settings.map.active_layer = layer;
        self.persist_settings();
    }

    /// Swap the base map style, keeping data layers and staged previews.
    pub fn set_base_style(&mut self, url: &str) {
        match self.session.set_base_style(url) {
            Ok(false) => {}
            Ok(true) => {
                layers::apply_visibility(self.ui.layers.active, &mut self.session);
                self.staging.restage(&mut self.cache, &mut self.session);
                self.settings.map.style_url = url.to_string();
                self.ui.style_name = super::style_name(&self.settings, url);
                self.persist_settings();
                self.set_status(format!("Base map: {}", self.ui.style_name), StatusTone::Info);
            }
            Err(err) => {
                warn!(%url, "Restyle failed: {err}");
                self.set_status(format!("Failed to switch base map: {err}"), StatusTone::Error);
            }
        }
    }

    /// Re-register the backend's vector tile source.
    pub fn reload_tiles(&mut self) {
        let data = SourceData::VectorTiles {
            tiles: vec![self.backend.tile_url_template()],
        };
        if let Err(err) = self.reload_source(TILES_SOURCE, data) {
            warn!("Tile reload failed: {err}");
            self.set_status(format!("Failed to reload tiles: {err}"), StatusTone::Error);
        }
    }

    /// Route a click at `at` to the map. `tolerance_deg` is the marker hit
    /// radius for the current zoom.
    pub fn map_clicked(&mut self, at: LngLat, tolerance_deg: f64) {
        if let Some(engine) = self.session.engine_mut() {
            engine.set_hit_tolerance_deg(tolerance_deg);
        }
        self.ui.map.inspected = None;
        self.session.dispatch(EngineEvent::Click { at });
        self.drain_map_notices();
    }

    pub fn load_hex_data(&mut self) {
        if self.jobs.hex_data_in_progress {
            return;
        }
        self.jobs.hex_data_in_progress = true;
        let backend = self.backend.clone();
        self.jobs
            .spawn(move || JobMessage::HexDataLoaded(backend.fetch_geojson(HEX_DATA_PATH)));
    }

    pub(super) fn apply_hex_data(&mut self, result: Result<geojson::FeatureCollection, BackendError>) {
        self.jobs.hex_data_in_progress = false;
        match result {
            Ok(collection) => {
                let count = collection.features.len();
                if let Err(err) = self.reload_source(HEX_SOURCE, SourceData::GeoJson(collection)) {
                    warn!("Hex reload failed: {err}");
                    self.set_status(format!("Failed to show hex data: {err}"), StatusTone::Error);
                    return;
                }
                info!(hexes = count, "Hex aggregates loaded");
            }
            Err(err) => self.report_backend_error("Load coverage hexes", err),
        }
    }
}

fn inspect(feature: &RenderedFeature) -> InspectedFeature {
    let mut properties: Vec<(String, String)> = feature
        .properties
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect();
    properties.sort();
    InspectedFeature {
        layer_id: feature.layer_id.clone(),
        feature_id: feature.feature_id,
        properties,
    }
}
