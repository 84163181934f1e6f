use std::time::Instant;

use egui::Pos2;

use crate::features::FeatureId;
use crate::map::LngLat;

/// Viewport and interaction state of the map canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct MapViewState {
    pub center: LngLat,
    pub zoom: f64,
    /// Pointer position at the previous drag frame.
    pub last_drag_pos: Option<Pos2>,
    pub draw: DrawState,
    /// Marker under the pointer, for the hover tooltip.
    pub hovered: Option<FeatureId>,
    /// Details of the last clicked feature.
    pub inspected: Option<InspectedFeature>,
    /// Set when the viewport moves; cleared once it has been saved.
    pub viewport_changed_at: Option<Instant>,
}

impl MapViewState {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            last_drag_pos: None,
            draw: DrawState::default(),
            hovered: None,
            inspected: None,
            viewport_changed_at: None,
        }
    }

    pub fn mark_viewport_changed(&mut self) {
        self.viewport_changed_at = Some(Instant::now());
    }
}

impl Default for MapViewState {
    fn default() -> Self {
        Self::new(LngLat::new(0.0, 0.0), 2.0)
    }
}

/// Polygon draw tool. Vertices are `(lon, lat)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawState {
    pub active: bool,
    pub vertices: Vec<(f64, f64)>,
}

impl DrawState {
    pub fn can_finish(&self) -> bool {
        self.vertices.len() >= 3
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.vertices.clear();
    }
}

/// A clicked map feature, flattened for display.
#[derive(Clone, Debug, PartialEq)]
pub struct InspectedFeature {
    pub layer_id: String,
    pub feature_id: Option<FeatureId>,
    /// `(key, value)` pairs sorted by key.
    pub properties: Vec<(String, String)>,
}
