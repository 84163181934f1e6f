//! Interface of the map-rendering engine and the data it is fed.

use serde_json::Map as JsonObject;

use crate::features::FeatureId;

/// Longitude/latitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Parameters a map instance is created with.
#[derive(Clone, Debug, PartialEq)]
pub struct MapOptions {
    pub style_url: String,
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceData {
    GeoJson(geojson::FeatureCollection),
    /// Tiled vector source, e.g. `https://host/tiles/{z}/{x}/{y}.pbf`.
    VectorTiles { tiles: Vec<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceSpec {
    pub id: String,
    pub data: SourceData,
}

/// Paint rules, the subset the app uses.
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    /// Location markers colored from feature-state.
    Markers {
        radius: f32,
        served_color: String,
        unserved_color: String,
        pending_color: String,
    },
    /// Polygon fill colored by a step function over one numeric property.
    Choropleth {
        property: String,
        stops: Vec<(f64, String)>,
        opacity: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: Paint,
    pub visible: bool,
}

/// Per-feature overlay kept by the engine, separate from feature properties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureState {
    /// Served value to draw; falls back to the feature's property when unset.
    pub served: Option<bool>,
    /// Feature is part of an unsubmitted selection.
    pub pending: bool,
}

/// A feature hit by a rendered-feature query.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub source_id: String,
    pub feature_id: Option<FeatureId>,
    pub properties: JsonObject<String, serde_json::Value>,
}

/// Notifications the engine raises asynchronously.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    StyleLoaded,
    SourceLoaded { source_id: String },
    Click { at: LngLat },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapError {
    #[error("Map is not initialized")]
    NotInitialized,
    #[error("Source {0} already exists")]
    DuplicateSource(String),
    #[error("Source {0} does not exist")]
    UnknownSource(String),
    #[error("Source {source_id} is still used by layers {layers:?}")]
    SourceInUse {
        source_id: String,
        layers: Vec<String>,
    },
    #[error("Layer {0} already exists")]
    DuplicateLayer(String),
    #[error("Layer {0} does not exist")]
    UnknownLayer(String),
    #[error("Layer {layer} references missing source {source_id}")]
    MissingSource { layer: String, source_id: String },
}

/// Operations the session needs from a rendering engine.
///
/// Engines enforce source/layer integrity: a layer cannot be added before
/// its source, and a source cannot be removed while layers use it.
pub trait MapEngine {
    fn style_url(&self) -> &str;

    fn add_source(&mut self, spec: SourceSpec) -> Result<(), MapError>;
    fn remove_source(&mut self, id: &str) -> Result<(), MapError>;
    fn has_source(&self, id: &str) -> bool;

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), MapError>;
    fn has_layer(&self, id: &str) -> bool;

    fn set_layout_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), MapError>;
    fn layout_visibility(&self, layer_id: &str) -> Option<bool>;

    /// Merge-free replace of one feature's state.
    fn set_feature_state(&mut self, source_id: &str, id: FeatureId, state: FeatureState);
    fn feature_state(&self, source_id: &str, id: FeatureId) -> Option<FeatureState>;
    fn remove_feature_state(&mut self, source_id: &str, id: FeatureId);

    /// Features under `at`, topmost first, restricted to `layer_ids` when
    /// non-empty. Hidden layers are never hit.
    fn query_rendered_features(&self, at: LngLat, layer_ids: &[String]) -> Vec<RenderedFeature>;

    /// Take the events raised since the last call.
    fn drain_events(&mut self) -> Vec<EngineEvent>;
}
