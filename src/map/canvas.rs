use std::collections::HashMap;

use tracing::trace;

use super::engine::{
    EngineEvent, FeatureState, LayerSpec, LngLat, MapEngine, MapError, MapOptions, Paint,
    RenderedFeature, SourceData, SourceSpec,
};
use crate::features::FeatureId;
use crate::selection::{SelectionPolygon, polygon_covers};

/// Default click radius for markers, in degrees.
const DEFAULT_HIT_TOLERANCE_DEG: f64 = 0.01;

/// In-process engine painted by the egui map view.
///
/// Holds sources, layers in paint order (last is topmost) and feature-state.
/// Vector-tile sources are tracked but contain no queryable features.
pub struct CanvasEngine {
    style_url: String,
    sources: Vec<SourceSpec>,
    layers: Vec<LayerSpec>,
    feature_state: HashMap<(String, FeatureId), FeatureState>,
    events: Vec<EngineEvent>,
    hit_tolerance_deg: f64,
}

impl CanvasEngine {
    pub fn new(options: &MapOptions) -> Self {
        Self {
            style_url: options.style_url.clone(),
            sources: Vec::new(),
            layers: Vec::new(),
            feature_state: HashMap::new(),
            events: vec![EngineEvent::StyleLoaded],
            hit_tolerance_deg: DEFAULT_HIT_TOLERANCE_DEG,
        }
    }

    /// Queue an event as if the engine raised it.
    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Marker hit radius; the view updates it as the zoom changes.
    pub fn set_hit_tolerance_deg(&mut self, tolerance: f64) {
        if tolerance.is_finite() && tolerance > 0.0 {
            self.hit_tolerance_deg = tolerance;
        }
    }

    pub fn hit_tolerance_deg(&self) -> f64 {
        self.hit_tolerance_deg
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn source(&self, id: &str) -> Option<&SourceData> {
        self.sources
            .iter()
            .find(|source| source.id == id)
            .map(|source| &source.data)
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    fn hits_in_layer(&self, layer: &LayerSpec, at: LngLat) -> Vec<RenderedFeature> {
        let Some(SourceData::GeoJson(collection)) = self.source(&layer.source) else {
            return Vec::new();
        };
        collection
            .features
            .iter()
            .rev()
            .filter(|feature| {
                feature
                    .geometry
                    .as_ref()
                    .is_some_and(|geometry| self.geometry_hit(&layer.paint, &geometry.value, at))
            })
            .map(|feature| RenderedFeature {
                layer_id: layer.id.clone(),
                source_id: layer.source.clone(),
                feature_id: feature_id(feature),
                properties: feature.properties.clone().unwrap_or_default(),
            })
            .collect()
    }

    fn geometry_hit(&self, paint: &Paint, value: &geojson::Value, at: LngLat) -> bool {
        match (paint, value) {
            (Paint::Markers { .. }, geojson::Value::Point(position)) if position.len() >= 2 => {
                let dx = position[0] - at.lon;
                let dy = position[1] - at.lat;
                (dx * dx + dy * dy).sqrt() <= self.hit_tolerance_deg
            }
            (Paint::Choropleth { .. }, geojson::Value::Polygon(_)) => polygon_hit(value, at),
            (Paint::Choropleth { .. }, geojson::Value::MultiPolygon(parts)) => parts
                .iter()
                .any(|rings| polygon_hit(&geojson::Value::Polygon(rings.clone()), at)),
            _ => false,
        }
    }
}

fn polygon_hit(value: &geojson::Value, at: LngLat) -> bool {
    SelectionPolygon::from_geojson_value(value)
        .is_ok_and(|polygon| !polygon.is_empty() && polygon_covers(&polygon, at.lon, at.lat))
}

pub(crate) fn feature_id(feature: &geojson::Feature) -> Option<FeatureId> {
    match feature.id.as_ref()? {
        geojson::feature::Id::Number(number) => number.as_u64().map(FeatureId),
        geojson::feature::Id::String(text) => text.parse().ok().map(FeatureId),
    }
}

impl MapEngine for CanvasEngine {
    fn style_url(&self) -> &str {
        &self.style_url
    }

    fn add_source(&mut self, spec: SourceSpec) -> Result<(), MapError> {
        if self.has_source(&spec.id) {
            return Err(MapError::DuplicateSource(spec.id));
        }
        trace!(source = %spec.id, "add source");
        self.events.push(EngineEvent::SourceLoaded {
            source_id: spec.id.clone(),
        });
        self.sources.push(spec);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        let position = self
            .sources
            .iter()
            .position(|source| source.id == id)
            .ok_or_else(|| MapError::UnknownSource(id.to_string()))?;
        let users: Vec<String> = self
            .layers
            .iter()
            .filter(|layer| layer.source == id)
            .map(|layer| layer.id.clone())
            .collect();
        if !users.is_empty() {
            return Err(MapError::SourceInUse {
                source_id: id.to_string(),
                layers: users,
            });
        }
        self.sources.remove(position);
        self.feature_state.retain(|(source, _), _| source != id);
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.iter().any(|source| source.id == id)
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError> {
        if self.has_layer(&spec.id) {
            return Err(MapError::DuplicateLayer(spec.id));
        }
        if !self.has_source(&spec.source) {
            return Err(MapError::MissingSource {
                layer: spec.id,
                source_id: spec.source,
            });
        }
        self.layers.push(spec);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        let index = self
            .layer_index(id)
            .ok_or_else(|| MapError::UnknownLayer(id.to_string()))?;
        self.layers.remove(index);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer_index(id).is_some()
    }

    fn set_layout_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), MapError> {
        let index = self
            .layer_index(layer_id)
            .ok_or_else(|| MapError::UnknownLayer(layer_id.to_string()))?;
        self.layers[index].visible = visible;
        Ok(())
    }

    fn layout_visibility(&self, layer_id: &str) -> Option<bool> {
        self.layer_index(layer_id).map(|index| self.layers[index].visible)
    }

    fn set_feature_state(&mut self, source_id: &str, id: FeatureId, state: FeatureState) {
        self.feature_state.insert((source_id.to_string(), id), state);
    }

    fn feature_state(&self, source_id: &str, id: FeatureId) -> Option<FeatureState> {
        self.feature_state.get(&(source_id.to_string(), id)).copied()
    }

    fn remove_feature_state(&mut self, source_id: &str, id: FeatureId) {
        self.feature_state.remove(&(source_id.to_string(), id));
    }

    fn query_rendered_features(&self, at: LngLat, layer_ids: &[String]) -> Vec<RenderedFeature> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.visible)
            .filter(|layer| layer_ids.is_empty() || layer_ids.iter().any(|id| *id == layer.id))
            .flat_map(|layer| self.hits_in_layer(layer, at))
            .collect()
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}
