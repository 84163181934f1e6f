//! Map session management over a pluggable rendering engine.

mod canvas;
mod engine;
mod events;
mod session;

pub use canvas::CanvasEngine;
pub(crate) use canvas::feature_id;
pub use engine::{
    EngineEvent, FeatureState, LayerSpec, LngLat, MapEngine, MapError, MapOptions, Paint,
    RenderedFeature, SourceData, SourceSpec,
};
pub use events::{EventBus, SubscriptionId};
pub use session::MapSession;

/// Source holding the location markers.
pub const MARKERS_SOURCE: &str = "markers";
/// Circle layer drawing the location markers.
pub const MARKERS_LAYER: &str = "location-markers";
/// Source feeding the hex aggregation fills.
pub const HEX_SOURCE: &str = "hexes";
