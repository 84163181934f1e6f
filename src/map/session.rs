use tracing::{debug, info};

use super::engine::{
    EngineEvent, FeatureState, LayerSpec, MapEngine, MapError, MapOptions, RenderedFeature,
    SourceData, SourceSpec,
};
use super::events::{EventBus, SubscriptionId};
use crate::features::FeatureId;

type EngineFactory<E> = Box<dyn Fn(&MapOptions) -> E>;

struct ClickHandler {
    layer_ids: Vec<String>,
    handler: Box<dyn FnMut(&RenderedFeature)>,
}

/// Owns one map engine instance and everything added to it.
///
/// Sources and layers are registered with the session as well as the
/// engine, so a restyle can rebuild the engine and put them back.
pub struct MapSession<E: MapEngine> {
    factory: EngineFactory<E>,
    options: MapOptions,
    engine: Option<E>,
    sources: Vec<SourceSpec>,
    layers: Vec<LayerSpec>,
    bus: EventBus<EngineEvent, E>,
    click: Option<ClickHandler>,
    restyles: u64,
}

impl<E: MapEngine> MapSession<E> {
    /// Create the engine for `options`.
    pub fn initialize(options: MapOptions, factory: impl Fn(&MapOptions) -> E + 'static) -> Self {
        info!(style = %options.style_url, zoom = options.zoom, "Creating map");
        let engine = factory(&options);
        Self {
            factory: Box::new(factory),
            options,
            engine: Some(engine),
            sources: Vec::new(),
            layers: Vec::new(),
            bus: EventBus::new(),
            click: None,
            restyles: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// Number of times the engine has been rebuilt for a new base style.
    pub fn restyle_count(&self) -> u64 {
        self.restyles
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.id.as_str())
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.id.as_str())
    }

    pub fn listener_count(&self) -> usize {
        self.bus.len()
    }

    /// Switch the base style.
    ///
    /// The old engine is dropped and a new one created; every registered
    /// source and layer is added again with its last known visibility.
    /// Returns false when `style_url` is already active.
    pub fn set_base_style(&mut self, style_url: &str) -> Result<bool, MapError> {
        if self.engine.is_some() && self.options.style_url == style_url {
            return Ok(false);
        }
        info!(from = %self.options.style_url, to = %style_url, "Switching base style");
        self.engine = None;
        self.options.style_url = style_url.to_string();
        let mut engine = (self.factory)(&self.options);
        for source in &self.sources {
            engine.add_source(source.clone())?;
        }
        for layer in &self.layers {
            engine.add_layer(layer.clone())?;
        }
        self.engine = Some(engine);
        self.restyles += 1;
        Ok(true)
    }

    pub fn add_source(&mut self, spec: SourceSpec) -> Result<(), MapError> {
        let engine = self.engine.as_mut().ok_or(MapError::NotInitialized)?;
        engine.add_source(spec.clone())?;
        self.sources.push(spec);
        Ok(())
    }

    pub fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError> {
        let engine = self.engine.as_mut().ok_or(MapError::NotInitialized)?;
        engine.add_layer(spec.clone())?;
        self.layers.push(spec);
        Ok(())
    }

    /// Replace a source's data.
    ///
    /// Dependent layers are removed first, then the source, then the source
    /// is added back followed by its layers. `on_loaded` runs once, on the
    /// first `SourceLoaded` event for this source, and is then dropped.
    pub fn reload_data_source(
        &mut self,
        source_id: &str,
        data: SourceData,
        on_loaded: impl FnOnce(&mut E) + 'static,
    ) -> Result<SubscriptionId, MapError> {
        let engine = self.engine.as_mut().ok_or(MapError::NotInitialized)?;
        let dependents: Vec<LayerSpec> = self
            .layers
            .iter()
            .filter(|layer| layer.source == source_id)
            .cloned()
            .collect();
        for layer in dependents.iter().rev() {
            if engine.has_layer(&layer.id) {
                engine.remove_layer(&layer.id)?;
            }
        }
        if engine.has_source(source_id) {
            engine.remove_source(source_id)?;
        }
        let spec = SourceSpec {
            id: source_id.to_string(),
            data,
        };
        engine.add_source(spec.clone())?;
        for layer in &dependents {
            engine.add_layer(layer.clone())?;
        }
        match self.sources.iter_mut().find(|source| source.id == source_id) {
            Some(existing) => *existing = spec,
            None => self.sources.push(spec),
        }
        debug!(source = source_id, layers = dependents.len(), "Reloaded data source");

        let wanted = source_id.to_string();
        Ok(self.bus.subscribe_once(
            move |event| matches!(event, EngineEvent::SourceLoaded { source_id } if *source_id == wanted),
            move |_, engine| on_loaded(engine),
        ))
    }

    /// Set a layer's layout visibility.
    ///
    /// Returns false, without error, when the layer is not on the map.
    pub fn set_layout_visibility(&mut self, layer_id: &str, visible: bool) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        if !engine.has_layer(layer_id) {
            return false;
        }
        if engine.set_layout_visibility(layer_id, visible).is_err() {
            return false;
        }
        if let Some(layer) = self.layers.iter_mut().find(|layer| layer.id == layer_id) {
            layer.visible = visible;
        }
        true
    }

    pub fn set_feature_state(&mut self, source_id: &str, id: FeatureId, state: FeatureState) {
        if let Some(engine) = self.engine.as_mut() {
            engine.set_feature_state(source_id, id, state);
        }
    }

    pub fn remove_feature_state(&mut self, source_id: &str, id: FeatureId) {
        if let Some(engine) = self.engine.as_mut() {
            engine.remove_feature_state(source_id, id);
        }
    }

    pub fn feature_state(&self, source_id: &str, id: FeatureId) -> Option<FeatureState> {
        self.engine.as_ref()?.feature_state(source_id, id)
    }

    /// Install the click handler, replacing any previous one.
    ///
    /// On click the topmost rendered feature among `layer_ids` is passed to
    /// `handler`; clicks that hit nothing are ignored.
    pub fn attach_click_handler(
        &mut self,
        layer_ids: Vec<String>,
        handler: impl FnMut(&RenderedFeature) + 'static,
    ) {
        self.click = Some(ClickHandler {
            layer_ids,
            handler: Box::new(handler),
        });
    }

    pub fn detach_click_handler(&mut self) -> bool {
        self.click.take().is_some()
    }

    pub fn subscribe(
        &mut self,
        matches: impl Fn(&EngineEvent) -> bool + 'static,
        callback: impl FnMut(&EngineEvent, &mut E) + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(matches, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Deliver everything the engine raised since the last call.
    pub fn process_events(&mut self) -> usize {
        let Some(engine) = self.engine.as_mut() else {
            return 0;
        };
        let events = engine.drain_events();
        let count = events.len();
        for event in events {
            self.dispatch(event);
        }
        count
    }

    /// Route one event to listeners and, for clicks, the click handler.
    pub fn dispatch(&mut self, event: EngineEvent) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.bus.emit(&event, engine);
        if let EngineEvent::Click { at } = event
            && let Some(click) = self.click.as_mut()
            && let Some(topmost) = engine
                .query_rendered_features(at, &click.layer_ids)
                .into_iter()
                .next()
        {
            (click.handler)(&topmost);
        }
    }

    /// Drop the engine and every listener. Registered sources and layers
    /// are forgotten as well.
    pub fn teardown(&mut self) {
        if self.engine.take().is_some() {
            info!("Map torn down");
        }
        self.bus.clear();
        self.click = None;
        self.sources.clear();
        self.layers.clear();
    }
}
