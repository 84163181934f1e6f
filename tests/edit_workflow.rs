mod support;

use std::cell::RefCell;

use covermap::backend::{BackendError, MarkerBackend};
use covermap::config::{self, AppSettings};
use covermap::egui_app::controller::EguiController;
use covermap::features::{FeatureCache, FeatureId, ServedRecord};
use covermap::layers::{self, ActiveLayer, HEX_TESTS_LAYER, LAYER_REGISTRY};
use covermap::map::{
    CanvasEngine, FeatureState, LayerSpec, LngLat, MARKERS_SOURCE, MapEngine, MapOptions, MapSession,
    Paint, SourceData, SourceSpec,
};
use covermap::selection::{SelectionPolygon, SpatialIndex, select_contained_ids};
use covermap::staging::{CommitOutcome, CommitPolicy, EditStagingStack, StagingError, ToggleRecord};
use support::covermap_env::CovermapEnvGuard;

/// Records every submission and answers with a canned result.
struct RecordingBackend {
    fail_with: Option<u16>,
    sent: RefCell<Vec<Vec<ToggleRecord>>>,
}

impl RecordingBackend {
    fn ok() -> Self {
        Self {
            fail_with: None,
            sent: RefCell::new(Vec::new()),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl MarkerBackend for RecordingBackend {
    fn toggle_markers(&self, records: &[ToggleRecord]) -> Result<String, BackendError> {
        self.sent.borrow_mut().push(records.to_vec());
        match self.fail_with {
            Some(status) => Err(BackendError::Server {
                status,
                body: String::new(),
            }),
            None => Ok("ok".to_string()),
        }
    }
}

/// A 10x10 grid of locations between -105..-96 lon and 35..44 lat; even ids
/// start served.
fn grid_cache() -> FeatureCache {
    let mut cache = FeatureCache::new();
    let records = (0..100u64).map(|id| ServedRecord {
        address: format!("{id} Grid St"),
        location_id: id,
        latitude: 35.0 + (id / 10) as f64,
        longitude: -105.0 + (id % 10) as f64,
        served: id % 2 == 0,
    });
    cache.replace(records);
    cache
}

fn map_with_markers(cache: &FeatureCache) -> MapSession<CanvasEngine> {
    let mut session = MapSession::initialize(
        MapOptions {
            style_url: "https://tiles.example/light.json".to_string(),
            center: LngLat::new(-100.0, 40.0),
            zoom: 5.0,
        },
        CanvasEngine::new,
    );
    session
        .add_source(SourceSpec {
            id: MARKERS_SOURCE.to_string(),
            data: SourceData::GeoJson(cache.to_feature_collection()),
        })
        .unwrap();
    session
        .add_layer(LayerSpec {
            id: "markers".to_string(),
            source: MARKERS_SOURCE.to_string(),
            paint: Paint::Markers {
                radius: 4.0,
                served_color: "#66b088".to_string(),
                unserved_color: "#c08060".to_string(),
                pending_color: "#7fffd4".to_string(),
            },
            visible: true,
        })
        .unwrap();
    session
}

fn state(session: &MapSession<CanvasEngine>, id: u64) -> Option<FeatureState> {
    session.feature_state(MARKERS_SOURCE, FeatureId(id))
}

#[test]
fn index_and_linear_scan_agree_on_imported_polygon() {
    let cache = grid_cache();
    let polygon = SelectionPolygon::from_geojson_str(
        r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[-103.5,36.5],[-100.5,36.5],[-100.5,38.5],[-103.5,38.5],[-103.5,36.5]]]}}"#,
    )
    .unwrap();

    let mut linear = select_contained_ids(&polygon, cache.features());
    let mut indexed = SpatialIndex::build(&cache).select(&polygon, &cache);
    linear.sort();
    indexed.sort();
    assert_eq!(linear, indexed);
    // Columns -103..-101 by rows 37..38.
    assert_eq!(linear.len(), 6);
    assert!(linear.contains(&FeatureId(22)));
    assert!(!linear.contains(&FeatureId(21)));
}

#[test]
fn staged_selections_commit_as_one_deduplicated_request() {
    let mut cache = grid_cache();
    let mut session = map_with_markers(&cache);
    let mut stack = EditStagingStack::new(CommitPolicy::ClearAlways);
    let index = SpatialIndex::build(&cache);

    let first = SelectionPolygon::from_ring(&[(-105.5, 34.5), (-102.5, 34.5), (-102.5, 35.5), (-105.5, 35.5)]);
    let second = SelectionPolygon::from_ring(&[(-103.5, 34.5), (-101.5, 34.5), (-101.5, 35.5), (-103.5, 35.5)]);
    let first_ids = index.select(&first, &cache);
    let second_ids = index.select(&second, &cache);
    assert_eq!(stack.push_batch(&first_ids, &cache, &mut session).unwrap(), 3);
    assert_eq!(stack.push_batch(&second_ids, &cache, &mut session).unwrap(), 2);
    assert!(stack.modal_visible());
    assert_eq!(
        state(&session, 0),
        Some(FeatureState {
            served: Some(false),
            pending: true
        })
    );
    assert_eq!(stack.mark_unserved(&mut cache, &mut session), 2);

    let backend = RecordingBackend::ok();
    let mut reloads = 0;
    let outcome = stack
        .commit(&cache, &mut session, &backend, || reloads += 1)
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Cleared { batches: 2 });
    assert_eq!(reloads, 1);
    assert!(stack.is_empty());
    assert!(!stack.modal_visible());

    let sent = backend.sent.borrow();
    assert_eq!(sent.len(), 1);
    let records: Vec<(u64, bool)> = sent[0]
        .iter()
        .map(|record| (record.id.0, record.served))
        .collect();
    // Id 2 sits in both batches but is sent once; only the newest batch was marked.
    assert_eq!(records, vec![(0, true), (1, false), (2, false), (3, false)]);
    assert_eq!(
        state(&session, 2),
        Some(FeatureState {
            served: Some(false),
            pending: false
        })
    );
}

#[test]
fn failed_commit_retains_batches_when_configured() {
    let mut cache = grid_cache();
    let mut session = map_with_markers(&cache);
    let mut stack = EditStagingStack::new(CommitPolicy::RetainOnFailure);
    stack
        .push_batch(&[FeatureId(4), FeatureId(5)], &cache, &mut session)
        .unwrap();
    stack.mark_unserved(&mut cache, &mut session);

    let backend = RecordingBackend::failing(503);
    let mut reloads = 0;
    let err = stack
        .commit(&cache, &mut session, &backend, || reloads += 1)
        .unwrap_err();
    assert!(matches!(err, StagingError::Submit(BackendError::Server { status: 503, .. })));
    assert_eq!(reloads, 1);
    assert_eq!(stack.len(), 1);
    assert!(stack.modal_visible());

    // The reload brings back server values; replaying keeps the user's marks.
    let mut fresh = grid_cache();
    assert_eq!(stack.restage(&mut fresh, &mut session), 2);
    assert!(!fresh.get(FeatureId(4)).unwrap().served);
    assert!(state(&session, 4).is_some_and(|state| state.pending));

    let retry = RecordingBackend::ok();
    stack.commit(&fresh, &mut session, &retry, || {}).unwrap();
    assert_eq!(retry.sent.borrow()[0].len(), 2);
}

#[test]
fn undo_restores_values_seen_at_staging_time() {
    let mut cache = grid_cache();
    let mut session = map_with_markers(&cache);
    let mut stack = EditStagingStack::new(CommitPolicy::ClearAlways);
    stack
        .push_batch(&[FeatureId(10), FeatureId(11)], &cache, &mut session)
        .unwrap();
    stack.mark_unserved(&mut cache, &mut session);
    assert!(!cache.get(FeatureId(10)).unwrap().served);

    assert_eq!(stack.undo(&mut cache, &mut session), Some(2));
    assert!(cache.get(FeatureId(10)).unwrap().served);
    assert!(!cache.get(FeatureId(11)).unwrap().served);
    assert_eq!(
        state(&session, 10),
        Some(FeatureState {
            served: Some(true),
            pending: false
        })
    );
    assert_eq!(stack.undo(&mut cache, &mut session), None);
}

#[test]
fn layer_visibility_survives_restyle() {
    let cache = grid_cache();
    let mut session = map_with_markers(&cache);
    session
        .add_source(SourceSpec {
            id: "hexes".to_string(),
            data: SourceData::GeoJson(geojson::FeatureCollection {
                bbox: None,
                features: Vec::new(),
                foreign_members: None,
            }),
        })
        .unwrap();
    for active in ActiveLayer::ALL {
        session
            .add_layer(LayerSpec {
                id: active.layer_id().to_string(),
                source: "hexes".to_string(),
                paint: Paint::Choropleth {
                    property: active.property().to_string(),
                    stops: layers::color_stops(active),
                    opacity: 0.55,
                },
                visible: false,
            })
            .unwrap();
    }
    assert_eq!(layers::apply_visibility(ActiveLayer::Count, &mut session), 4);

    assert!(session.set_base_style("https://tiles.example/dark.json").unwrap());
    layers::apply_visibility(ActiveLayer::Count, &mut session);
    let engine = session.engine().unwrap();
    for id in LAYER_REGISTRY {
        assert_eq!(engine.layout_visibility(id), Some(id == HEX_TESTS_LAYER));
    }
    assert!(engine.has_source(MARKERS_SOURCE));
}

#[test]
fn controller_saves_layer_choice_under_config_home() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let _env = CovermapEnvGuard::set_config_home(temp.path().to_path_buf());
    let path = config::config_path().expect("config path");
    let mut settings = AppSettings::default();
    settings.backend.base_url = "http://127.0.0.1:9/".to_string();

    let mut controller = EguiController::new(settings, Some(path.clone())).expect("controller");
    controller.set_active_layer(ActiveLayer::StdDev);
    drop(controller);

    assert!(path.starts_with(temp.path()));
    let saved = config::load_from_path(&path).expect("reload config");
    assert_eq!(saved.map.active_layer, ActiveLayer::StdDev);
}
