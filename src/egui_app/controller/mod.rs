//! Maintains app state and bridges core logic to the egui UI.

mod files;
mod filings;
mod jobs;
mod map_edits;
mod map_setup;
mod tasks;

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{BackendClient, BackendError};
use crate::config::{self, AppSettings};
use crate::egui_app::state::{LayerPanelState, MapViewState, StagingPanelState, UiState};
use crate::egui_app::ui::style::{self, StatusTone};
use crate::features::FeatureCache;
use crate::map::{CanvasEngine, LngLat, MapOptions, MapSession};
use crate::selection::SpatialIndex;
use crate::staging::EditStagingStack;
use crate::tasks::PollHandle;
use crate::uploads::UploadQueue;

use jobs::ControllerJobs;
use map_setup::MapNotice;

/// How long the viewport must stay still before it is written to config.
const VIEWPORT_SAVE_DELAY: Duration = Duration::from_secs(2);

pub struct EguiController {
    pub ui: UiState,
    settings: AppSettings,
    /// `None` keeps settings in memory only.
    config_path: Option<PathBuf>,
    backend: BackendClient,
    cache: FeatureCache,
    index: Option<SpatialIndex>,
    staging: EditStagingStack,
    session: MapSession<CanvasEngine>,
    uploads: UploadQueue,
    jobs: ControllerJobs,
    notice_tx: Sender<MapNotice>,
    notice_rx: Receiver<MapNotice>,
    task_poll: Option<PollHandle>,
}

impl EguiController {
    /// Build the controller and its map. Nothing is fetched until
    /// [`EguiController::load_initial_data`].
    pub fn new(settings: AppSettings, config_path: Option<PathBuf>) -> Result<Self, BackendError> {
        let settings = settings.normalized();
        let backend = BackendClient::new(&settings.backend.base_url)?
            .with_session_cookie(settings.backend.session_cookie.clone());
        let center = LngLat::new(settings.map.center[0], settings.map.center[1]);
        let session = MapSession::initialize(
            MapOptions {
                style_url: settings.map.style_url.clone(),
                center,
                zoom: settings.map.zoom,
            },
            CanvasEngine::new,
        );
        let (notice_tx, notice_rx) = mpsc::channel();
        let mut ui = UiState {
            map: MapViewState::new(center, settings.map.zoom),
            layers: LayerPanelState::new(settings.map.active_layer),
            ..UiState::default()
        };
        ui.session.login_url = backend.login_url();
        ui.style_name = style_name(&settings, &settings.map.style_url);
        let mut controller = Self {
            ui,
            staging: EditStagingStack::new(settings.staging.commit_policy),
            settings,
            config_path,
            backend,
            cache: FeatureCache::new(),
            index: None,
            session,
            uploads: UploadQueue::new(),
            jobs: ControllerJobs::new(),
            notice_tx,
            notice_rx,
            task_poll: None,
        };
        if let Err(err) = controller.install_map_layers() {
            warn!("Map setup failed: {err}");
            controller.set_status(format!("Map setup failed: {err}"), StatusTone::Error);
        }
        info!(backend = %controller.backend.base_url(), "Controller ready");
        Ok(controller)
    }

    /// Kick off the first fetches: markers, hex aggregates and tasks.
    pub fn load_initial_data(&mut self) {
        self.load_markers();
        self.load_hex_data();
        self.refresh_tasks();
    }

    /// Per-frame housekeeping; call before rendering.
    pub fn tick(&mut self) {
        self.poll_background_jobs();
        self.session.process_events();
        self.drain_map_notices();
        self.save_viewport_if_settled();
    }

    /// True while anything is running in the background.
    pub fn has_background_work(&self) -> bool {
        self.jobs.any_in_progress() || self.task_poll.is_some()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn session(&self) -> &MapSession<CanvasEngine> {
        &self.session
    }

    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    pub fn staging(&self) -> &EditStagingStack {
        &self.staging
    }

    pub(crate) fn set_status(&mut self, text: impl Into<String>, tone: StatusTone) {
        let text = text.into();
        self.ui.status.badge_label = style::status_badge_label(tone).into();
        self.ui.status.badge_color = style::status_badge_color(tone);
        self.ui.status.push_log(text.clone());
        self.ui.status.text = text;
    }

    /// Report a failed request the same way everywhere.
    ///
    /// A 401 raises the session-expired modal instead of the usual message.
    fn report_backend_error(&mut self, operation: &str, err: BackendError) {
        warn!(operation, code = %err.code(), "Request failed: {err}");
        if err.is_session_expired() {
            self.ui.session.expired = true;
            self.set_status("Session expired, sign in again", StatusTone::Error);
        } else {
            self.set_status(err.user_message(operation), StatusTone::Error);
        }
    }

    /// Open the backend's login page in the system browser.
    pub fn open_login_page(&mut self) {
        let url = self.ui.session.login_url.clone();
        match open::that(&url) {
            Ok(()) => {
                self.ui.session.expired = false;
                self.set_status("Sign in from the browser, then reload", StatusTone::Info);
            }
            Err(err) => {
                warn!(%url, "Failed to open browser: {err}");
                self.set_status(format!("Open {url} to sign in"), StatusTone::Warning);
            }
        }
    }

    pub fn dismiss_session_expired(&mut self) {
        self.ui.session.expired = false;
    }

    fn refresh_staging_ui(&mut self) {
        self.ui.staging = StagingPanelState {
            modal_visible: self.staging.modal_visible(),
            state: self.staging.state(),
            batches: self.staging.len(),
            features: self.staging.staged_feature_count(),
            batch_sizes: self.staging.batches().iter().map(|batch| batch.len()).collect(),
        };
    }

    fn persist_settings(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        if let Err(err) = config::save_to_path(&self.settings, &path) {
            warn!("Failed to save config: {err}");
            self.set_status(format!("Failed to save config: {err}"), StatusTone::Warning);
        }
    }

    fn save_viewport_if_settled(&mut self) {
        let Some(changed_at) = self.ui.map.viewport_changed_at else {
            return;
        };
        if changed_at.elapsed() < VIEWPORT_SAVE_DELAY {
            return;
        }
        self.ui.map.viewport_changed_at = None;
        self.settings.map.center = [self.ui.map.center.lon, self.ui.map.center.lat];
        self.settings.map.zoom = self.ui.map.zoom;
        self.persist_settings();
    }
}

impl Drop for EguiController {
    fn drop(&mut self) {
        if let Some(handle) = self.task_poll.take() {
            handle.cancel();
        }
        self.session.teardown();
    }
}

fn style_name(settings: &AppSettings, url: &str) -> String {
    settings
        .map
        .styles
        .iter()
        .find(|choice| choice.url == url)
        .map(|choice| choice.name.clone())
        .unwrap_or_else(|| "Custom".to_string())
}
