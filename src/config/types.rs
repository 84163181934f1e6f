use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layers::ActiveLayer;
use crate::staging::CommitPolicy;

pub(super) const MIN_ZOOM: f64 = 0.0;
pub(super) const MAX_ZOOM: f64 = 22.0;

/// Errors that may occur while loading or saving app configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Everything persisted in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub map: MapSettings,
    #[serde(default)]
    pub staging: StagingSettings,
    #[serde(default)]
    pub tasks: TaskSettings,
}

impl AppSettings {
    /// Clamp values into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.map.zoom = if self.map.zoom.is_finite() {
            self.map.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            default_zoom()
        };
        let [lon, lat] = self.map.center;
        if !(lon.is_finite() && lat.is_finite()) {
            self.map.center = default_center();
        } else {
            self.map.center = [lon.clamp(-180.0, 180.0), lat.clamp(-85.0, 85.0)];
        }
        self.tasks.poll_interval_secs = self.tasks.poll_interval_secs.max(1);
        self.tasks.max_poll_attempts = self.tasks.max_poll_attempts.max(1);
        if self.map.styles.is_empty() {
            self.map.styles = default_styles();
        }
        self.backend.session_cookie = self
            .backend
            .session_cookie
            .take()
            .filter(|cookie| !cookie.trim().is_empty());
        self
    }
}

/// Config keys: `base_url`, `session_cookie`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent verbatim as the `Cookie` header when set.
    #[serde(default)]
    pub session_cookie: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: None,
        }
    }
}

/// A selectable base map style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleChoice {
    pub name: String,
    pub url: String,
}

/// Config keys: `style_url`, `styles`, `center`, `zoom`, `active_layer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    #[serde(default = "default_style_url")]
    pub style_url: String,
    #[serde(default = "default_styles")]
    pub styles: Vec<StyleChoice>,
    /// `[longitude, latitude]`.
    #[serde(default = "default_center")]
    pub center: [f64; 2],
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub active_layer: ActiveLayer,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            style_url: default_style_url(),
            styles: default_styles(),
            center: default_center(),
            zoom: default_zoom(),
            active_layer: ActiveLayer::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingSettings {
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_style_url() -> String {
    "https://tiles.openfreemap.org/styles/liberty".to_string()
}

fn default_styles() -> Vec<StyleChoice> {
    vec![
        StyleChoice {
            name: "Streets".to_string(),
            url: default_style_url(),
        },
        StyleChoice {
            name: "Light".to_string(),
            url: "https://tiles.openfreemap.org/styles/positron".to_string(),
        },
        StyleChoice {
            name: "Dark".to_string(),
            url: "https://tiles.openfreemap.org/styles/dark".to_string(),
        },
    ]
}

fn default_center() -> [f64; 2] {
    [-98.5795, 39.8283]
}

fn default_zoom() -> f64 {
    4.0
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    120
}
