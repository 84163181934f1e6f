//! Library exports for reuse in benchmarks and tests.
/// Per-user directories for config, logs and downloads.
pub mod app_dirs;
/// Typed client for the coverage backend.
pub mod backend;
/// Persisted application settings.
pub mod config;
/// Shared egui UI modules.
pub mod egui_app;
/// Served-location records and the in-memory feature cache.
pub mod features;
pub(crate) mod http_client;
/// Hex layer registry, visibility and legends.
pub mod layers;
/// Tracing setup.
pub mod logging;
/// Map engine abstraction and session lifecycle.
pub mod map;
/// Polygon selection over point features.
pub mod selection;
/// Undoable staging of served-status edits.
pub mod staging;
/// Background polling of long-running backend tasks.
pub mod tasks;
/// Filing forms and the upload queue.
pub mod uploads;
