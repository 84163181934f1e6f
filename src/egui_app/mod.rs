//! egui front-end: controller, UI state objects and the renderer.

pub mod controller;
pub mod state;
pub mod ui;
