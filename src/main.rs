#![deny(missing_docs)]
#![deny(warnings)]

//! Entry point for the Covermap desktop UI.
#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]
use covermap::config::{self, AppSettings};
use covermap::egui_app::ui::{EguiApp, MIN_VIEWPORT_SIZE};
use covermap::logging;
use eframe::egui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::config_path().ok();
    let mut launch_error = None;
    let settings = match config_path.as_deref().map(config::load_from_path) {
        Some(Ok(settings)) => settings,
        Some(Err(err)) => {
            launch_error = Some(format!("Failed to load config: {err}"));
            AppSettings::default().normalized()
        }
        None => AppSettings::default().normalized(),
    };

    match logging::init(settings.log_filter.as_deref()) {
        Ok(path) => tracing::info!(path = %path.display(), "Logging to file"),
        Err(err) => eprintln!("Logging disabled: {err}"),
    }

    let viewport = egui::ViewportBuilder::default()
        .with_min_inner_size(MIN_VIEWPORT_SIZE)
        .with_inner_size([1280.0, 800.0]);
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Covermap",
        native_options,
        Box::new(move |_cc| {
            if let Some(message) = launch_error {
                return Ok(Box::new(LaunchError { message }));
            }
            match EguiApp::new(settings, config_path) {
                Ok(app) => Ok(Box::new(app)),
                Err(message) => Ok(Box::new(LaunchError { message })),
            }
        }),
    )?;
    Ok(())
}

/// Minimal fallback app to display initialization errors.
struct LaunchError {
    message: String,
}

impl eframe::App for LaunchError {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("Failed to start Covermap");
                ui.label(&self.message);
            });
        });
    }
}
