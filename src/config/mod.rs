//! Persistent app settings stored as TOML under the app directory.

mod io;
mod types;

pub use io::{CONFIG_FILE_NAME, config_path, load_from_path, load_or_default, save, save_to_path};
pub use types::{
    AppSettings, BackendSettings, ConfigError, MapSettings, StagingSettings, StyleChoice,
    TaskSettings,
};

impl AppSettings {
    pub fn poll_settings(&self) -> crate::tasks::PollSettings {
        crate::tasks::PollSettings {
            interval: std::time::Duration::from_secs(self.tasks.poll_interval_secs),
            max_attempts: self.tasks.max_poll_attempts,
        }
    }
}
