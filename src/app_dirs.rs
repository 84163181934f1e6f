//! Where covermap keeps its files on disk.
//!
//! One `.covermap` folder holds the settings file, launch logs under `logs/`
//! and downloaded exports under `exports/`. It is created inside the OS config
//! directory unless `COVERMAP_CONFIG_HOME` names another parent.

use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Folder created under the config home.
pub const APP_DIR_NAME: &str = ".covermap";
/// Replaces the OS config directory as the parent of [`APP_DIR_NAME`].
pub const CONFIG_HOME_ENV: &str = "COVERMAP_CONFIG_HOME";

/// Folders covermap writes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppDir {
    Root,
    Logs,
    Exports,
}

impl AppDir {
    fn child(self) -> Option<&'static str> {
        match self {
            AppDir::Root => None,
            AppDir::Logs => Some("logs"),
            AppDir::Exports => Some("exports"),
        }
    }

    /// Resolve the folder, creating it and its parents on first use.
    pub fn ensure(self) -> Result<PathBuf, AppDirError> {
        let home = config_home().ok_or(AppDirError::NoBaseDir)?;
        let mut path = home.join(APP_DIR_NAME);
        if let Some(child) = self.child() {
            path.push(child);
        }
        std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory found to hold {APP_DIR_NAME}")]
    NoBaseDir,
    #[error("Could not create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    AppDir::Root.ensure()
}

pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    AppDir::Logs.ensure()
}

/// Default destination for downloaded exports.
pub fn exports_dir() -> Result<PathBuf, AppDirError> {
    AppDir::Exports.ensure()
}

fn config_home() -> Option<PathBuf> {
    test_home_override()
        .or_else(|| {
            std::env::var_os(CONFIG_HOME_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
}

#[cfg(test)]
fn test_home_override() -> Option<PathBuf> {
    test_home::current()
}

#[cfg(not(test))]
fn test_home_override() -> Option<PathBuf> {
    None
}


#[cfg(test)]
mod tests {
    use super::test_home::TestHome;
    use super::*;

    #[test]
    fn folders_nest_under_the_covermap_home() {
        let home = tempfile::tempdir().unwrap();
        let _home = TestHome::set(home.path());
        let root = home.path().join(APP_DIR_NAME);

        for (dir, expected) in [
            (AppDir::Root, root.clone()),
            (AppDir::Logs, root.join("logs")),
            (AppDir::Exports, root.join("exports")),
        ] {
            let path = dir.ensure().unwrap();
            assert_eq!(path, expected);
            assert!(path.is_dir(), "{dir:?} was not created");
        }
    }
}
