use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tracing::{info, warn};

use super::EguiController;
use super::jobs::{DeleteResult, DeleteTarget, ExportDownloadResult, JobMessage};
use crate::app_dirs;
use crate::backend::{BackendError, ExportRecord, FileRecord};
use crate::egui_app::ui::style::StatusTone;

impl EguiController {
    pub fn refresh_files(&mut self) {
        if self.jobs.files_in_progress {
            return;
        }
        self.jobs.files_in_progress = true;
        self.ui.files.loading = true;
        let backend = self.backend.clone();
        self.jobs
            .spawn(move || JobMessage::FilesLoaded(backend.list_files()));
    }

    pub(super) fn apply_files_loaded(&mut self, result: Result<Vec<FileRecord>, BackendError>) {
        self.jobs.files_in_progress = false;
        self.ui.files.loading = false;
        match result {
            Ok(rows) => {
                self.ui.files.rows = rows;
                self.ui.files.loaded_once = true;
            }
            Err(err) => self.report_backend_error("Load files", err),
        }
    }

    pub fn delete_file(&mut self, id: u64) {
        let backend = self.backend.clone();
        self.set_status(format!("Deleting file {id}"), StatusTone::Busy);
        self.jobs.spawn(move || {
            JobMessage::Deleted(DeleteResult {
                target: DeleteTarget::File(id),
                result: backend.delete_file(id),
            })
        });
    }

    pub fn refresh_exports(&mut self) {
        if self.jobs.exports_in_progress {
            return;
        }
        self.jobs.exports_in_progress = true;
        self.ui.exports.loading = true;
        let backend = self.backend.clone();
        self.jobs
            .spawn(move || JobMessage::ExportsLoaded(backend.list_exports()));
    }

    pub(super) fn apply_exports_loaded(&mut self, result: Result<Vec<ExportRecord>, BackendError>) {
        self.jobs.exports_in_progress = false;
        self.ui.exports.loading = false;
        match result {
            Ok(rows) => {
                self.ui.exports.rows = rows;
                self.ui.exports.loaded_once = true;
            }
            Err(err) => self.report_backend_error("Load exports", err),
        }
    }

    pub fn delete_export(&mut self, id: u64) {
        let backend = self.backend.clone();
        self.set_status(format!("Deleting export {id}"), StatusTone::Busy);
        self.jobs.spawn(move || {
            JobMessage::Deleted(DeleteResult {
                target: DeleteTarget::Export(id),
                result: backend.delete_export(id),
            })
        });
    }

    pub(super) fn apply_deleted(&mut self, message: DeleteResult) {
        match (message.target, message.result) {
            (DeleteTarget::File(id), Ok(_)) => {
                self.ui.files.rows.retain(|row| row.id != id);
                self.set_status(format!("Deleted file {id}"), StatusTone::Info);
                self.refresh_files();
            }
            (DeleteTarget::Export(id), Ok(_)) => {
                self.ui.exports.rows.retain(|row| row.id != id);
                self.set_status(format!("Deleted export {id}"), StatusTone::Info);
                self.refresh_exports();
            }
            (DeleteTarget::File(_), Err(err)) => self.report_backend_error("Delete file", err),
            (DeleteTarget::Export(_), Err(err)) => self.report_backend_error("Delete export", err),
        }
    }

    /// Ask where to save export `id`, then download it in the background.
    pub fn download_export(&mut self, id: u64, suggested_name: &str) {
        let mut dialog = rfd::FileDialog::new().set_file_name(suggested_name);
        if let Ok(dir) = app_dirs::exports_dir() {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };
        self.download_export_to(id, path);
    }

    pub(super) fn download_export_to(&mut self, id: u64, path: PathBuf) {
        if self.jobs.download_in_progress {
            self.set_status("A download is already running", StatusTone::Warning);
            return;
        }
        self.jobs.download_in_progress = true;
        self.ui.exports.downloading = Some(id);
        self.set_status(format!("Downloading export {id}"), StatusTone::Busy);
        let backend = self.backend.clone();
        self.jobs.spawn(move || {
            let result = File::create(&path)
                .map_err(BackendError::from)
                .and_then(|file| {
                    let mut writer = BufWriter::new(file);
                    let written = backend.download_export(id, &mut writer)?;
                    writer
                        .into_inner()
                        .map_err(|err| BackendError::Io(err.into_error()))?
                        .sync_all()?;
                    Ok(written)
                });
            if result.is_err() {
                let _ = std::fs::remove_file(&path);
            }
            JobMessage::ExportDownloaded(ExportDownloadResult {
                export_id: id,
                path,
                result,
            })
        });
    }

    pub(super) fn apply_export_downloaded(&mut self, message: ExportDownloadResult) {
        self.jobs.download_in_progress = false;
        self.ui.exports.downloading = None;
        match message.result {
            Ok(bytes) => {
                info!(id = message.export_id, bytes, path = %message.path.display(), "Export saved");
                self.set_status(
                    format!("Saved export to {}", message.path.display()),
                    StatusTone::Info,
                );
            }
            Err(err) => {
                warn!(id = message.export_id, path = %message.path.display(), "Export download failed");
                self.report_backend_error("Download export", err);
            }
        }
    }
}
