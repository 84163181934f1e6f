use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use super::EguiController;
use super::jobs::{FilingSubmitResult, JobMessage};
use crate::egui_app::ui::style::StatusTone;
use crate::uploads::{FilingKind, UploadError};

impl EguiController {
    /// Prompt for files and add them to the upload queue.
    pub fn pick_upload_files(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("Coverage data", &["csv", "zip", "geojson", "json", "kml", "gpkg"])
            .pick_files()
        else {
            return;
        };
        for path in paths {
            self.queue_upload(path);
        }
    }

    pub fn queue_upload(&mut self, path: PathBuf) -> Option<Uuid> {
        let result = self.uploads.push_path(path);
        self.refresh_filing_ui();
        match result {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("Upload rejected: {err}");
                self.set_status(err.to_string(), StatusTone::Warning);
                None
            }
        }
    }

    pub fn remove_upload(&mut self, id: Uuid) {
        self.uploads.remove(id);
        self.refresh_filing_ui();
    }

    pub fn clear_uploads(&mut self) {
        self.uploads.clear();
        self.refresh_filing_ui();
    }

    pub fn set_filing_kind(&mut self, kind: FilingKind) {
        self.ui.filing.kind = kind;
        self.ui.filing.last_error = None;
    }

    /// Validate the form, read the queued files and post them.
    pub fn submit_filing(&mut self) {
        if self.jobs.filing_in_progress {
            return;
        }
        let form = self.ui.filing.form();
        let submission = match self.uploads.build_submission(&form) {
            Ok(submission) => submission,
            Err(err) => {
                let tone = match err {
                    UploadError::Read { .. } => StatusTone::Error,
                    _ => StatusTone::Warning,
                };
                self.ui.filing.last_error = Some(err.to_string());
                self.set_status(err.to_string(), tone);
                return;
            }
        };
        let kind = form.kind();
        let files = submission.files.len();
        self.jobs.filing_in_progress = true;
        self.ui.filing.submitting = true;
        self.ui.filing.last_error = None;
        self.set_status(format!("Submitting {} filing", kind.label()), StatusTone::Busy);
        let backend = self.backend.clone();
        self.jobs.spawn(move || {
            let result = match kind {
                FilingKind::Fiber => backend.submit_fiber_form(&submission),
                FilingKind::Wireless => backend.submit_wireless_form(&submission),
            };
            JobMessage::FilingSubmitted(FilingSubmitResult { kind, files, result })
        });
    }

    pub(super) fn apply_filing_submitted(&mut self, message: FilingSubmitResult) {
        self.jobs.filing_in_progress = false;
        self.ui.filing.submitting = false;
        match message.result {
            Ok(server_message) => {
                info!(kind = message.kind.label(), files = message.files, %server_message, "Filing submitted");
                self.uploads.clear();
                self.refresh_filing_ui();
                self.set_status(
                    format!("{} filing submitted: {server_message}", message.kind.label()),
                    StatusTone::Info,
                );
                self.refresh_files();
                self.refresh_tasks();
            }
            Err(err) => {
                self.ui.filing.last_error = Some(err.user_message("Submit filing"));
                self.report_backend_error("Submit filing", err);
            }
        }
    }

    fn refresh_filing_ui(&mut self) {
        self.ui.filing.queued = self.uploads.items().to_vec();
        self.ui.filing.queued_bytes = self.uploads.total_bytes();
    }
}
