use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;

use super::EguiController;
use crate::backend::{BackendError, ExportRecord, FileRecord, TaskRuntime, TaskStatus, TaskSummary};
use crate::features::ServedRecord;
use crate::tasks::TaskPollMessage;
use crate::uploads::FilingKind;

/// Results sent from worker threads back to the UI thread.
#[derive(Debug)]
pub(crate) enum JobMessage {
    ServedDataLoaded(Result<Vec<ServedRecord>, BackendError>),
    HexDataLoaded(Result<geojson::FeatureCollection, BackendError>),
    MarkersToggled(MarkersToggledResult),
    FilesLoaded(Result<Vec<FileRecord>, BackendError>),
    ExportsLoaded(Result<Vec<ExportRecord>, BackendError>),
    ExportDownloaded(ExportDownloadResult),
    Deleted(DeleteResult),
    FilingSubmitted(FilingSubmitResult),
    TasksLoaded(Result<Vec<TaskSummary>, BackendError>),
    TaskStatusUpdated(TaskUpdateResult),
    TaskRuntimeLoaded {
        task_id: u64,
        result: Result<TaskRuntime, BackendError>,
    },
    TaskPoll(TaskPollMessage),
}

impl From<TaskPollMessage> for JobMessage {
    fn from(message: TaskPollMessage) -> Self {
        JobMessage::TaskPoll(message)
    }
}

#[derive(Debug)]
pub(crate) struct MarkersToggledResult {
    pub(crate) records: usize,
    pub(crate) result: Result<String, BackendError>,
}

#[derive(Debug)]
pub(crate) struct ExportDownloadResult {
    pub(crate) export_id: u64,
    pub(crate) path: PathBuf,
    pub(crate) result: Result<u64, BackendError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeleteTarget {
    File(u64),
    Export(u64),
}

#[derive(Debug)]
pub(crate) struct DeleteResult {
    pub(crate) target: DeleteTarget,
    pub(crate) result: Result<String, BackendError>,
}

#[derive(Debug)]
pub(crate) struct FilingSubmitResult {
    pub(crate) kind: FilingKind,
    pub(crate) files: usize,
    pub(crate) result: Result<String, BackendError>,
}

#[derive(Debug)]
pub(crate) struct TaskUpdateResult {
    pub(crate) task_id: u64,
    pub(crate) status: TaskStatus,
    pub(crate) result: Result<String, BackendError>,
}

pub(crate) struct ControllerJobs {
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
    pub(super) served_data_in_progress: bool,
    pub(super) hex_data_in_progress: bool,
    pub(super) commit_in_progress: bool,
    pub(super) files_in_progress: bool,
    pub(super) exports_in_progress: bool,
    pub(super) tasks_in_progress: bool,
    pub(super) filing_in_progress: bool,
    pub(super) download_in_progress: bool,
    /// A commit landed while a served-data load was running; that load
    /// predates the commit, so its result is dropped and a fresh one started.
    pub(super) reload_after_current: bool,
    /// Served-data loads started so far.
    pub(super) served_data_requests: u64,
}

impl ControllerJobs {
    pub(super) fn new() -> Self {
        let (message_tx, message_rx) = std::sync::mpsc::channel::<JobMessage>();
        Self {
            message_tx,
            message_rx,
            served_data_in_progress: false,
            hex_data_in_progress: false,
            commit_in_progress: false,
            files_in_progress: false,
            exports_in_progress: false,
            tasks_in_progress: false,
            filing_in_progress: false,
            download_in_progress: false,
            reload_after_current: false,
            served_data_requests: 0,
        }
    }

    pub(super) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(super) fn message_sender(&self) -> Sender<JobMessage> {
        self.message_tx.clone()
    }

    /// Run `job` on a worker thread and deliver its result next frame.
    pub(super) fn spawn(&self, job: impl FnOnce() -> JobMessage + Send + 'static) {
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    pub(super) fn any_in_progress(&self) -> bool {
        self.served_data_in_progress
            || self.hex_data_in_progress
            || self.commit_in_progress
            || self.files_in_progress
            || self.exports_in_progress
            || self.tasks_in_progress
            || self.filing_in_progress
            || self.download_in_progress
    }
}

impl EguiController {
    /// Drain every finished job. Runs once per frame.
    pub(super) fn poll_background_jobs(&mut self) {
        loop {
            let message = match self.jobs.try_recv_message() {
                Ok(message) => message,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            self.handle_job_message(message);
        }
    }

    pub(super) fn handle_job_message(&mut self, message: JobMessage) {
        match message {
            JobMessage::ServedDataLoaded(result) => self.apply_served_data(result),
            JobMessage::HexDataLoaded(result) => self.apply_hex_data(result),
            JobMessage::MarkersToggled(result) => self.apply_markers_toggled(result),
            JobMessage::FilesLoaded(result) => self.apply_files_loaded(result),
            JobMessage::ExportsLoaded(result) => self.apply_exports_loaded(result),
            JobMessage::ExportDownloaded(result) => self.apply_export_downloaded(result),
            JobMessage::Deleted(result) => self.apply_deleted(result),
            JobMessage::FilingSubmitted(result) => self.apply_filing_submitted(result),
            JobMessage::TasksLoaded(result) => self.apply_tasks_loaded(result),
            JobMessage::TaskStatusUpdated(result) => self.apply_task_status_updated(result),
            JobMessage::TaskRuntimeLoaded { task_id, result } => {
                self.apply_task_runtime(task_id, result)
            }
            JobMessage::TaskPoll(message) => self.apply_task_poll(message),
        }
    }
}
