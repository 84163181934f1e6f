use tracing::{info, warn};

use super::EguiController;
use super::jobs::{JobMessage, TaskUpdateResult};
use crate::backend::{BackendError, TaskRuntime, TaskStatus, TaskSummary};
use crate::egui_app::state::WatchedTask;
use crate::egui_app::ui::style::StatusTone;
use crate::tasks::{self, TaskPollMessage};

impl EguiController {
    pub fn refresh_tasks(&mut self) {
        if self.jobs.tasks_in_progress {
            return;
        }
        self.jobs.tasks_in_progress = true;
        self.ui.tasks.loading = true;
        let backend = self.backend.clone();
        self.jobs
            .spawn(move || JobMessage::TasksLoaded(backend.list_user_tasks()));
    }

    pub(super) fn apply_tasks_loaded(&mut self, result: Result<Vec<TaskSummary>, BackendError>) {
        self.jobs.tasks_in_progress = false;
        self.ui.tasks.loading = false;
        match result {
            Ok(rows) => {
                self.ui.tasks.rows = rows;
                self.ui.tasks.loaded_once = true;
            }
            Err(err) => self.report_backend_error("Load tasks", err),
        }
    }

    /// Poll `task_id` until it ends. Replaces any watch already running.
    pub fn watch_task(&mut self, task_id: u64) {
        self.stop_watching();
        let handle = tasks::spawn_poll(
            self.backend.clone(),
            task_id,
            self.settings.poll_settings(),
            self.jobs.message_sender(),
        );
        self.task_poll = Some(handle);
        self.ui.tasks.watched = Some(WatchedTask {
            task_id,
            status: TaskStatus::Pending,
            attempts: 0,
            runtime: None,
        });
        self.ui.tasks.last_outcome = None;
        self.set_status(format!("Watching task {task_id}"), StatusTone::Busy);
        let backend = self.backend.clone();
        self.jobs.spawn(move || JobMessage::TaskRuntimeLoaded {
            task_id,
            result: backend.estimated_task_runtime(task_id),
        });
    }

    pub fn stop_watching(&mut self) {
        if let Some(handle) = self.task_poll.take() {
            info!(task_id = handle.task_id(), "Stopped watching task");
            handle.cancel();
        }
        self.ui.tasks.watched = None;
    }

    /// Ask the backend to cancel `task_id`.
    pub fn cancel_task(&mut self, task_id: u64) {
        let backend = self.backend.clone();
        let status = TaskStatus::Cancelled;
        self.jobs.spawn(move || {
            JobMessage::TaskStatusUpdated(TaskUpdateResult {
                task_id,
                status,
                result: backend.update_task_status(task_id, status),
            })
        });
    }

    pub(super) fn apply_task_status_updated(&mut self, message: TaskUpdateResult) {
        match message.result {
            Ok(_) => {
                self.set_status(
                    format!("Task {} set to {}", message.task_id, message.status.label()),
                    StatusTone::Info,
                );
                self.refresh_tasks();
            }
            Err(err) => self.report_backend_error("Update task", err),
        }
    }

    pub(super) fn apply_task_runtime(&mut self, task_id: u64, result: Result<TaskRuntime, BackendError>) {
        match result {
            Ok(runtime) => {
                if let Some(watched) = self.ui.tasks.watched.as_mut()
                    && watched.task_id == task_id
                {
                    watched.runtime = Some(runtime);
                }
            }
            // Runtime estimates are optional.
            Err(err) => warn!(task_id, "No runtime estimate: {err}"),
        }
    }

    fn is_watching(&self, task_id: u64) -> bool {
        self.task_poll
            .as_ref()
            .is_some_and(|handle| handle.task_id() == task_id)
    }

    pub(super) fn apply_task_poll(&mut self, message: TaskPollMessage) {
        let task_id = match &message {
            TaskPollMessage::Progress { task_id, .. }
            | TaskPollMessage::Finished { task_id, .. }
            | TaskPollMessage::Failed { task_id, .. }
            | TaskPollMessage::TimedOut { task_id, .. }
            | TaskPollMessage::Cancelled { task_id } => *task_id,
        };
        if !self.is_watching(task_id) {
            return;
        }
        match message {
            TaskPollMessage::Progress { attempt, status, .. } => {
                if let Some(watched) = self.ui.tasks.watched.as_mut() {
                    watched.status = status;
                    watched.attempts = attempt;
                }
            }
            TaskPollMessage::Finished { status, .. } => {
                self.finish_watch(format!("Task {task_id} {}", status.label().to_lowercase()));
                let tone = if status == TaskStatus::Completed {
                    StatusTone::Info
                } else {
                    StatusTone::Warning
                };
                self.set_status(format!("Task {task_id} {}", status.label().to_lowercase()), tone);
                self.refresh_tasks();
                if status == TaskStatus::Completed {
                    self.refresh_exports();
                }
            }
            TaskPollMessage::Failed { error, .. } => {
                self.finish_watch(format!("Task {task_id} status unavailable"));
                self.report_backend_error("Check task status", error);
            }
            TaskPollMessage::TimedOut { attempts, .. } => {
                self.finish_watch(format!("Task {task_id} still running after {attempts} checks"));
                self.set_status(
                    format!("Stopped watching task {task_id} after {attempts} checks"),
                    StatusTone::Warning,
                );
            }
            TaskPollMessage::Cancelled { .. } => {
                self.finish_watch(format!("Stopped watching task {task_id}"));
            }
        }
    }

    fn finish_watch(&mut self, outcome: String) {
        self.task_poll = None;
        self.ui.tasks.watched = None;
        self.ui.tasks.last_outcome = Some(outcome);
    }
}
