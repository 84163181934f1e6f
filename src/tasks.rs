//! Bounded, cancellable polling of long-running backend tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{BackendClient, BackendError, TaskStatus};

const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Reports the current status of one task.
pub trait TaskStatusSource: Send + 'static {
    fn task_status(&self, task_id: u64) -> Result<TaskStatus, BackendError>;
}

impl TaskStatusSource for BackendClient {
    fn task_status(&self, task_id: u64) -> Result<TaskStatus, BackendError> {
        Ok(self
            .list_user_tasks()?
            .into_iter()
            .find(|task| task.id == task_id)
            .map(|task| task.status)
            .unwrap_or(TaskStatus::Unknown))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

#[derive(Debug)]
pub enum TaskPollMessage {
    Progress {
        task_id: u64,
        attempt: u32,
        status: TaskStatus,
    },
    Finished {
        task_id: u64,
        status: TaskStatus,
    },
    Failed {
        task_id: u64,
        error: BackendError,
    },
    TimedOut {
        task_id: u64,
        attempts: u32,
    },
    Cancelled {
        task_id: u64,
    },
}

/// Cancels its poll when told to or when dropped.
#[derive(Debug)]
pub struct PollHandle {
    task_id: u64,
    cancel: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Poll `task_id` on a worker thread until it ends, is cancelled, or runs
/// out of attempts. Every message is sent through `tx`.
pub fn spawn_poll<S, M>(
    source: S,
    task_id: u64,
    settings: PollSettings,
    tx: Sender<M>,
) -> PollHandle
where
    S: TaskStatusSource,
    M: From<TaskPollMessage> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = cancel.clone();
    thread::spawn(move || {
        run_poll(&source, task_id, settings, &worker_cancel, |message| {
            tx.send(M::from(message)).is_ok()
        });
    });
    PollHandle { task_id, cancel }
}

/// Blocking poll loop; `emit` returns false once nobody is listening.
pub(crate) fn run_poll(
    source: &impl TaskStatusSource,
    task_id: u64,
    settings: PollSettings,
    cancel: &AtomicBool,
    mut emit: impl FnMut(TaskPollMessage) -> bool,
) {
    let max_attempts = settings.max_attempts.max(1);
    info!(task_id, interval = ?settings.interval, max_attempts, "Polling task");
    for attempt in 1..=max_attempts {
        if cancel.load(Ordering::Relaxed) {
            emit(TaskPollMessage::Cancelled { task_id });
            return;
        }
        match source.task_status(task_id) {
            Ok(status) if status.is_terminal() => {
                info!(task_id, ?status, attempt, "Task finished");
                emit(TaskPollMessage::Finished { task_id, status });
                return;
            }
            Ok(status) => {
                debug!(task_id, ?status, attempt, "Task still running");
                if !emit(TaskPollMessage::Progress {
                    task_id,
                    attempt,
                    status,
                }) {
                    return;
                }
            }
            Err(error) => {
                warn!(task_id, "Task poll failed: {error}");
                emit(TaskPollMessage::Failed { task_id, error });
                return;
            }
        }
        if attempt < max_attempts && !sleep_unless_cancelled(settings.interval, cancel) {
            emit(TaskPollMessage::Cancelled { task_id });
            return;
        }
    }
    warn!(task_id, max_attempts, "Task did not finish in time");
    emit(TaskPollMessage::TimedOut {
        task_id,
        attempts: max_attempts,
    });
}

/// Returns false when cancelled mid-sleep.
fn sleep_unless_cancelled(total: Duration, cancel: &AtomicBool) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(CANCEL_CHECK_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    !cancel.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;

    use super::*;

    struct ScriptedSource {
        statuses: Mutex<Vec<Result<TaskStatus, BackendError>>>,
        calls: Arc<Mutex<u32>>,
    }

    impl ScriptedSource {
        fn new(mut statuses: Vec<Result<TaskStatus, BackendError>>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                calls: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl TaskStatusSource for ScriptedSource {
        fn task_status(&self, _task_id: u64) -> Result<TaskStatus, BackendError> {
            *self.calls.lock().unwrap() += 1;
            self.statuses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(TaskStatus::Running))
        }
    }

    fn fast(max_attempts: u32) -> PollSettings {
        PollSettings {
            interval: Duration::ZERO,
            max_attempts,
        }
    }

    fn collect(source: &ScriptedSource, settings: PollSettings, cancel: &AtomicBool) -> Vec<TaskPollMessage> {
        let mut messages = Vec::new();
        run_poll(source, 9, settings, cancel, |message| {
            messages.push(message);
            true
        });
        messages
    }

    #[test]
    fn stops_on_terminal_status() {
        let source = ScriptedSource::new(vec![
            Ok(TaskStatus::Pending),
            Ok(TaskStatus::Running),
            Ok(TaskStatus::Completed),
            Ok(TaskStatus::Running),
        ]);
        let messages = collect(&source, fast(10), &AtomicBool::new(false));
        assert_eq!(messages.len(), 3);
        assert!(matches!(
            messages.last(),
            Some(TaskPollMessage::Finished {
                task_id: 9,
                status: TaskStatus::Completed
            })
        ));
        assert_eq!(*source.calls.lock().unwrap(), 3);
    }

    #[test]
    fn times_out_after_max_attempts() {
        let source = ScriptedSource::new(Vec::new());
        let messages = collect(&source, fast(4), &AtomicBool::new(false));
        assert!(matches!(
            messages.last(),
            Some(TaskPollMessage::TimedOut { attempts: 4, .. })
        ));
        assert_eq!(*source.calls.lock().unwrap(), 4);
    }

    #[test]
    fn cancelled_before_first_attempt_never_queries() {
        let source = ScriptedSource::new(Vec::new());
        let messages = collect(&source, fast(4), &AtomicBool::new(true));
        assert!(matches!(messages.as_slice(), [TaskPollMessage::Cancelled { task_id: 9 }]));
        assert_eq!(*source.calls.lock().unwrap(), 0);
    }

    #[test]
    fn error_ends_polling() {
        let source = ScriptedSource::new(vec![Err(BackendError::SessionExpired)]);
        let messages = collect(&source, fast(4), &AtomicBool::new(false));
        assert!(matches!(
            messages.as_slice(),
            [TaskPollMessage::Failed {
                error: BackendError::SessionExpired,
                ..
            }]
        ));
    }

    #[test]
    fn dropping_handle_cancels_worker() {
        let source = ScriptedSource::new(Vec::new());
        let calls = source.calls.clone();
        let (tx, rx) = mpsc::channel::<TaskPollMessage>();
        let settings = PollSettings {
            interval: Duration::from_millis(50),
            max_attempts: 1_000,
        };
        let handle = spawn_poll(source, 3, settings, tx);
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(TaskPollMessage::Progress { task_id: 3, .. })
        ));
        drop(handle);
        let last = rx
            .iter()
            .find(|message| !matches!(message, TaskPollMessage::Progress { .. }));
        assert!(matches!(last, Some(TaskPollMessage::Cancelled { task_id: 3 })));
        assert!(*calls.lock().unwrap() < 1_000);
    }
}
