//! Wire types for the coverage backend.

use serde::{Deserialize, Serialize};

/// Uploaded fabric/network file as listed by `GET /api/files`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    #[serde(alias = "filename", alias = "file_name", default)]
    pub name: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Generated filing export as listed by `GET /api/export`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: u64,
    #[serde(alias = "filename", alias = "file_name", default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Lifecycle state of a backend task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Polling stops once a task reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: u64,
    #[serde(alias = "task_name", default)]
    pub name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Answer of `GET /api/estimated-task-runtime/{id}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRuntime {
    #[serde(alias = "estimated_time", default)]
    pub estimated_seconds: Option<f64>,
    #[serde(default)]
    pub elapsed_seconds: Option<f64>,
}

impl TaskRuntime {
    /// Fraction complete in `0.0..=1.0`, when both figures are known.
    pub fn progress(&self) -> Option<f32> {
        let estimated = self.estimated_seconds.filter(|value| *value > 0.0)?;
        let elapsed = self.elapsed_seconds?;
        Some((elapsed / estimated).clamp(0.0, 1.0) as f32)
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct TaskStatusUpdate {
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
