use crate::backend::{ExportRecord, FileRecord, TaskRuntime, TaskStatus, TaskSummary};
use crate::layers::{ActiveLayer, ColorMapping, color_mapping};
use crate::staging::StagingState;
use crate::uploads::{FiberFilingForm, FilingCommon, FilingForm, FilingKind, UploadItem, WirelessFilingForm};

/// Hex layer picker and its legend.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerPanelState {
    pub active: ActiveLayer,
    pub legend: ColorMapping,
}

impl LayerPanelState {
    pub fn new(active: ActiveLayer) -> Self {
        Self {
            active,
            legend: color_mapping(active),
        }
    }
}

impl Default for LayerPanelState {
    fn default() -> Self {
        Self::new(ActiveLayer::default())
    }
}

/// Mirror of the staging stack for the pending-changes modal.
#[derive(Clone, Debug, PartialEq)]
pub struct StagingPanelState {
    pub modal_visible: bool,
    pub state: StagingState,
    pub batches: usize,
    pub features: usize,
    /// Size of each batch, oldest first.
    pub batch_sizes: Vec<usize>,
}

impl Default for StagingPanelState {
    fn default() -> Self {
        Self {
            modal_visible: false,
            state: StagingState::Idle,
            batches: 0,
            features: 0,
            batch_sizes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilesPanelState {
    pub rows: Vec<FileRecord>,
    pub loading: bool,
    pub loaded_once: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportsPanelState {
    pub rows: Vec<ExportRecord>,
    pub loading: bool,
    pub loaded_once: bool,
    /// Export currently being written to disk.
    pub downloading: Option<u64>,
}

/// Live progress of the watched task.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchedTask {
    pub task_id: u64,
    pub status: TaskStatus,
    pub attempts: u32,
    pub runtime: Option<TaskRuntime>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TasksPanelState {
    pub rows: Vec<TaskSummary>,
    pub loading: bool,
    pub loaded_once: bool,
    pub watched: Option<WatchedTask>,
    /// Result line of the last finished watch.
    pub last_outcome: Option<String>,
}

/// Editable filing form plus the queued files shown beside it.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingPanelState {
    pub kind: FilingKind,
    pub common: FilingCommon,
    pub antenna_height_m: f64,
    pub coverage_radius_km: f64,
    pub queued: Vec<UploadItem>,
    pub queued_bytes: u64,
    pub submitting: bool,
    pub last_error: Option<String>,
}

impl FilingPanelState {
    /// Form as it would be submitted right now.
    pub fn form(&self) -> FilingForm {
        match self.kind {
            FilingKind::Fiber => FilingForm::Fiber(FiberFilingForm {
                common: self.common.clone(),
            }),
            FilingKind::Wireless => FilingForm::Wireless(WirelessFilingForm {
                common: self.common.clone(),
                antenna_height_m: self.antenna_height_m,
                coverage_radius_km: self.coverage_radius_km,
            }),
        }
    }
}

impl Default for FilingPanelState {
    fn default() -> Self {
        Self {
            kind: FilingKind::Fiber,
            common: FilingCommon::default(),
            antenna_height_m: 30.0,
            coverage_radius_km: 5.0,
            queued: Vec::new(),
            queued_bytes: 0,
            submitting: false,
            last_error: None,
        }
    }
}

/// Shown after any request answered 401.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionPanelState {
    pub expired: bool,
    pub login_url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SideTab {
    #[default]
    Layers,
    Filings,
    Files,
    Exports,
    Tasks,
}

impl SideTab {
    pub const ALL: [SideTab; 5] = [
        SideTab::Layers,
        SideTab::Filings,
        SideTab::Files,
        SideTab::Exports,
        SideTab::Tasks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SideTab::Layers => "Layers",
            SideTab::Filings => "Filings",
            SideTab::Files => "Files",
            SideTab::Exports => "Exports",
            SideTab::Tasks => "Tasks",
        }
    }
}
