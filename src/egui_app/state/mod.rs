//! State types read by the egui renderer. The controller is their only writer.

mod map;
mod panels;
mod status;

pub use map::*;
pub use panels::*;
pub use status::*;

/// Top-level UI model consumed by the egui renderer.
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub status: StatusBarState,
    pub map: MapViewState,
    pub layers: LayerPanelState,
    pub staging: StagingPanelState,
    pub files: FilesPanelState,
    pub exports: ExportsPanelState,
    pub tasks: TasksPanelState,
    pub filing: FilingPanelState,
    pub session: SessionPanelState,
    pub side_tab: SideTab,
    /// Served-data load in flight.
    pub loading_markers: bool,
    /// Name of the active base style, shown in the top bar.
    pub style_name: String,
}
