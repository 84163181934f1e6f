use crate::features::FeatureId;
use crate::map::{FeatureState, MARKERS_SOURCE, MapEngine, MapSession};

/// Where staged edits are previewed.
pub trait PendingVisuals {
    /// Draw `id` as pending, previewing `preview_served`.
    fn show_pending(&mut self, id: FeatureId, preview_served: bool);
    /// Clear the pending mark and draw `served`.
    fn settle(&mut self, id: FeatureId, served: bool);
}

impl<E: MapEngine> PendingVisuals for MapSession<E> {
    fn show_pending(&mut self, id: FeatureId, preview_served: bool) {
        self.set_feature_state(
            MARKERS_SOURCE,
            id,
            FeatureState {
                served: Some(preview_served),
                pending: true,
            },
        );
    }

    fn settle(&mut self, id: FeatureId, served: bool) {
        self.set_feature_state(
            MARKERS_SOURCE,
            id,
            FeatureState {
                served: Some(served),
                pending: false,
            },
        );
    }
}
