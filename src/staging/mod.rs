//! Staged served/unserved edits awaiting submission.
//!
//! Each polygon draw pushes one [`SelectionBatch`]. Batches are undone from
//! the top and submitted together; the pending-changes modal is visible
//! exactly while at least one batch is staged.

mod visuals;

pub use visuals::PendingVisuals;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{BackendError, MarkerBackend};
use crate::features::{FeatureCache, FeatureId};

/// One `{id, served}` entry of a `POST /toggle-markers` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleRecord {
    pub id: FeatureId,
    pub served: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StagedMember {
    id: FeatureId,
    prior: bool,
    marked_unserved: bool,
}

impl StagedMember {
    fn preview(&self) -> bool {
        if self.marked_unserved { false } else { !self.prior }
    }
}

/// Features captured by one draw, with their `served` value at push time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionBatch {
    members: Vec<StagedMember>,
}

impl SelectionBatch {
    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.members.iter().map(|member| member.id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Value `id` had when the batch was pushed.
    pub fn prior_served(&self, id: FeatureId) -> Option<bool> {
        self.members
            .iter()
            .find(|member| member.id == id)
            .map(|member| member.prior)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingState {
    Idle,
    Staged,
    Submitting,
}

/// What happens to staged batches when a submission fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Drop the batches whatever the server answered.
    #[default]
    ClearAlways,
    /// Put the batches back so the user can retry.
    RetainOnFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Nothing is staged")]
    NothingStaged,
    #[error("A submission is already in progress")]
    Submitting,
    #[error("Submitting staged changes failed: {0}")]
    Submit(#[source] BackendError),
}

/// Records to send while a submission is in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitPayload {
    pub records: Vec<ToggleRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Stack emptied.
    Cleared { batches: usize },
    /// Submission failed and the batches were put back.
    Retained { batches: usize },
}

/// Stack of staged selection batches.
#[derive(Debug, Default)]
pub struct EditStagingStack {
    batches: Vec<SelectionBatch>,
    in_flight: Option<Vec<SelectionBatch>>,
    modal_visible: bool,
    policy: CommitPolicy,
}

impl EditStagingStack {
    pub fn new(policy: CommitPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CommitPolicy) {
        self.policy = policy;
    }

    pub fn state(&self) -> StagingState {
        if self.in_flight.is_some() {
            StagingState::Submitting
        } else if self.batches.is_empty() {
            StagingState::Idle
        } else {
            StagingState::Staged
        }
    }

    pub fn modal_visible(&self) -> bool {
        self.modal_visible
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches(&self) -> &[SelectionBatch] {
        &self.batches
    }

    /// Total features across staged batches, duplicates included.
    pub fn staged_feature_count(&self) -> usize {
        self.batches.iter().map(SelectionBatch::len).sum()
    }

    /// Stage the features selected by one draw.
    ///
    /// Ids missing from `cache` are skipped. Each member is previewed as
    /// pending with the opposite of its current `served`. Returns the number
    /// of members; nothing is pushed when that is zero.
    pub fn push_batch(
        &mut self,
        ids: &[FeatureId],
        cache: &FeatureCache,
        visuals: &mut impl PendingVisuals,
    ) -> Result<usize, StagingError> {
        if self.in_flight.is_some() {
            return Err(StagingError::Submitting);
        }
        let members: Vec<StagedMember> = ids
            .iter()
            .filter_map(|&id| {
                cache.get(id).map(|feature| StagedMember {
                    id,
                    prior: feature.served,
                    marked_unserved: false,
                })
            })
            .collect();
        if members.is_empty() {
            return Ok(0);
        }
        for member in &members {
            visuals.show_pending(member.id, member.preview());
        }
        let count = members.len();
        self.batches.push(SelectionBatch { members });
        self.sync_modal();
        info!(batch = self.batches.len(), features = count, "Staged selection");
        Ok(count)
    }

    /// Pop the newest batch and restore its members' `served` values.
    ///
    /// Returns the number of features reverted, or `None` when nothing is
    /// staged.
    pub fn undo(
        &mut self,
        cache: &mut FeatureCache,
        visuals: &mut impl PendingVisuals,
    ) -> Option<usize> {
        let batch = self.batches.pop()?;
        for member in &batch.members {
            cache.set_served(member.id, member.prior);
            match self.newest_staged_member(member.id) {
                Some(older) => visuals.show_pending(member.id, older.preview()),
                None => visuals.settle(member.id, member.prior),
            }
        }
        self.sync_modal();
        Some(batch.len())
    }

    /// Set `served = false` on every member of the newest batch.
    pub fn mark_unserved(
        &mut self,
        cache: &mut FeatureCache,
        visuals: &mut impl PendingVisuals,
    ) -> usize {
        let Some(batch) = self.batches.last_mut() else {
            return 0;
        };
        let mut changed = 0usize;
        for member in &mut batch.members {
            if cache.set_served(member.id, false).is_some() {
                member.marked_unserved = true;
                visuals.show_pending(member.id, false);
                changed += 1;
            }
        }
        changed
    }

    /// Replay staged edits onto a freshly loaded cache and engine.
    ///
    /// Used after the markers source is reloaded or the base style swapped,
    /// both of which discard feature-state. Batches in flight are included.
    pub fn restage(&self, cache: &mut FeatureCache, visuals: &mut impl PendingVisuals) -> usize {
        let mut replayed = 0usize;
        let in_flight = self.in_flight.iter().flatten();
        for member in in_flight.chain(&self.batches).flat_map(|batch| &batch.members) {
            if cache.get(member.id).is_none() {
                continue;
            }
            if member.marked_unserved {
                cache.set_served(member.id, false);
            }
            visuals.show_pending(member.id, member.preview());
            replayed += 1;
        }
        replayed
    }

    /// Flatten staged batches into one submission and enter `Submitting`.
    ///
    /// Batches are walked oldest first; a feature staged more than once is
    /// sent once, at its first position, with its current `served`.
    pub fn begin_commit(&mut self, cache: &FeatureCache) -> Result<CommitPayload, StagingError> {
        if self.in_flight.is_some() {
            return Err(StagingError::Submitting);
        }
        if self.batches.is_empty() {
            return Err(StagingError::NothingStaged);
        }
        let mut positions: HashMap<FeatureId, usize> = HashMap::new();
        let mut records: Vec<ToggleRecord> = Vec::new();
        for id in self.batches.iter().flat_map(SelectionBatch::ids) {
            let Some(feature) = cache.get(id) else {
                warn!(%id, "Staged feature left the working set, skipping");
                continue;
            };
            let record = ToggleRecord {
                id,
                served: feature.served,
            };
            match positions.get(&id) {
                Some(&index) => records[index] = record,
                None => {
                    positions.insert(id, records.len());
                    records.push(record);
                }
            }
        }
        self.in_flight = Some(std::mem::take(&mut self.batches));
        self.sync_modal();
        Ok(CommitPayload { records })
    }

    /// Leave `Submitting` once the server has answered.
    pub fn finish_commit(
        &mut self,
        succeeded: bool,
        cache: &FeatureCache,
        visuals: &mut impl PendingVisuals,
    ) -> CommitOutcome {
        let batches = self.in_flight.take().unwrap_or_default();
        let count = batches.len();
        if !succeeded && self.policy == CommitPolicy::RetainOnFailure {
            self.batches = batches;
            self.sync_modal();
            return CommitOutcome::Retained { batches: count };
        }
        for id in batches.iter().flat_map(SelectionBatch::ids) {
            if let Some(feature) = cache.get(id) {
                visuals.settle(id, feature.served);
            }
        }
        self.sync_modal();
        CommitOutcome::Cleared { batches: count }
    }

    /// Submit everything in one request, then request exactly one reload
    /// whatever the outcome.
    pub fn commit(
        &mut self,
        cache: &FeatureCache,
        visuals: &mut impl PendingVisuals,
        backend: &impl MarkerBackend,
        reload: impl FnOnce(),
    ) -> Result<CommitOutcome, StagingError> {
        let payload = self.begin_commit(cache)?;
        let result = backend.toggle_markers(&payload.records);
        if let Err(err) = &result {
            warn!(records = payload.records.len(), "Toggle markers failed: {err}");
        }
        let outcome = self.finish_commit(result.is_ok(), cache, visuals);
        reload();
        match result {
            Ok(message) => {
                info!(records = payload.records.len(), %message, "Submitted staged changes");
                Ok(outcome)
            }
            Err(err) => Err(StagingError::Submit(err)),
        }
    }

    fn newest_staged_member(&self, id: FeatureId) -> Option<&StagedMember> {
        self.batches
            .iter()
            .rev()
            .find_map(|batch| batch.members.iter().find(|member| member.id == id))
    }

    fn sync_modal(&mut self) {
        self.modal_visible = !self.batches.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use super::*;
    use crate::features::ServedRecord;

    #[derive(Default)]
    struct FakeVisuals {
        states: HashMap<FeatureId, (bool, bool)>,
    }

    impl FakeVisuals {
        fn pending(&self, id: u64) -> bool {
            self.states.get(&FeatureId(id)).is_some_and(|&(pending, _)| pending)
        }

        fn shown_served(&self, id: u64) -> Option<bool> {
            self.states.get(&FeatureId(id)).map(|&(_, served)| served)
        }
    }

    impl PendingVisuals for FakeVisuals {
        fn show_pending(&mut self, id: FeatureId, preview_served: bool) {
            self.states.insert(id, (true, preview_served));
        }

        fn settle(&mut self, id: FeatureId, served: bool) {
            self.states.insert(id, (false, served));
        }
    }

    struct FakeBackend {
        fail: bool,
        calls: RefCell<Vec<Vec<ToggleRecord>>>,
    }

    impl FakeBackend {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl MarkerBackend for FakeBackend {
        fn toggle_markers(&self, records: &[ToggleRecord]) -> Result<String, BackendError> {
            self.calls.borrow_mut().push(records.to_vec());
            if self.fail {
                Err(BackendError::Server {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok("Markers updated".to_string())
            }
        }
    }

    fn cache(served: &[(u64, bool)]) -> FeatureCache {
        let mut cache = FeatureCache::new();
        cache.replace(served.iter().map(|&(id, served)| ServedRecord {
            address: format!("{id} Main St"),
            location_id: id,
            latitude: 40.0,
            longitude: -100.0 + id as f64 * 0.001,
            served,
        }));
        cache
    }

    fn served(cache: &FeatureCache, id: u64) -> bool {
        cache.get(FeatureId(id)).map(|feature| feature.served).unwrap()
    }

    fn ids(raw: &[u64]) -> Vec<FeatureId> {
        raw.iter().copied().map(FeatureId).collect()
    }

    #[test]
    fn push_then_undo_restores_served() {
        let mut cache = cache(&[(1, true), (2, false)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        assert_eq!(stack.push_batch(&ids(&[1, 2]), &cache, &mut visuals).unwrap(), 2);
        assert!(stack.modal_visible());
        assert!(visuals.pending(1));
        assert_eq!(visuals.shown_served(1), Some(false));
        assert_eq!(visuals.shown_served(2), Some(true));

        assert_eq!(stack.undo(&mut cache, &mut visuals), Some(2));
        assert!(served(&cache, 1));
        assert!(!served(&cache, 2));
        assert!(!visuals.pending(1));
        assert!(!stack.modal_visible());
        assert_eq!(stack.state(), StagingState::Idle);
    }

    #[test]
    fn mark_unserved_then_undo_scenario() {
        let mut cache = cache(&[(1, true), (2, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        stack.push_batch(&ids(&[1, 2]), &cache, &mut visuals).unwrap();
        assert_eq!(stack.mark_unserved(&mut cache, &mut visuals), 2);
        assert!(!served(&cache, 1));
        assert!(!served(&cache, 2));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.state(), StagingState::Staged);

        stack.undo(&mut cache, &mut visuals);
        assert!(stack.is_empty());
        assert!(served(&cache, 1));
        assert!(served(&cache, 2));
        assert!(!stack.modal_visible());
    }

    #[test]
    fn undo_only_reverts_newest_batch() {
        let mut cache = cache(&[(1, true), (2, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        stack.push_batch(&ids(&[1]), &cache, &mut visuals).unwrap();
        stack.mark_unserved(&mut cache, &mut visuals);
        stack.push_batch(&ids(&[2]), &cache, &mut visuals).unwrap();
        stack.mark_unserved(&mut cache, &mut visuals);

        stack.undo(&mut cache, &mut visuals);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.batches()[0].ids().collect::<Vec<_>>(), ids(&[1]));
        assert!(served(&cache, 2));
        assert!(!served(&cache, 1));
        assert!(stack.modal_visible());
    }

    #[test]
    fn undo_keeps_features_still_held_by_older_batches_pending() {
        let mut cache = cache(&[(1, true), (2, true), (3, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        stack.push_batch(&ids(&[1, 2]), &cache, &mut visuals).unwrap();
        stack.mark_unserved(&mut cache, &mut visuals);
        stack.push_batch(&ids(&[2, 3]), &cache, &mut visuals).unwrap();

        assert_eq!(stack.undo(&mut cache, &mut visuals), Some(2));
        assert!(visuals.pending(2));
        assert_eq!(visuals.shown_served(2), Some(false));
        assert!(!served(&cache, 2));
        assert!(!visuals.pending(3));
        assert!(served(&cache, 3));

        stack.undo(&mut cache, &mut visuals);
        assert!(!visuals.pending(2));
        assert!(served(&cache, 2));
    }

    #[test]
    fn modal_tracks_stack_after_every_operation() {
        let mut cache = cache(&[(1, true), (2, true), (3, false)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();
        let check = |stack: &EditStagingStack| assert_eq!(stack.modal_visible(), !stack.is_empty());

        stack.push_batch(&[], &cache, &mut visuals).unwrap();
        check(&stack);
        stack.push_batch(&ids(&[99]), &cache, &mut visuals).unwrap();
        check(&stack);
        assert!(stack.is_empty());
        stack.push_batch(&ids(&[1, 3]), &cache, &mut visuals).unwrap();
        check(&stack);
        stack.push_batch(&ids(&[2]), &cache, &mut visuals).unwrap();
        check(&stack);
        stack.undo(&mut cache, &mut visuals);
        check(&stack);
        stack.undo(&mut cache, &mut visuals);
        check(&stack);
        assert_eq!(stack.undo(&mut cache, &mut visuals), None);
        check(&stack);
    }

    #[test]
    fn commit_clears_and_reloads_once_on_success_and_failure() {
        for fail in [false, true] {
            let mut cache = cache(&[(1, true)]);
            let mut visuals = FakeVisuals::default();
            let mut stack = EditStagingStack::default();
            let backend = FakeBackend::new(fail);
            let reloads = Cell::new(0u32);

            stack.push_batch(&ids(&[1]), &cache, &mut visuals).unwrap();
            stack.mark_unserved(&mut cache, &mut visuals);
            let result = stack.commit(&cache, &mut visuals, &backend, || reloads.set(reloads.get() + 1));

            assert_eq!(result.is_err(), fail);
            assert!(stack.is_empty());
            assert!(!stack.modal_visible());
            assert_eq!(stack.state(), StagingState::Idle);
            assert_eq!(reloads.get(), 1);
            assert_eq!(
                *backend.calls.borrow(),
                vec![vec![ToggleRecord {
                    id: FeatureId(1),
                    served: false
                }]]
            );
            assert!(!visuals.pending(1));
        }
    }

    #[test]
    fn commit_sends_duplicate_features_once_with_latest_value() {
        let mut cache = cache(&[(1, true), (2, true), (3, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        stack.push_batch(&ids(&[1, 2]), &cache, &mut visuals).unwrap();
        stack.push_batch(&ids(&[2, 3]), &cache, &mut visuals).unwrap();
        stack.mark_unserved(&mut cache, &mut visuals);
        let payload = stack.begin_commit(&cache).unwrap();
        assert_eq!(
            payload.records,
            vec![
                ToggleRecord { id: FeatureId(1), served: true },
                ToggleRecord { id: FeatureId(2), served: false },
                ToggleRecord { id: FeatureId(3), served: false },
            ]
        );
        assert_eq!(stack.state(), StagingState::Submitting);
        assert!(!stack.modal_visible());
    }

    #[test]
    fn retain_on_failure_puts_batches_back() {
        let mut cache = cache(&[(1, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::new(CommitPolicy::RetainOnFailure);
        let backend = FakeBackend::new(true);
        let reloads = Cell::new(0u32);

        stack.push_batch(&ids(&[1]), &cache, &mut visuals).unwrap();
        stack.mark_unserved(&mut cache, &mut visuals);
        let err = stack
            .commit(&cache, &mut visuals, &backend, || reloads.set(reloads.get() + 1))
            .unwrap_err();
        assert!(matches!(err, StagingError::Submit(BackendError::Server { status: 500, .. })));
        assert_eq!(stack.len(), 1);
        assert!(stack.modal_visible());
        assert_eq!(reloads.get(), 1);
        assert!(visuals.pending(1));

        let ok = FakeBackend::new(false);
        let outcome = stack.commit(&cache, &mut visuals, &ok, || {}).unwrap();
        assert_eq!(outcome, CommitOutcome::Cleared { batches: 1 });
        assert!(stack.is_empty());
    }

    #[test]
    fn restage_replays_marks_onto_fresh_cache() {
        let mut stale = cache(&[(1, true), (2, false)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();
        stack.push_batch(&ids(&[1]), &stale, &mut visuals).unwrap();
        stack.mark_unserved(&mut stale, &mut visuals);
        stack.push_batch(&ids(&[2]), &stale, &mut visuals).unwrap();

        let mut fresh = cache(&[(1, true), (2, false)]);
        let mut fresh_visuals = FakeVisuals::default();
        assert_eq!(stack.restage(&mut fresh, &mut fresh_visuals), 2);
        assert!(!served(&fresh, 1));
        assert!(!served(&fresh, 2));
        assert_eq!(fresh_visuals.shown_served(1), Some(false));
        assert_eq!(fresh_visuals.shown_served(2), Some(true));
        assert!(fresh_visuals.pending(2));
    }

    #[test]
    fn push_and_commit_are_rejected_while_submitting() {
        let mut cache = cache(&[(1, true), (2, true)]);
        let mut visuals = FakeVisuals::default();
        let mut stack = EditStagingStack::default();

        assert!(matches!(stack.begin_commit(&cache), Err(StagingError::NothingStaged)));
        stack.push_batch(&ids(&[1]), &cache, &mut visuals).unwrap();
        stack.begin_commit(&cache).unwrap();
        assert!(matches!(
            stack.push_batch(&ids(&[2]), &cache, &mut visuals),
            Err(StagingError::Submitting)
        ));
        assert!(matches!(stack.begin_commit(&cache), Err(StagingError::Submitting)));
        assert_eq!(stack.undo(&mut cache, &mut visuals), None);
        assert_eq!(
            stack.finish_commit(true, &cache, &mut visuals),
            CommitOutcome::Cleared { batches: 1 }
        );
        assert_eq!(stack.state(), StagingState::Idle);
    }
}
