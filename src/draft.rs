use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::models::{
    Classification, EvaluationDraft, EvaluationRecord, EvaluationStatus, CRITERIA,
    CRITERIA_COUNT,
};
use crate::store::ReviewStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Clean,
    /// Edited, but with no content worth keeping.
    DirtyEmpty,
    DirtyMeaningful,
}

/// Tracks unsaved edits of the evaluation open for one inscription.
#[derive(Debug, Clone)]
pub struct DraftGuard {
    inscription_id: Uuid,
    original: EvaluationDraft,
    original_version: Option<i32>,
    current: EvaluationDraft,
    state: DraftState,
}

impl DraftGuard {
    pub fn new(inscription_id: Uuid, record: Option<EvaluationRecord>) -> Self {
        let (original, original_version) = match record {
            Some(record) => (record.draft, Some(record.version)),
            None => (EvaluationDraft::default(), None),
        };

        Self {
            inscription_id,
            current: original.clone(),
            original,
            original_version,
            state: DraftState::Clean,
        }
    }

    /// Loads the persisted evaluation, if any, as the comparison snapshot.
    pub async fn open(store: &dyn ReviewStore, inscription_id: Uuid) -> Result<Self, ReviewError> {
        let record = store.load_evaluation(inscription_id).await?;
        Ok(Self::new(inscription_id, record))
    }

    pub fn inscription_id(&self) -> Uuid {
        self.inscription_id
    }

    pub fn draft(&self) -> &EvaluationDraft {
        &self.current
    }

    pub fn original(&self) -> &EvaluationDraft {
        &self.original
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    /// True when closing or reloading the page would lose meaningful work.
    pub fn blocks_unload(&self) -> bool {
        self.state == DraftState::DirtyMeaningful
    }

    pub fn set_score(&mut self, criterion: usize, value: f64) -> Result<(), ReviewError> {
        if criterion >= CRITERIA_COUNT {
            return Err(ReviewError::unknown("criterion", &criterion.to_string()));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(ReviewError::InvalidScore {
                criterion: CRITERIA[criterion],
                value,
            });
        }
        self.current.scores[criterion] = value;
        self.recompute();
        Ok(())
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.current.note = note;
        self.recompute();
    }

    pub fn set_classification(&mut self, classification: Option<Classification>) {
        self.current.classification = classification;
        self.recompute();
    }

    pub fn set_status(&mut self, status: EvaluationStatus) {
        self.current.status = status;
        self.recompute();
    }

    /// Persists the current draft. On failure the guard keeps its state so
    /// the edits stay protected.
    pub async fn save(&mut self, store: &dyn ReviewStore) -> Result<EvaluationRecord, ReviewError> {
        let saved = store
            .save_evaluation(self.inscription_id, &self.current, self.original_version)
            .await;

        match saved {
            Ok(record) => {
                info!(
                    inscription = %self.inscription_id,
                    version = record.version,
                    total = record.total_score,
                    status = record.draft.status.as_str(),
                    "evaluation saved"
                );
                self.original = record.draft.clone();
                self.original_version = Some(record.version);
                self.current = record.draft.clone();
                self.recompute();
                Ok(record)
            }
            Err(err) => {
                warn!(inscription = %self.inscription_id, error = %err, "evaluation save failed");
                Err(err)
            }
        }
    }

    /// Drops the edits and returns to the last saved snapshot.
    pub fn abandon(&mut self) {
        self.current = self.original.clone();
        self.recompute();
    }

    fn recompute(&mut self) {
        // Only a persisted completion is terminal; an unsaved one is an edit.
        self.state = if self.original.is_completed() || self.current == self.original {
            DraftState::Clean
        } else if self.current.has_meaningful_data() {
            DraftState::DirtyMeaningful
        } else {
            DraftState::DirtyEmpty
        };
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::memory::MemoryStore;

    fn completed_record(inscription_id: Uuid) -> EvaluationRecord {
        EvaluationRecord {
            inscription_id,
            draft: EvaluationDraft {
                status: EvaluationStatus::Completed,
                ..EvaluationDraft::default()
            },
            total_score: 0.0,
            version: 3,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_edits_never_block_unload() {
        let mut guard = DraftGuard::new(Uuid::new_v4(), None);
        assert_eq!(guard.state(), DraftState::Clean);

        guard.set_note(Some("  ".to_string()));
        assert_eq!(guard.state(), DraftState::DirtyEmpty);
        assert!(!guard.blocks_unload());

        guard.set_score(0, 0.0).unwrap();
        assert!(!guard.blocks_unload());
    }

    #[test]
    fn any_positive_score_blocks_unload() {
        let mut guard = DraftGuard::new(Uuid::new_v4(), None);
        guard.set_score(4, 1.0).unwrap();
        assert_eq!(guard.state(), DraftState::DirtyMeaningful);
        assert!(guard.blocks_unload());
    }

    #[test]
    fn reverting_to_original_is_clean() {
        let mut guard = DraftGuard::new(Uuid::new_v4(), None);
        guard.set_classification(Some(Classification::Priority));
        assert!(guard.blocks_unload());

        guard.set_classification(None);
        assert_eq!(guard.state(), DraftState::Clean);
    }

    #[test]
    fn completed_evaluation_is_terminal() {
        let id = Uuid::new_v4();
        let mut guard = DraftGuard::new(id, Some(completed_record(id)));
        guard.set_score(1, 5.0).unwrap();
        guard.set_note(Some("late edit".to_string()));
        assert_eq!(guard.state(), DraftState::Clean);
    }

    #[test]
    fn rejects_negative_and_non_finite_scores() {
        let mut guard = DraftGuard::new(Uuid::new_v4(), None);
        assert!(matches!(
            guard.set_score(2, -1.0),
            Err(ReviewError::InvalidScore {
                criterion: "teaching_seniority",
                ..
            })
        ));
        assert!(guard.set_score(2, f64::NAN).is_err());
        assert!(guard.set_score(CRITERIA_COUNT, 1.0).is_err());
        assert_eq!(guard.state(), DraftState::Clean);
    }

    #[test]
    fn abandon_restores_snapshot() {
        let mut guard = DraftGuard::new(Uuid::new_v4(), None);
        guard.set_score(0, 3.0).unwrap();
        guard.abandon();
        assert_eq!(guard.state(), DraftState::Clean);
        assert_eq!(guard.draft(), guard.original());
    }

    #[tokio::test]
    async fn save_replaces_snapshot_and_cleans() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();
        let mut guard = DraftGuard::open(&store, id).await.unwrap();

        guard.set_score(0, 2.0).unwrap();
        guard.set_note(Some("strong portfolio".to_string()));
        let record = guard.save(&store).await.unwrap();

        assert_eq!(record.version, 1);
        assert!((record.total_score - 6.0).abs() < 0.001);
        assert_eq!(guard.state(), DraftState::Clean);
        assert_eq!(guard.original().scores[0], 2.0);

        guard.set_score(1, 1.0).unwrap();
        let record = guard.save(&store).await.unwrap();
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn completing_the_draft_clears_the_guard_once_saved() {
        let store = MemoryStore::default();
        let mut guard = DraftGuard::open(&store, Uuid::new_v4()).await.unwrap();
        guard.set_score(0, 7.0).unwrap();
        guard.set_status(EvaluationStatus::Completed);
        assert!(guard.blocks_unload());

        let record = guard.save(&store).await.unwrap();
        assert!(record.draft.is_completed());
        assert_eq!(guard.state(), DraftState::Clean);

        guard.set_score(0, 1.0).unwrap();
        assert_eq!(guard.state(), DraftState::Clean);
    }

    #[tokio::test]
    async fn failed_save_of_completed_draft_keeps_it_guarded() {
        let store = MemoryStore::default();
        store.fail_saves(true);
        let id = Uuid::new_v4();
        let mut guard = DraftGuard::open(&store, id).await.unwrap();
        guard.set_score(0, 7.0).unwrap();
        guard.set_status(EvaluationStatus::Completed);

        assert!(guard.save(&store).await.is_err());
        assert_eq!(guard.state(), DraftState::DirtyMeaningful);
        assert!(guard.blocks_unload());
        assert!(store.load_evaluation(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_save_keeps_draft_dirty() {
        let store = MemoryStore::default();
        store.fail_saves(true);
        let mut guard = DraftGuard::open(&store, Uuid::new_v4()).await.unwrap();
        guard.set_score(0, 1.0).unwrap();

        let err = guard.save(&store).await.unwrap_err();
        assert!(matches!(err, ReviewError::Save { .. }));
        assert!(guard.blocks_unload());
        assert_eq!(guard.draft().scores[0], 1.0);
    }

    #[tokio::test]
    async fn concurrent_save_is_reported_as_conflict() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();
        store.mark_evaluated(id, EvaluationDraft::default());

        let mut guard = DraftGuard::open(&store, id).await.unwrap();
        guard.set_score(7, 4.0).unwrap();
        store.bump_version(id);

        let err = guard.save(&store).await.unwrap_err();
        assert!(matches!(err, ReviewError::Conflict { inscription_id } if inscription_id == id));
        assert_eq!(guard.state(), DraftState::DirtyMeaningful);
    }
}
