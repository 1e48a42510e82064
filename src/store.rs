use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ReviewError;
use crate::models::{EvaluationDraft, EvaluationRecord, InscriptionRecord};

/// Persistence seam between the review workflow and the backing database.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Reviewable inscriptions of a period with person display data,
    /// newest first.
    async fn list_reviewable(&self, period_id: &str)
        -> Result<Vec<InscriptionRecord>, ReviewError>;

    /// Subset of `ids` that already has an evaluation record.
    async fn evaluated_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>, ReviewError>;

    async fn load_evaluation(
        &self,
        inscription_id: Uuid,
    ) -> Result<Option<EvaluationRecord>, ReviewError>;

    async fn load_evaluations(&self, ids: &[Uuid]) -> Result<Vec<EvaluationRecord>, ReviewError>;

    /// Creates or updates the evaluation of `inscription_id`.
    ///
    /// `expected_version` is the version the draft was loaded from (`None` when
    /// no record existed). A mismatch yields [`ReviewError::Conflict`].
    async fn save_evaluation(
        &self,
        inscription_id: Uuid,
        draft: &EvaluationDraft,
        expected_version: Option<i32>,
    ) -> Result<EvaluationRecord, ReviewError>;
}

#[cfg(test)]
pub mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use uuid::Uuid;

    use super::ReviewStore;
    use crate::error::ReviewError;
    use crate::models::{
        EvaluationDraft, EvaluationRecord, InscriptionRecord, InscriptionStatus, TeachingLevel,
    };
    use crate::scoring;

    /// Builds a submitted inscription created `minute` minutes into the period.
    pub fn inscription(
        period_id: &str,
        person_id: Uuid,
        level: TeachingLevel,
        minute: i64,
    ) -> InscriptionRecord {
        let base = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid base time");
        InscriptionRecord {
            id: Uuid::new_v4(),
            person_id,
            period_id: period_id.to_string(),
            teaching_level: level,
            status: InscriptionStatus::Submitted,
            display_name: format!("Teacher {minute}"),
            dni: format!("30{minute:06}"),
            created_at: base + ChronoDuration::minutes(minute),
        }
    }

    /// In-process store used by unit tests.
    #[derive(Default)]
    pub struct MemoryStore {
        inscriptions: Mutex<Vec<InscriptionRecord>>,
        evaluations: Mutex<HashMap<Uuid, EvaluationRecord>>,
        delays: Mutex<HashMap<String, Duration>>,
        fail_retrievals: AtomicBool,
        fail_saves: AtomicBool,
    }

    impl MemoryStore {
        pub fn with_inscriptions(inscriptions: Vec<InscriptionRecord>) -> Self {
            Self {
                inscriptions: Mutex::new(inscriptions),
                ..Self::default()
            }
        }

        pub fn push_inscription(&self, record: InscriptionRecord) {
            self.inscriptions.lock().unwrap().push(record);
        }

        pub fn mark_evaluated(&self, inscription_id: Uuid, draft: EvaluationDraft) {
            let record = EvaluationRecord {
                inscription_id,
                total_score: scoring::total_score(&draft.scores),
                draft,
                version: 1,
                updated_at: Utc::now(),
            };
            self.evaluations
                .lock()
                .unwrap()
                .insert(inscription_id, record);
        }

        /// Simulates another evaluator saving the same inscription.
        pub fn bump_version(&self, inscription_id: Uuid) {
            if let Some(record) = self.evaluations.lock().unwrap().get_mut(&inscription_id) {
                record.version += 1;
            }
        }

        pub fn delay_period(&self, period_id: &str, delay: Duration) {
            self.delays
                .lock()
                .unwrap()
                .insert(period_id.to_string(), delay);
        }

        pub fn fail_retrievals(&self, fail: bool) {
            self.fail_retrievals.store(fail, Ordering::SeqCst);
        }

        pub fn fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        fn check_retrieval(&self, what: &'static str) -> Result<(), ReviewError> {
            if self.fail_retrievals.load(Ordering::SeqCst) {
                return Err(ReviewError::retrieval(what)(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ReviewStore for MemoryStore {
        async fn list_reviewable(
            &self,
            period_id: &str,
        ) -> Result<Vec<InscriptionRecord>, ReviewError> {
            let delay = self.delays.lock().unwrap().get(period_id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.check_retrieval("inscriptions")?;

            let mut records: Vec<InscriptionRecord> = self
                .inscriptions
                .lock()
                .unwrap()
                .iter()
                .filter(|record| record.period_id == period_id && record.status.is_reviewable())
                .cloned()
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        }

        async fn evaluated_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>, ReviewError> {
            self.check_retrieval("evaluation flags")?;
            let evaluations = self.evaluations.lock().unwrap();
            Ok(ids
                .iter()
                .filter(|id| evaluations.contains_key(id))
                .copied()
                .collect())
        }

        async fn load_evaluation(
            &self,
            inscription_id: Uuid,
        ) -> Result<Option<EvaluationRecord>, ReviewError> {
            self.check_retrieval("evaluation")?;
            Ok(self
                .evaluations
                .lock()
                .unwrap()
                .get(&inscription_id)
                .cloned())
        }

        async fn load_evaluations(
            &self,
            ids: &[Uuid],
        ) -> Result<Vec<EvaluationRecord>, ReviewError> {
            self.check_retrieval("evaluations")?;
            let evaluations = self.evaluations.lock().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| evaluations.get(id).cloned())
                .collect())
        }

        async fn save_evaluation(
            &self,
            inscription_id: Uuid,
            draft: &EvaluationDraft,
            expected_version: Option<i32>,
        ) -> Result<EvaluationRecord, ReviewError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(ReviewError::save(inscription_id)(sqlx::Error::PoolTimedOut));
            }

            let mut evaluations = self.evaluations.lock().unwrap();
            let current_version = evaluations.get(&inscription_id).map(|r| r.version);
            if current_version != expected_version {
                return Err(ReviewError::Conflict { inscription_id });
            }

            let record = EvaluationRecord {
                inscription_id,
                draft: draft.clone(),
                total_score: scoring::total_score(&draft.scores),
                version: current_version.map(|v| v + 1).unwrap_or(1),
                updated_at: Utc::now(),
            };
            evaluations.insert(inscription_id, record.clone());
            Ok(record)
        }
    }
}
