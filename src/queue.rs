use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::models::{
    EvaluationState, InscriptionQueueEntry, InscriptionRecord, NavigationContext, TeachingLevel,
};
use crate::navigation::Navigator;
use crate::store::ReviewStore;

/// The ordered queue for one set of filters plus the cursor of the focused entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub context: NavigationContext,
    pub entries: Vec<InscriptionQueueEntry>,
    pub cursor: Option<usize>,
}

impl QueueSnapshot {
    pub fn empty(context: NavigationContext) -> Self {
        Self {
            context,
            entries: Vec::new(),
            cursor: None,
        }
    }

    /// Cursor position, or -1 when the focused entry is not in the queue.
    pub fn cursor_index(&self) -> isize {
        self.cursor.map(|index| index as isize).unwrap_or(-1)
    }

    pub fn evaluated_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_evaluated()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.evaluated_count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebuildOutcome {
    Applied(QueueSnapshot),
    /// A newer rebuild started while this one was in flight; its result was dropped.
    Stale,
}

pub fn join_evaluation_state(
    records: Vec<InscriptionRecord>,
    evaluated: &HashSet<Uuid>,
) -> Vec<InscriptionQueueEntry> {
    records
        .into_iter()
        .filter(|record| record.status.is_reviewable())
        .map(|record| InscriptionQueueEntry {
            evaluation_state: if evaluated.contains(&record.id) {
                EvaluationState::Evaluated
            } else {
                EvaluationState::Unevaluated
            },
            id: record.id,
            person_id: record.person_id,
            teaching_level: record.teaching_level,
            period_id: record.period_id,
            display_name: record.display_name,
            dni: record.dni,
            created_at: record.created_at,
        })
        .collect()
}

/// Keeps one entry per (person, level): the most recently created, the first
/// one seen on ties. Survivors keep their input order.
pub fn dedup_latest(entries: Vec<InscriptionQueueEntry>) -> Vec<InscriptionQueueEntry> {
    let mut winners: HashMap<(Uuid, TeachingLevel), usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let key = (entry.person_id, entry.teaching_level);
        let winner = winners.entry(key).or_insert(index);
        if entry.created_at > entries[*winner].created_at {
            *winner = index;
        }
    }

    let keep: HashSet<usize> = winners.into_values().collect();
    entries
        .into_iter()
        .enumerate()
        .filter(|(index, _)| keep.contains(index))
        .map(|(_, entry)| entry)
        .collect()
}

pub fn assemble_queue(
    records: Vec<InscriptionRecord>,
    evaluated: &HashSet<Uuid>,
    context: &NavigationContext,
) -> Vec<InscriptionQueueEntry> {
    let mut entries = join_evaluation_state(records, evaluated);

    if let Some(level) = context.level_filter {
        entries.retain(|entry| entry.teaching_level == level);
    }

    let mut entries = dedup_latest(entries);

    if let Some(state) = context.status_filter {
        entries.retain(|entry| entry.evaluation_state == state);
    }

    entries
}

pub fn locate(entries: &[InscriptionQueueEntry], focus: Option<Uuid>) -> Option<usize> {
    let focus = focus?;
    entries.iter().position(|entry| entry.id == focus)
}

/// Fetches and assembles the queue for `context`. Read-only and idempotent.
pub async fn build_queue(
    store: &dyn ReviewStore,
    context: &NavigationContext,
    focus: Option<Uuid>,
) -> Result<QueueSnapshot, ReviewError> {
    let records = store.list_reviewable(&context.period_id).await?;
    let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
    let evaluated = if ids.is_empty() {
        HashSet::new()
    } else {
        store.evaluated_ids(&ids).await?
    };

    let entries = assemble_queue(records, &evaluated, context);
    let cursor = locate(&entries, focus);

    Ok(QueueSnapshot {
        context: context.clone(),
        entries,
        cursor,
    })
}

/// Owns the queue of one review session and applies only the most recently
/// started rebuild.
pub struct QueueSession {
    store: Arc<dyn ReviewStore>,
    generation: AtomicU64,
    current: Mutex<Option<QueueSnapshot>>,
}

impl QueueSession {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self {
            store,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    pub async fn rebuild(
        &self,
        context: NavigationContext,
        focus: Option<Uuid>,
    ) -> Result<RebuildOutcome, ReviewError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, period = %context.period_id, "rebuilding review queue");

        let result = build_queue(self.store.as_ref(), &context, focus).await;

        let mut current = self.lock_current();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding stale queue result");
            return Ok(RebuildOutcome::Stale);
        }

        match result {
            Ok(snapshot) => {
                info!(
                    period = %snapshot.context.period_id,
                    entries = snapshot.entries.len(),
                    pending = snapshot.pending_count(),
                    cursor = snapshot.cursor_index(),
                    "review queue ready"
                );
                *current = Some(snapshot.clone());
                Ok(RebuildOutcome::Applied(snapshot))
            }
            Err(err) => {
                warn!(error = %err, period = %context.period_id, "review queue rebuild failed");
                *current = Some(QueueSnapshot::empty(context));
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> Option<QueueSnapshot> {
        self.lock_current().clone()
    }

    pub fn navigator(&self) -> Option<Navigator> {
        self.snapshot().map(Navigator::from_snapshot)
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<QueueSnapshot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
