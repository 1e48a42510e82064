use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Classification, EvaluationRecord, InscriptionQueueEntry, SubScores, CRITERIA, CRITERIA_COUNT,
};

#[derive(Debug, Clone, Serialize)]
pub struct MeritRow {
    pub position: usize,
    pub entry: InscriptionQueueEntry,
    pub total_score: f64,
    pub classification: Option<Classification>,
}

pub fn criterion_weight(index: usize) -> f64 {
    match index {
        0 => 3.0,
        1 => 2.0,
        2 => 1.5,
        3 => 1.0,
        4 | 5 => 0.5,
        6 => 1.0,
        7 | 8 => 2.0,
        _ => 0.5,
    }
}

pub fn criterion_index(name: &str) -> Option<usize> {
    CRITERIA.iter().position(|criterion| *criterion == name)
}

pub fn total_score(scores: &SubScores) -> f64 {
    (0..CRITERIA_COUNT)
        .map(|index| scores[index] * criterion_weight(index))
        .sum()
}

/// Ranks completed evaluations of the given queue entries by total score.
pub fn rank_merit(entries: &[InscriptionQueueEntry], records: &[EvaluationRecord]) -> Vec<MeritRow> {
    let by_inscription: HashMap<Uuid, &EvaluationRecord> = records
        .iter()
        .map(|record| (record.inscription_id, record))
        .collect();

    let mut rows: Vec<MeritRow> = entries
        .iter()
        .filter_map(|entry| {
            let record = by_inscription.get(&entry.id)?;
            if !record.draft.is_completed() {
                return None;
            }
            Some(MeritRow {
                position: 0,
                entry: entry.clone(),
                total_score: total_score(&record.draft.scores),
                classification: record.draft.classification,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.display_name.cmp(&b.entry.display_name))
            .then_with(|| a.entry.dni.cmp(&b.entry.dni))
    });

    for (index, row) in rows.iter_mut().enumerate() {
        row.position = index + 1;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationDraft, EvaluationState, EvaluationStatus, TeachingLevel};
    use chrono::Utc;

    fn entry(name: &str, dni: &str) -> InscriptionQueueEntry {
        InscriptionQueueEntry {
            id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            teaching_level: TeachingLevel::Primario,
            period_id: "2026-1".to_string(),
            evaluation_state: EvaluationState::Evaluated,
            display_name: name.to_string(),
            dni: dni.to_string(),
            created_at: Utc::now(),
        }
    }

    fn record(inscription_id: Uuid, degree: f64, status: EvaluationStatus) -> EvaluationRecord {
        let mut scores = [0.0; CRITERIA_COUNT];
        scores[0] = degree;
        EvaluationRecord {
            inscription_id,
            draft: EvaluationDraft {
                scores,
                status,
                ..EvaluationDraft::default()
            },
            total_score: total_score(&scores),
            version: 1,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn total_applies_criterion_weights() {
        let mut scores = [0.0; CRITERIA_COUNT];
        scores[criterion_index("degree").unwrap()] = 2.0;
        scores[criterion_index("interview").unwrap()] = 1.0;
        scores[criterion_index("references").unwrap()] = 4.0;

        let expected = 2.0 * 3.0 + 1.0 * 2.0 + 4.0 * 0.5;
        assert!((total_score(&scores) - expected).abs() < 0.001);
    }

    #[test]
    fn unknown_criterion_has_no_index() {
        assert_eq!(criterion_index("charisma"), None);
    }

    #[test]
    fn merit_ranks_completed_evaluations_only() {
        let avery = entry("Avery Lee", "30111222");
        let jules = entry("Jules Moreno", "28999000");
        let kiara = entry("Kiara Patel", "33444555");
        let records = vec![
            record(avery.id, 2.0, EvaluationStatus::Completed),
            record(jules.id, 5.0, EvaluationStatus::Completed),
            record(kiara.id, 9.0, EvaluationStatus::Draft),
        ];

        let rows = rank_merit(&[avery, jules, kiara], &records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry.display_name, "Jules Moreno");
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].entry.display_name, "Avery Lee");
        assert_eq!(rows[1].position, 2);
    }

    #[test]
    fn merit_ties_break_on_name() {
        let zoe = entry("Zoe Quinn", "1");
        let ana = entry("Ana Ruiz", "2");
        let records = vec![
            record(zoe.id, 3.0, EvaluationStatus::Completed),
            record(ana.id, 3.0, EvaluationStatus::Completed),
        ];

        let rows = rank_merit(&[zoe, ana], &records);
        assert_eq!(rows[0].entry.display_name, "Ana Ruiz");
    }
}
