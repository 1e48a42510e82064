use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::models::{
    EvaluationDraft, EvaluationRecord, InscriptionRecord, InscriptionStatus, SubScores,
    CRITERIA_COUNT,
};
use crate::scoring;
use crate::store::ReviewStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let periods = vec![
        (
            "2026-1",
            "Inscripción 2026 - primer llamado",
            NaiveDate::from_ymd_opt(2026, 2, 1).context("invalid date")?,
            NaiveDate::from_ymd_opt(2026, 3, 15).context("invalid date")?,
        ),
        (
            "2026-2",
            "Inscripción 2026 - segundo llamado",
            NaiveDate::from_ymd_opt(2026, 7, 1).context("invalid date")?,
            NaiveDate::from_ymd_opt(2026, 8, 15).context("invalid date")?,
        ),
    ];

    for (id, name, starts_on, ends_on) in periods {
        sqlx::query(
            r#"
            INSERT INTO inscription_review.periods (id, name, starts_on, ends_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, starts_on = EXCLUDED.starts_on, ends_on = EXCLUDED.ends_on
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(starts_on)
        .bind(ends_on)
        .execute(pool)
        .await?;
    }

    let people = vec![
        (
            Uuid::parse_str("5e0c2b71-8a3d-4f6e-b1c9-2d7a40e1f301")?,
            "Lucía Fernández",
            "30111222",
        ),
        (
            Uuid::parse_str("5e0c2b71-8a3d-4f6e-b1c9-2d7a40e1f302")?,
            "Martín Gómez",
            "28999000",
        ),
        (
            Uuid::parse_str("5e0c2b71-8a3d-4f6e-b1c9-2d7a40e1f303")?,
            "Sofía Rodríguez",
            "33444555",
        ),
    ];

    for (id, name, dni) in &people {
        sqlx::query(
            r#"
            INSERT INTO inscription_review.people (id, full_name, dni)
            VALUES ($1, $2, $3)
            ON CONFLICT (dni) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(dni)
        .execute(pool)
        .await?;
    }

    // Martín resubmitted the primario inscription; only the newer one should
    // reach the review queue.
    let opened = Utc::now() - Duration::days(10);
    let inscriptions = vec![
        ("9b1c4f0e-52a4-4b7e-9a55-1f2d0c6f0001", 0, "primario", "submitted", 0),
        ("9b1c4f0e-52a4-4b7e-9a55-1f2d0c6f0002", 1, "primario", "requires_changes", 1),
        ("9b1c4f0e-52a4-4b7e-9a55-1f2d0c6f0003", 1, "primario", "submitted", 3),
        ("9b1c4f0e-52a4-4b7e-9a55-1f2d0c6f0004", 2, "secundario", "under_review", 2),
        ("9b1c4f0e-52a4-4b7e-9a55-1f2d0c6f0005", 2, "inicial", "draft", 4),
    ];

    for (id, person, level, status, day) in inscriptions {
        sqlx::query(
            r#"
            INSERT INTO inscription_review.inscriptions
            (id, person_id, period_id, teaching_level, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(people[person].0)
        .bind("2026-1")
        .bind(level)
        .bind(status)
        .bind(opened + Duration::days(day))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// [`ReviewStore`] backed by the `inscription_review` Postgres schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_failure(err: ReviewError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn inscription_from_row(row: &PgRow) -> Result<InscriptionRecord, sqlx::Error> {
    let level: String = row.try_get("teaching_level")?;
    let status: String = row.try_get("status")?;

    Ok(InscriptionRecord {
        id: row.try_get("id")?,
        person_id: row.try_get("person_id")?,
        period_id: row.try_get("period_id")?,
        teaching_level: level.parse().map_err(decode_failure)?,
        status: status.parse().map_err(decode_failure)?,
        display_name: row.try_get("full_name")?,
        dni: row.try_get("dni")?,
        created_at: row.try_get("created_at")?,
    })
}

fn scores_from_column(values: Vec<f64>) -> Result<SubScores, sqlx::Error> {
    let count = values.len();
    values.try_into().map_err(|_| {
        sqlx::Error::Decode(format!("expected {CRITERIA_COUNT} scores, found {count}").into())
    })
}

fn evaluation_from_row(row: &PgRow) -> Result<EvaluationRecord, sqlx::Error> {
    let classification: Option<String> = row.try_get("classification")?;
    let status: String = row.try_get("status")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(EvaluationRecord {
        inscription_id: row.try_get("inscription_id")?,
        draft: EvaluationDraft {
            scores: scores_from_column(row.try_get("scores")?)?,
            note: row.try_get("note")?,
            classification: classification
                .map(|tag| tag.parse())
                .transpose()
                .map_err(decode_failure)?,
            status: status.parse().map_err(decode_failure)?,
        },
        total_score: row.try_get("total_score")?,
        version: row.try_get("version")?,
        updated_at,
    })
}

const EVALUATION_COLUMNS: &str =
    "inscription_id, scores, note, classification, status, total_score, version, updated_at";

#[async_trait]
impl ReviewStore for PgStore {
    async fn list_reviewable(
        &self,
        period_id: &str,
    ) -> Result<Vec<InscriptionRecord>, ReviewError> {
        let reviewable: Vec<&str> = InscriptionStatus::REVIEWABLE
            .iter()
            .map(|status| status.as_str())
            .collect();

        let rows = sqlx::query(
            "SELECT i.id, i.person_id, i.period_id, i.teaching_level, i.status, i.created_at, \
             p.full_name, p.dni \
             FROM inscription_review.inscriptions i \
             JOIN inscription_review.people p ON p.id = i.person_id \
             WHERE i.period_id = $1 AND i.status = ANY($2) \
             ORDER BY i.created_at DESC",
        )
        .bind(period_id)
        .bind(reviewable)
        .fetch_all(&self.pool)
        .await
        .map_err(ReviewError::retrieval("inscriptions"))?;

        debug!(period = period_id, rows = rows.len(), "fetched reviewable inscriptions");

        rows.iter()
            .map(inscription_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ReviewError::retrieval("inscriptions"))
    }

    async fn evaluated_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>, ReviewError> {
        let rows: Vec<Uuid> = sqlx::query_scalar(
            "SELECT inscription_id FROM inscription_review.evaluations \
             WHERE inscription_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(ReviewError::retrieval("evaluation flags"))?;

        Ok(rows.into_iter().collect())
    }

    async fn load_evaluation(
        &self,
        inscription_id: Uuid,
    ) -> Result<Option<EvaluationRecord>, ReviewError> {
        let query = format!(
            "SELECT {EVALUATION_COLUMNS} FROM inscription_review.evaluations \
             WHERE inscription_id = $1"
        );
        let row = sqlx::query(&query)
            .bind(inscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ReviewError::retrieval("evaluation"))?;

        row.as_ref()
            .map(evaluation_from_row)
            .transpose()
            .map_err(ReviewError::retrieval("evaluation"))
    }

    async fn load_evaluations(&self, ids: &[Uuid]) -> Result<Vec<EvaluationRecord>, ReviewError> {
        let query = format!(
            "SELECT {EVALUATION_COLUMNS} FROM inscription_review.evaluations \
             WHERE inscription_id = ANY($1)"
        );
        let rows = sqlx::query(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(ReviewError::retrieval("evaluations"))?;

        rows.iter()
            .map(evaluation_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ReviewError::retrieval("evaluations"))
    }

    async fn save_evaluation(
        &self,
        inscription_id: Uuid,
        draft: &EvaluationDraft,
        expected_version: Option<i32>,
    ) -> Result<EvaluationRecord, ReviewError> {
        let total = scoring::total_score(&draft.scores);
        let scores = draft.scores.to_vec();
        let classification = draft.classification.map(|tag| tag.as_str());

        // A missing record may only be created once; an existing one only
        // updated from the version it was read at.
        let query = match expected_version {
            None => format!(
                r#"
                INSERT INTO inscription_review.evaluations
                (inscription_id, scores, note, classification, status, total_score, version, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, 1, now())
                ON CONFLICT (inscription_id) DO NOTHING
                RETURNING {EVALUATION_COLUMNS}
                "#
            ),
            Some(_) => format!(
                r#"
                UPDATE inscription_review.evaluations
                SET scores = $2, note = $3, classification = $4, status = $5,
                    total_score = $6, version = version + 1, updated_at = now()
                WHERE inscription_id = $1 AND version = $7
                RETURNING {EVALUATION_COLUMNS}
                "#
            ),
        };

        let mut statement = sqlx::query(&query)
            .bind(inscription_id)
            .bind(&scores)
            .bind(draft.note.as_deref())
            .bind(classification)
            .bind(draft.status.as_str())
            .bind(total);
        if let Some(version) = expected_version {
            statement = statement.bind(version);
        }

        let row = statement
            .fetch_optional(&self.pool)
            .await
            .map_err(ReviewError::save(inscription_id))?
            .ok_or(ReviewError::Conflict { inscription_id })?;

        let record = evaluation_from_row(&row).map_err(ReviewError::save(inscription_id))?;
        info!(inscription = %inscription_id, version = record.version, "evaluation persisted");
        Ok(record)
    }
}
