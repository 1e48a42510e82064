use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ReviewError;

/// Number of sub-scores on an evaluation form.
pub const CRITERIA_COUNT: usize = 10;

pub const CRITERIA: [&str; CRITERIA_COUNT] = [
    "degree",
    "postgraduate",
    "teaching_seniority",
    "school_seniority",
    "courses",
    "publications",
    "background_check",
    "interview",
    "lesson_plan",
    "references",
];

pub type SubScores = [f64; CRITERIA_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeachingLevel {
    Inicial,
    Primario,
    Secundario,
}

impl TeachingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeachingLevel::Inicial => "inicial",
            TeachingLevel::Primario => "primario",
            TeachingLevel::Secundario => "secundario",
        }
    }
}

impl FromStr for TeachingLevel {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inicial" => Ok(TeachingLevel::Inicial),
            "primario" => Ok(TeachingLevel::Primario),
            "secundario" => Ok(TeachingLevel::Secundario),
            other => Err(ReviewError::unknown("teaching level", other)),
        }
    }
}

impl fmt::Display for TeachingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an inscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InscriptionStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    RequiresChanges,
}

impl InscriptionStatus {
    /// Statuses an evaluator is allowed to see in the queue.
    pub const REVIEWABLE: [InscriptionStatus; 5] = [
        InscriptionStatus::Submitted,
        InscriptionStatus::UnderReview,
        InscriptionStatus::Approved,
        InscriptionStatus::Rejected,
        InscriptionStatus::RequiresChanges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InscriptionStatus::Draft => "draft",
            InscriptionStatus::Submitted => "submitted",
            InscriptionStatus::UnderReview => "under_review",
            InscriptionStatus::Approved => "approved",
            InscriptionStatus::Rejected => "rejected",
            InscriptionStatus::RequiresChanges => "requires_changes",
        }
    }

    pub fn is_reviewable(&self) -> bool {
        Self::REVIEWABLE.contains(self)
    }
}

impl FromStr for InscriptionStatus {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(InscriptionStatus::Draft),
            "submitted" => Ok(InscriptionStatus::Submitted),
            "under_review" => Ok(InscriptionStatus::UnderReview),
            "approved" => Ok(InscriptionStatus::Approved),
            "rejected" => Ok(InscriptionStatus::Rejected),
            "requires_changes" => Ok(InscriptionStatus::RequiresChanges),
            other => Err(ReviewError::unknown("inscription status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationState {
    Evaluated,
    Unevaluated,
}

impl EvaluationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationState::Evaluated => "evaluated",
            EvaluationState::Unevaluated => "unevaluated",
        }
    }
}

impl FromStr for EvaluationState {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "evaluated" => Ok(EvaluationState::Evaluated),
            "unevaluated" => Ok(EvaluationState::Unevaluated),
            other => Err(ReviewError::unknown("evaluation state", other)),
        }
    }
}

/// Where a navigation into the review page started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceView {
    Evaluations,
}

impl SourceView {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceView::Evaluations => "evaluations",
        }
    }
}

impl FromStr for SourceView {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "evaluations" => Ok(SourceView::Evaluations),
            other => Err(ReviewError::unknown("source view", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Priority,
    Standard,
    Observed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Priority => "priority",
            Classification::Standard => "standard",
            Classification::Observed => "observed",
        }
    }
}

impl FromStr for Classification {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "priority" => Ok(Classification::Priority),
            "standard" => Ok(Classification::Standard),
            "observed" => Ok(Classification::Observed),
            other => Err(ReviewError::unknown("classification", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    #[default]
    Draft,
    Completed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Draft => "draft",
            EvaluationStatus::Completed => "completed",
        }
    }
}

impl FromStr for EvaluationStatus {
    type Err = ReviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(EvaluationStatus::Draft),
            "completed" => Ok(EvaluationStatus::Completed),
            other => Err(ReviewError::unknown("evaluation status", other)),
        }
    }
}

/// An inscription row as returned by the store, before queue assembly.
#[derive(Debug, Clone)]
pub struct InscriptionRecord {
    pub id: Uuid,
    pub person_id: Uuid,
    pub period_id: String,
    pub teaching_level: TeachingLevel,
    pub status: InscriptionStatus,
    pub display_name: String,
    pub dni: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InscriptionQueueEntry {
    pub id: Uuid,
    pub person_id: Uuid,
    pub teaching_level: TeachingLevel,
    pub period_id: String,
    pub evaluation_state: EvaluationState,
    pub display_name: String,
    pub dni: String,
    pub created_at: DateTime<Utc>,
}

impl InscriptionQueueEntry {
    pub fn is_evaluated(&self) -> bool {
        self.evaluation_state == EvaluationState::Evaluated
    }
}

/// Filter state carried across page transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationContext {
    pub period_id: String,
    pub level_filter: Option<TeachingLevel>,
    pub status_filter: Option<EvaluationState>,
    pub source_view: Option<SourceView>,
}

impl NavigationContext {
    pub fn for_period(period_id: impl Into<String>) -> Self {
        Self {
            period_id: period_id.into(),
            level_filter: None,
            status_filter: None,
            source_view: None,
        }
    }

    pub fn with_level(mut self, level: Option<TeachingLevel>) -> Self {
        self.level_filter = level;
        self
    }

    pub fn with_status(mut self, status: Option<EvaluationState>) -> Self {
        self.status_filter = status;
        self
    }

    pub fn from_list_view(mut self) -> Self {
        self.source_view = Some(SourceView::Evaluations);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationDraft {
    pub scores: SubScores,
    pub note: Option<String>,
    pub classification: Option<Classification>,
    pub status: EvaluationStatus,
}

impl EvaluationDraft {
    /// True when the draft carries content worth warning about on unload.
    pub fn has_meaningful_data(&self) -> bool {
        let score_sum: f64 = self.scores.iter().sum();
        let has_note = self
            .note
            .as_deref()
            .map(|note| !note.trim().is_empty())
            .unwrap_or(false);

        score_sum > 0.0 || has_note || self.classification.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == EvaluationStatus::Completed
    }
}

/// A persisted evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub inscription_id: Uuid,
    pub draft: EvaluationDraft,
    pub total_score: f64,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}
