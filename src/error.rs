use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to retrieve {what}: {source}")]
    Retrieval {
        what: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to save evaluation for inscription {inscription_id}: {source}")]
    Save {
        inscription_id: Uuid,
        #[source]
        source: sqlx::Error,
    },
    #[error("evaluation for inscription {inscription_id} was changed by someone else; reload before saving")]
    Conflict { inscription_id: Uuid },
    #[error("score for {criterion} must be a finite number >= 0, got {value}")]
    InvalidScore { criterion: &'static str, value: f64 },
    #[error("invalid review location: {0}")]
    InvalidLocation(String),
    #[error("unknown {kind} value: {value:?}")]
    UnknownValue { kind: &'static str, value: String },
}

impl ReviewError {
    pub fn retrieval(what: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| ReviewError::Retrieval { what, source }
    }

    pub fn save(inscription_id: Uuid) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| ReviewError::Save {
            inscription_id,
            source,
        }
    }

    pub fn unknown(kind: &'static str, value: &str) -> Self {
        ReviewError::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }
}
