use std::fmt;

use tracing::info;
use url::form_urlencoded;
use uuid::Uuid;

use crate::error::ReviewError;
use crate::models::{
    EvaluationState, InscriptionQueueEntry, NavigationContext, SourceView, TeachingLevel,
};
use crate::queue::QueueSnapshot;

pub const EVALUATIONS_PATH: &str = "/evaluations";

const PERIOD_PARAM: &str = "period";
const LEVEL_PARAM: &str = "level";
const STATUS_PARAM: &str = "status";
const FROM_PARAM: &str = "from";
const ALL: &str = "all";

/// Review page of a single inscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLocation {
    pub inscription_id: Uuid,
    pub context: NavigationContext,
}

impl ReviewLocation {
    pub fn href(&self) -> String {
        format!(
            "{EVALUATIONS_PATH}/{}?{}",
            self.inscription_id,
            encode_context(&self.context)
        )
    }

    pub fn parse(href: &str) -> Result<Self, ReviewError> {
        let (path, query) = href.split_once('?').unwrap_or((href, ""));
        let id = path
            .strip_prefix(EVALUATIONS_PATH)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| ReviewError::InvalidLocation(format!("not a review page: {path}")))?;
        let inscription_id = Uuid::parse_str(id)
            .map_err(|_| ReviewError::InvalidLocation(format!("bad inscription id: {id}")))?;

        Ok(Self {
            inscription_id,
            context: decode_context(query)?,
        })
    }
}

impl fmt::Display for ReviewLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

/// The evaluator's list view, restored with the filters it was left with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLocation {
    pub context: NavigationContext,
}

impl ListLocation {
    pub fn href(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        append_filters(&mut query, &self.context);
        format!("{EVALUATIONS_PATH}?{}", query.finish())
    }
}

impl fmt::Display for ListLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

fn append_filters(query: &mut form_urlencoded::Serializer<'_, String>, context: &NavigationContext) {
    query.append_pair(PERIOD_PARAM, &context.period_id);
    if let Some(level) = context.level_filter {
        query.append_pair(LEVEL_PARAM, level.as_str());
    }
    if let Some(status) = context.status_filter {
        query.append_pair(STATUS_PARAM, status.as_str());
    }
}

pub fn encode_context(context: &NavigationContext) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    append_filters(&mut query, context);
    if let Some(source) = context.source_view {
        query.append_pair(FROM_PARAM, source.as_str());
    }
    query.finish()
}

pub fn decode_context(query: &str) -> Result<NavigationContext, ReviewError> {
    let mut period_id = None;
    let mut level_filter = None;
    let mut status_filter = None;
    let mut source_view = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            PERIOD_PARAM => period_id = Some(value.into_owned()),
            LEVEL_PARAM => level_filter = parse_level_filter(&value).map_err(as_location)?,
            STATUS_PARAM => status_filter = parse_status_filter(&value).map_err(as_location)?,
            FROM_PARAM => source_view = Some(value.parse::<SourceView>().map_err(as_location)?),
            _ => {}
        }
    }

    let period_id = period_id
        .filter(|period| !period.is_empty())
        .ok_or_else(|| ReviewError::InvalidLocation("missing period".to_string()))?;

    Ok(NavigationContext {
        period_id,
        level_filter,
        status_filter,
        source_view,
    })
}

/// Parses a level filter; "all" and the empty string mean no filter.
pub fn parse_level_filter(value: &str) -> Result<Option<TeachingLevel>, ReviewError> {
    match value {
        "" | ALL => Ok(None),
        other => other.parse().map(Some),
    }
}

/// Parses a status filter; "all" and the empty string mean no filter.
pub fn parse_status_filter(value: &str) -> Result<Option<EvaluationState>, ReviewError> {
    match value {
        "" | ALL => Ok(None),
        other => other.parse().map(Some),
    }
}

fn as_location(err: ReviewError) -> ReviewError {
    ReviewError::InvalidLocation(err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextUnevaluated {
    Found(ReviewLocation),
    NoPending,
}

/// Moves a cursor through a built queue. Never re-sorts.
#[derive(Debug, Clone)]
pub struct Navigator {
    entries: Vec<InscriptionQueueEntry>,
    cursor: Option<usize>,
    context: NavigationContext,
}

impl Navigator {
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            entries: snapshot.entries,
            cursor: snapshot.cursor,
            context: snapshot.context,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&InscriptionQueueEntry> {
        self.cursor.and_then(|index| self.entries.get(index))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_go_to_previous(&self) -> bool {
        matches!(self.cursor, Some(index) if index > 0)
    }

    pub fn can_go_to_next(&self) -> bool {
        match self.cursor {
            Some(index) => index + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    pub fn go_to_next(&mut self) -> Option<ReviewLocation> {
        if !self.can_go_to_next() {
            return None;
        }
        let target = self.cursor.map_or(0, |index| index + 1);
        Some(self.move_to(target))
    }

    pub fn go_to_previous(&mut self) -> Option<ReviewLocation> {
        if !self.can_go_to_previous() {
            return None;
        }
        let target = self.cursor.map_or(0, |index| index - 1);
        Some(self.move_to(target))
    }

    /// Next unevaluated entry after the cursor, wrapping to the start of the
    /// queue but never landing on the current entry.
    pub fn go_to_next_unevaluated(&mut self) -> NextUnevaluated {
        let start = self.cursor.map_or(0, |index| index + 1);
        let wrap_end = self.cursor.unwrap_or(0);

        let found = (start..self.entries.len())
            .chain(0..wrap_end)
            .find(|&index| !self.entries[index].is_evaluated());

        match found {
            Some(index) => NextUnevaluated::Found(self.move_to(index)),
            None => {
                info!(period = %self.context.period_id, "no pending entries in queue");
                NextUnevaluated::NoPending
            }
        }
    }

    pub fn back_to_evaluations(&self) -> ListLocation {
        ListLocation {
            context: self.context.clone(),
        }
    }

    fn move_to(&mut self, index: usize) -> ReviewLocation {
        self.cursor = Some(index);
        ReviewLocation {
            inscription_id: self.entries[index].id,
            context: self.context.clone(),
        }
    }
}
