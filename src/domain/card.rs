use crate::domain::validation::{check_fields, CardDraft, DEFAULT_DESCRIPTION_LIMIT};
use crate::error::{ProjectManagerError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unique identifier for a card, generated once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    /// Generates a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for CardId {
    type Err = ProjectManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ProjectManagerError::InvalidCardId(s.to_string()))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Board partition a card belongs to, in column order
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl CardStatus {
    pub const ALL: [CardStatus; 3] = [Self::Todo, Self::Doing, Self::Done];

    /// Every other status, in column order
    pub fn others(&self) -> Vec<CardStatus> {
        Self::ALL.iter().copied().filter(|s| s != self).collect()
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "TODO"),
            Self::Doing => write!(f, "DOING"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

impl FromStr for CardStatus {
    type Err = ProjectManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            _ => Err(ProjectManagerError::ConfigError(format!(
                "Invalid card status '{}'. Valid statuses: todo, doing, done",
                s
            ))),
        }
    }
}

/// One task on the board.
///
/// Fields are read-only outside the crate; status only changes through
/// [`Board::move_card`](crate::domain::board::Board::move_card).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    title: String,
    description: String,
    deadline_date: DateTime<Utc>,
    status: CardStatus,
}

impl Card {
    /// Creates a ToDo card using the default description limit
    pub fn create(
        title: impl Into<String>,
        description: impl Into<String>,
        deadline_date: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::from_draft(
            CardDraft::new(title, description, deadline_date),
            DEFAULT_DESCRIPTION_LIMIT,
        )
    }

    /// Validates `draft` and assigns a fresh id and the default status
    pub fn from_draft(draft: CardDraft, description_limit: usize) -> Result<Self, ValidationError> {
        draft.validate(description_limit)?;
        Ok(Self {
            id: CardId::generate(),
            title: draft.title,
            description: draft.description,
            deadline_date: draft.deadline_date,
            status: CardStatus::default(),
        })
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn deadline_date(&self) -> DateTime<Utc> {
        self.deadline_date
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    /// A card is expired once its deadline is strictly before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline_date < now
    }

    /// Re-runs the creation checks, for cards that did not come from a draft
    pub fn validate(&self, description_limit: usize) -> Result<(), ValidationError> {
        check_fields(&self.title, &self.description, description_limit)
    }

    /// Case-insensitive match against title and description
    pub fn matches(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.description.to_lowercase().contains(query_lower)
    }

    /// Reassembles a stored card without re-validating it
    #[cfg_attr(not(feature = "sqlite-storage"), allow(dead_code))]
    pub(crate) fn from_parts(id: CardId, draft: CardDraft, status: CardStatus) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            deadline_date: draft.deadline_date,
            status,
        }
    }

    pub(crate) fn set_status(&mut self, status: CardStatus) {
        self.status = status;
    }

    pub(crate) fn apply_draft(&mut self, draft: CardDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.deadline_date = draft.deadline_date;
    }
}
