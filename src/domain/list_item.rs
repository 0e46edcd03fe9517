use crate::domain::card::{Card, CardId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Format used for the deadline label on each row
pub const DATE_LABEL_FORMAT: &str = "%Y-%m-%d";

/// Row data handed to the presentation layer.
///
/// `is_expired` is data only; the view decides how to highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardListItem {
    pub id: CardId,
    pub title: String,
    pub description: String,
    pub date_label: String,
    pub is_expired: bool,
}

impl CardListItem {
    pub fn from_card(card: &Card, now: DateTime<Utc>) -> Self {
        Self {
            id: card.id(),
            title: card.title().to_string(),
            description: card.description().to_string(),
            date_label: card.deadline_date().format(DATE_LABEL_FORMAT).to_string(),
            is_expired: card.is_expired(now),
        }
    }
}
