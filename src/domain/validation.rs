//! Field rules shared by card creation and editing.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum description length, in characters, accepted by the enrollment form
pub const DEFAULT_DESCRIPTION_LIMIT: usize = 1000;

/// User-supplied fields for a card, before an id or status is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: String,
    pub description: String,
    pub deadline_date: DateTime<Utc>,
}

impl CardDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        deadline_date: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            deadline_date,
        }
    }

    /// Checks required fields and the description length.
    ///
    /// Over-long descriptions are rejected, never truncated.
    pub fn validate(&self, description_limit: usize) -> Result<(), ValidationError> {
        check_fields(&self.title, &self.description, description_limit)
    }
}

pub(crate) fn check_fields(
    title: &str,
    description: &str,
    description_limit: usize,
) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if description.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }

    let actual = description.chars().count();
    if actual > description_limit {
        return Err(ValidationError::DescriptionTooLong {
            limit: description_limit,
            actual,
        });
    }

    Ok(())
}

/// Live input guard for the description field.
///
/// The editing surface asks the guard before applying each change, so the
/// field stops growing once the limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptionGuard {
    limit: usize,
}

impl DescriptionGuard {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Checks whether `replacement` may replace `replaced_chars` characters of `current`.
    ///
    /// Changes that do not grow the text are always allowed. A blocked change
    /// reports the length it would have produced so the caller can tell the
    /// user why input stopped.
    pub fn check_change(
        &self,
        current: &str,
        replaced_chars: usize,
        replacement: &str,
    ) -> Result<(), ValidationError> {
        let current_len = current.chars().count();
        let added = replacement.chars().count();
        if added <= replaced_chars {
            return Ok(());
        }

        let resulting = current_len.saturating_sub(replaced_chars) + added;
        if resulting > self.limit {
            return Err(ValidationError::DescriptionTooLong {
                limit: self.limit,
                actual: resulting,
            });
        }
        Ok(())
    }

    pub fn should_change_text(
        &self,
        current: &str,
        replaced_chars: usize,
        replacement: &str,
    ) -> bool {
        self.check_change(current, replaced_chars, replacement).is_ok()
    }

    /// Characters still available before the limit
    pub fn remaining(&self, current: &str) -> usize {
        self.limit.saturating_sub(current.chars().count())
    }
}

impl Default for DescriptionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTION_LIMIT)
    }
}
