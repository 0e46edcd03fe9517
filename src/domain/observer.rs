//! Change notification for board observers.
//!
//! Observers are called synchronously after each successful mutation. An
//! observer that returns an error or panics is logged and skipped; the
//! remaining observers still run and the board is left as mutated.

use crate::domain::card::{CardId, CardStatus};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Describes a completed board mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardChange {
    Appended { card_id: CardId, status: CardStatus },
    Moved { card_id: CardId, from: CardStatus, to: CardStatus },
    Removed { card_id: CardId, status: CardStatus },
    Updated { card_id: CardId, status: CardStatus },
}

impl BoardChange {
    pub fn card_id(&self) -> CardId {
        match self {
            Self::Appended { card_id, .. }
            | Self::Moved { card_id, .. }
            | Self::Removed { card_id, .. }
            | Self::Updated { card_id, .. } => *card_id,
        }
    }

    /// Partitions whose contents changed and need re-rendering
    pub fn affected_statuses(&self) -> Vec<CardStatus> {
        match self {
            Self::Moved { from, to, .. } if from == to => vec![*from],
            Self::Moved { from, to, .. } => vec![*from, *to],
            Self::Appended { status, .. }
            | Self::Removed { status, .. }
            | Self::Updated { status, .. } => vec![*status],
        }
    }
}

/// Receives board change notifications.
///
/// Implemented for any `FnMut(&BoardChange) -> anyhow::Result<()>`.
pub trait BoardObserver: Send {
    fn on_board_changed(&mut self, change: &BoardChange) -> anyhow::Result<()>;
}

impl<F> BoardObserver for F
where
    F: FnMut(&BoardChange) -> anyhow::Result<()> + Send,
{
    fn on_board_changed(&mut self, change: &BoardChange) -> anyhow::Result<()> {
        self(change)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Vec<(SubscriptionId, Box<dyn BoardObserver>)>,
    next_id: u64,
}

impl ObserverRegistry {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn BoardObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    /// Delivers `change` to every observer in subscription order
    pub(crate) fn notify(&mut self, change: &BoardChange) {
        for (id, observer) in self.observers.iter_mut() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| observer.on_board_changed(change)));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        subscription = id.0,
                        card_id = %change.card_id(),
                        error = %e,
                        "Board observer failed"
                    );
                }
                Err(_) => {
                    warn!(
                        subscription = id.0,
                        card_id = %change.card_id(),
                        "Board observer panicked"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
