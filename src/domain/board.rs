use crate::domain::card::{Card, CardId, CardStatus};
use crate::domain::list_item::CardListItem;
use crate::domain::observer::{BoardChange, BoardObserver, ObserverRegistry, SubscriptionId};
use crate::domain::validation::{CardDraft, DescriptionGuard, DEFAULT_DESCRIPTION_LIMIT};
use crate::error::{ProjectManagerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for a board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub status: CardStatus,
}

impl Column {
    pub fn new(name: impl Into<String>, status: CardStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Where newly appended cards land in their partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Bottom,
    Top,
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<Column>,
    pub description_limit: usize,
    pub new_card_placement: Placement,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Project Manager".to_string(),
            columns: CardStatus::ALL
                .iter()
                .map(|status| Column::new(status.to_string(), *status))
                .collect(),
            description_limit: DEFAULT_DESCRIPTION_LIMIT,
            new_card_placement: Placement::Bottom,
        }
    }
}

impl BoardConfig {
    /// Parses and validates a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Checks that every status has exactly one column
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProjectManagerError::ConfigError(
                "board name must not be empty".to_string(),
            ));
        }
        if self.description_limit == 0 {
            return Err(ProjectManagerError::ConfigError(
                "description_limit must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.status) {
                return Err(ProjectManagerError::ConfigError(format!(
                    "status {} has more than one column",
                    column.status
                )));
            }
        }
        if let Some(missing) = CardStatus::ALL.iter().find(|s| !seen.contains(s)) {
            return Err(ProjectManagerError::ConfigError(format!(
                "status {} has no column",
                missing
            )));
        }

        Ok(())
    }

    /// Input guard sized to this board's description limit
    pub fn description_guard(&self) -> DescriptionGuard {
        DescriptionGuard::new(self.description_limit)
    }
}

/// Serializable board contents, used by storage backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub config: BoardConfig,
    pub columns: BTreeMap<CardStatus, Vec<Card>>,
}

/// Owns every card, partitioned by status.
///
/// All mutations go through the board and are reported to subscribed
/// observers once they have been applied.
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    columns: BTreeMap<CardStatus, Vec<Card>>,
    observers: ObserverRegistry,
}

impl Board {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            columns: CardStatus::ALL.iter().map(|s| (*s, Vec::new())).collect(),
            observers: ObserverRegistry::default(),
        }
    }

    /// Rebuilds a board from persisted contents.
    ///
    /// Every card must sit in the partition matching its status, appear once
    /// and pass the same field checks as a newly created card.
    pub fn restore(snapshot: BoardSnapshot) -> Result<Self> {
        snapshot.config.validate()?;

        let mut board = Self::new(snapshot.config);
        let limit = board.config.description_limit;
        let mut seen = HashSet::new();
        for (status, cards) in snapshot.columns {
            for card in cards {
                if card.status() != status {
                    return Err(ProjectManagerError::StorageError(format!(
                        "card {} has status {} but is stored under {}",
                        card.id(),
                        card.status(),
                        status
                    )));
                }
                if !seen.insert(card.id()) {
                    return Err(ProjectManagerError::StorageError(format!(
                        "card {} is stored more than once",
                        card.id()
                    )));
                }
                card.validate(limit).map_err(|e| {
                    ProjectManagerError::StorageError(format!(
                        "card {} is invalid: {}",
                        card.id(),
                        e
                    ))
                })?;
                board.partition_mut(status).push(card);
            }
        }

        debug!(cards = board.len(), "Board restored");
        Ok(board)
    }

    /// Copies the current contents for persistence
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            config: self.config.clone(),
            columns: self.columns.clone(),
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Gets the column configuration for a status
    pub fn get_column_for_status(&self, status: &CardStatus) -> Option<&Column> {
        self.config.columns.iter().find(|col| &col.status == status)
    }

    /// Registers an observer for change notifications
    pub fn subscribe(&mut self, observer: impl BoardObserver + 'static) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    /// Removes an observer; returns false if it was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Validates a draft against this board's limit and appends the new card
    pub fn create_card(&mut self, draft: CardDraft) -> Result<CardId> {
        let card = Card::from_draft(draft, self.config.description_limit)?;
        let id = card.id();
        self.append(card);
        Ok(id)
    }

    /// Inserts `card` into the partition matching its status.
    ///
    /// A card whose id is already on the board is ignored.
    pub fn append(&mut self, card: Card) {
        if let Some(change) = self.apply_append(card) {
            self.publish(&change);
        }
    }

    /// Moves a card to the end of `destination`
    pub fn move_card(&mut self, card_id: &CardId, destination: CardStatus) -> Result<()> {
        let change = self.apply_move(card_id, destination)?;
        self.publish(&change);
        Ok(())
    }

    /// Deletes a card permanently and returns it
    pub fn remove_card(&mut self, card_id: &CardId) -> Result<Card> {
        let (card, change) = self.apply_remove(card_id)?;
        self.publish(&change);
        Ok(card)
    }

    /// Replaces a card's title, description and deadline in place
    pub fn update_card(&mut self, card_id: &CardId, draft: CardDraft) -> Result<()> {
        let change = self.apply_update(card_id, draft)?;
        self.publish(&change);
        Ok(())
    }

    pub(crate) fn apply_append(&mut self, card: Card) -> Option<BoardChange> {
        let card_id = card.id();
        if self.locate(&card_id).is_some() {
            warn!(card_id = %card_id, "Card already on board, ignoring append");
            return None;
        }

        let status = card.status();
        let placement = self.config.new_card_placement;
        let partition = self.partition_mut(status);
        match placement {
            Placement::Bottom => partition.push(card),
            Placement::Top => partition.insert(0, card),
        }

        debug!(card_id = %card_id, status = %status, "Card appended");
        Some(BoardChange::Appended { card_id, status })
    }

    pub(crate) fn apply_move(
        &mut self,
        card_id: &CardId,
        destination: CardStatus,
    ) -> Result<BoardChange> {
        let (from, index) = self.require(card_id)?;

        let mut card = self.partition_mut(from).remove(index);
        card.set_status(destination);
        self.partition_mut(destination).push(card);

        debug!(card_id = %card_id, from = %from, to = %destination, "Card moved");
        Ok(BoardChange::Moved {
            card_id: *card_id,
            from,
            to: destination,
        })
    }

    pub(crate) fn apply_remove(&mut self, card_id: &CardId) -> Result<(Card, BoardChange)> {
        let (status, index) = self.require(card_id)?;
        let card = self.partition_mut(status).remove(index);

        debug!(card_id = %card_id, status = %status, "Card removed");
        Ok((
            card,
            BoardChange::Removed {
                card_id: *card_id,
                status,
            },
        ))
    }

    pub(crate) fn apply_update(&mut self, card_id: &CardId, draft: CardDraft) -> Result<BoardChange> {
        let (status, index) = self.require(card_id)?;
        draft.validate(self.config.description_limit)?;

        self.partition_mut(status)[index].apply_draft(draft);

        debug!(card_id = %card_id, status = %status, "Card updated");
        Ok(BoardChange::Updated {
            card_id: *card_id,
            status,
        })
    }

    /// Delivers a change that has already been applied
    pub(crate) fn publish(&mut self, change: &BoardChange) {
        self.observers.notify(change);
    }

    /// Puts back partition contents captured before a failed mutation
    pub(crate) fn rollback(&mut self, columns: BTreeMap<CardStatus, Vec<Card>>) {
        self.columns = columns;
    }

    pub(crate) fn columns(&self) -> &BTreeMap<CardStatus, Vec<Card>> {
        &self.columns
    }

    /// Cards in a partition, in display order
    pub fn cards_in(&self, status: CardStatus) -> &[Card] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Row data for a partition, with expiry evaluated at `now`
    pub fn list_items(&self, status: CardStatus, now: DateTime<Utc>) -> Vec<CardListItem> {
        self.cards_in(status)
            .iter()
            .map(|card| CardListItem::from_card(card, now))
            .collect()
    }

    /// Partitions a card can be moved to, in column order
    pub fn move_destinations(&self, card_id: &CardId) -> Result<Vec<CardStatus>> {
        let (current, _) = self.require(card_id)?;
        Ok(self
            .config
            .columns
            .iter()
            .map(|col| col.status)
            .filter(|status| *status != current)
            .collect())
    }

    pub fn find(&self, card_id: &CardId) -> Option<&Card> {
        self.locate(card_id)
            .map(|(status, index)| &self.cards_in(status)[index])
    }

    /// Case-insensitive search over title and description, in column order
    pub fn search(&self, query: &str) -> Vec<&Card> {
        let query_lower = query.to_lowercase();
        self.config
            .columns
            .iter()
            .flat_map(|col| self.cards_in(col.status))
            .filter(|card| card.matches(&query_lower))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locate(&self, card_id: &CardId) -> Option<(CardStatus, usize)> {
        self.columns.iter().find_map(|(status, cards)| {
            cards
                .iter()
                .position(|card| &card.id() == card_id)
                .map(|index| (*status, index))
        })
    }

    fn require(&self, card_id: &CardId) -> Result<(CardStatus, usize)> {
        self.locate(card_id)
            .ok_or_else(|| ProjectManagerError::CardNotFound(card_id.to_string()))
    }

    fn partition_mut(&mut self, status: CardStatus) -> &mut Vec<Card> {
        self.columns.entry(status).or_default()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}
