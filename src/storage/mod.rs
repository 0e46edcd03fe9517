use crate::{
    domain::{BoardSnapshot, Card, CardId},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Storage trait for persisting cards and board layout
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Saves a single card, leaving partition order untouched
    async fn save_card(&self, card: &Card) -> Result<()>;

    /// Loads a card by ID
    async fn load_card(&self, id: &CardId) -> Result<Card>;

    /// Lists all stored card IDs
    async fn list_card_ids(&self) -> Result<Vec<CardId>>;

    /// Deletes a card
    async fn delete_card(&self, id: &CardId) -> Result<()>;

    /// Saves the configuration and the card order of each partition.
    ///
    /// Cards listed in `board` must already have been written with `save_card`.
    /// This write is the commit point for every board mutation.
    async fn save_board(&self, board: &BoardSnapshot) -> Result<()>;

    /// Writes every card, then the board layout
    async fn save_all(&self, board: &BoardSnapshot) -> Result<()> {
        for cards in board.columns.values() {
            for card in cards {
                self.save_card(card).await?;
            }
        }
        self.save_board(board).await
    }

    /// Loads the full board contents
    async fn load_board(&self) -> Result<BoardSnapshot>;

    /// Checks if the board has been initialized
    async fn is_initialized(&self) -> bool;
}
