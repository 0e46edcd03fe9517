use crate::{
    domain::{BoardConfig, BoardSnapshot, Card, CardId, CardStatus},
    error::{ProjectManagerError, Result},
    storage::Storage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::fs;
use tracing::{debug, info, warn};

/// Board file contents: configuration plus the card order of each partition
#[derive(Debug, Serialize, Deserialize)]
struct BoardLayout {
    config: BoardConfig,
    columns: BTreeMap<CardStatus, Vec<CardId>>,
}

/// File-based storage implementation
pub struct FileStorage {
    root_path: PathBuf,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".project-manager";
    const CARDS_DIR: &'static str = "cards";
    const BOARD_FILE: &'static str = "board.json";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
        }
    }

    fn cards_dir(&self) -> PathBuf {
        self.root_path.join(Self::CARDS_DIR)
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    fn card_file(&self, id: &CardId) -> PathBuf {
        self.cards_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.cards_dir()).await?;

        if !self.board_file().exists() {
            let empty = crate::domain::Board::default().snapshot();
            self.save_board(&empty).await?;
        }

        info!(path = %self.root_path.display(), "File storage initialized");
        Ok(())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        self.ensure_directory_exists(&self.cards_dir()).await?;

        let json = serde_json::to_string_pretty(card)?;
        fs::write(self.card_file(&card.id()), json).await?;
        Ok(())
    }

    async fn load_card(&self, id: &CardId) -> Result<Card> {
        let file_path = self.card_file(id);

        if !file_path.exists() {
            return Err(ProjectManagerError::CardNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        let card: Card = serde_json::from_str(&contents)?;

        Ok(card)
    }

    async fn list_card_ids(&self) -> Result<Vec<CardId>> {
        let cards_dir = self.cards_dir();

        if !cards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&cards_dir).await?;
        let mut ids: Vec<CardId> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = CardId::from_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }

        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        let file_path = self.card_file(id);

        if !file_path.exists() {
            return Err(ProjectManagerError::CardNotFound(id.to_string()));
        }

        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn save_board(&self, board: &BoardSnapshot) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let layout = BoardLayout {
            config: board.config.clone(),
            columns: board
                .columns
                .iter()
                .map(|(status, cards)| (*status, cards.iter().map(Card::id).collect()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&layout)?;
        fs::write(self.board_file(), json).await?;

        debug!(path = %self.board_file().display(), "Board layout saved");
        Ok(())
    }

    /// Loads the layout and every card it lists.
    ///
    /// The layout decides which partition a card is in; a listed card whose
    /// file is missing is skipped.
    async fn load_board(&self) -> Result<BoardSnapshot> {
        let board_file = self.board_file();

        if !board_file.exists() {
            return Err(ProjectManagerError::BoardNotInitialized);
        }

        let contents = fs::read_to_string(&board_file).await?;
        let layout: BoardLayout = serde_json::from_str(&contents)?;

        let mut columns = BTreeMap::new();
        for (status, ids) in layout.columns {
            let mut cards = Vec::with_capacity(ids.len());
            for id in &ids {
                let mut card = match self.load_card(id).await {
                    Ok(card) => card,
                    Err(ProjectManagerError::CardNotFound(_)) => {
                        warn!(card_id = %id, "Card listed in board layout has no file, skipping");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if card.status() != status {
                    warn!(
                        card_id = %id,
                        stored = %card.status(),
                        layout = %status,
                        "Card file status is stale, using board layout"
                    );
                    card.set_status(status);
                }
                cards.push(card);
            }
            columns.insert(status, cards);
        }

        Ok(BoardSnapshot {
            config: layout.config,
            columns,
        })
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.board_file().exists()
    }
}
