use crate::{
    domain::{BoardConfig, BoardSnapshot, Card, CardDraft, CardId, CardStatus},
    error::{ProjectManagerError, Result},
    storage::Storage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::{collections::BTreeMap, path::Path, str::FromStr, sync::Mutex};
use tracing::{debug, info};

const CONFIG_KEY: &str = "board_config";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    deadline_date TEXT NOT NULL,
    status TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cards_status_position ON cards (status, position);
";

fn storage_err(err: rusqlite::Error) -> ProjectManagerError {
    ProjectManagerError::StorageError(err.to_string())
}

fn status_key(status: CardStatus) -> String {
    status.to_string().to_lowercase()
}

struct CardRow {
    id: String,
    title: String,
    description: String,
    deadline_date: String,
    status: String,
}

impl CardRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            deadline_date: row.get(3)?,
            status: row.get(4)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        let id = CardId::from_str(&self.id)?;
        let status = CardStatus::from_str(&self.status)
            .map_err(|_| ProjectManagerError::StorageError(format!("bad status '{}'", self.status)))?;
        let deadline_date = DateTime::parse_from_rfc3339(&self.deadline_date)
            .map_err(|e| ProjectManagerError::StorageError(format!("bad deadline: {}", e)))?
            .with_timezone(&Utc);

        Ok(Card::from_parts(
            id,
            CardDraft::new(self.title, self.description, deadline_date),
            status,
        ))
    }
}

/// SQLite-based storage backend for cards and board state
pub struct SqliteStorage {
    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        let connection = Connection::open(database_path.as_ref()).map_err(storage_err)?;
        info!(path = %database_path.as_ref().display(), "SQLite storage opened");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(storage_err)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .connection
            .lock()
            .map_err(|_| ProjectManagerError::StorageError("connection lock poisoned".to_string()))?;
        f(&mut conn)
    }

    fn load_config(conn: &Connection) -> Result<Option<BoardConfig>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![CONFIG_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(SCHEMA).map_err(storage_err)?;
            if Self::load_config(conn)?.is_none() {
                let json = serde_json::to_string(&BoardConfig::default())?;
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params![CONFIG_KEY, json],
                )
                .map_err(storage_err)?;
            }
            Ok(())
        })?;

        info!("SQLite storage initialized");
        Ok(())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        self.with_connection(|conn| {
            let status = status_key(card.status());
            conn.execute(
                "INSERT INTO cards (id, title, description, deadline_date, status, position)
                 VALUES (?1, ?2, ?3, ?4, ?5,
                         (SELECT COALESCE(MAX(position) + 1, 0) FROM cards WHERE status = ?5))
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     deadline_date = excluded.deadline_date,
                     status = excluded.status",
                params![
                    card.id().to_string(),
                    card.title(),
                    card.description(),
                    card.deadline_date().to_rfc3339(),
                    status,
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    async fn load_card(&self, id: &CardId) -> Result<Card> {
        let row = self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, title, description, deadline_date, status FROM cards WHERE id = ?1",
                params![id.to_string()],
                CardRow::from_row,
            )
            .optional()
            .map_err(storage_err)
        })?;

        row.ok_or_else(|| ProjectManagerError::CardNotFound(id.to_string()))?
            .into_card()
    }

    async fn list_card_ids(&self) -> Result<Vec<CardId>> {
        let raw: Vec<String> = self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id FROM cards ORDER BY id")
                .map_err(storage_err)?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(storage_err)?;
            Ok(ids)
        })?;

        raw.iter().map(|s| CardId::from_str(s)).collect()
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        let deleted = self.with_connection(|conn| {
            conn.execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])
                .map_err(storage_err)
        })?;

        if deleted == 0 {
            return Err(ProjectManagerError::CardNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn save_board(&self, board: &BoardSnapshot) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            let config = serde_json::to_string(&board.config)?;
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![CONFIG_KEY, config],
            )
            .map_err(storage_err)?;
            tx.execute("DELETE FROM cards", []).map_err(storage_err)?;

            for (status, cards) in &board.columns {
                let status = status_key(*status);
                for (position, card) in cards.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO cards (id, title, description, deadline_date, status, position)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            card.id().to_string(),
                            card.title(),
                            card.description(),
                            card.deadline_date().to_rfc3339(),
                            status,
                            position as i64,
                        ],
                    )
                    .map_err(storage_err)?;
                }
            }

            tx.commit().map_err(storage_err)?;
            Ok(())
        })?;

        debug!("Board saved to SQLite");
        Ok(())
    }

    /// The board write already replaces every row in one transaction
    async fn save_all(&self, board: &BoardSnapshot) -> Result<()> {
        self.save_board(board).await
    }

    async fn load_board(&self) -> Result<BoardSnapshot> {
        let (config, rows) = self.with_connection(|conn| {
            let config = Self::load_config(conn)?.ok_or(ProjectManagerError::BoardNotInitialized)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, description, deadline_date, status
                     FROM cards ORDER BY status, position",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([], CardRow::from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<CardRow>>>()
                .map_err(storage_err)?;
            Ok((config, rows))
        })?;

        let mut columns: BTreeMap<CardStatus, Vec<Card>> = BTreeMap::new();
        for row in rows {
            let card = row.into_card()?;
            columns.entry(card.status()).or_default().push(card);
        }

        Ok(BoardSnapshot { config, columns })
    }

    async fn is_initialized(&self) -> bool {
        self.with_connection(|conn| Self::load_config(conn))
            .map(|config| config.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Board;
    use tempfile::TempDir;

    fn card(title: &str) -> Card {
        Card::create(title, "description", Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_initialization() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();
        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        let snapshot = storage.load_board().await.unwrap();
        assert_eq!(snapshot.config, BoardConfig::default());
        assert!(snapshot.columns.is_empty());
    }

    #[tokio::test]
    async fn test_card_save_load_delete() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize().await.unwrap();

        let card = card("Buy milk");
        storage.save_card(&card).await.unwrap();
        storage.save_card(&card).await.unwrap();

        let loaded = storage.load_card(&card.id()).await.unwrap();
        assert_eq!(loaded.title(), "Buy milk");
        assert_eq!(loaded.deadline_date(), card.deadline_date());
        assert_eq!(storage.list_card_ids().await.unwrap(), vec![card.id()]);

        storage.delete_card(&card.id()).await.unwrap();
        assert!(matches!(
            storage.load_card(&card.id()).await,
            Err(ProjectManagerError::CardNotFound(_))
        ));
        assert!(storage.delete_card(&card.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_board_round_trip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("board.db");

        let mut board = Board::default();
        let (a, b, c) = (card("A"), card("B"), card("C"));
        let (a_id, b_id, c_id) = (a.id(), b.id(), c.id());
        board.append(a);
        board.append(b);
        board.append(c);
        board.move_card(&a_id, CardStatus::Done).unwrap();

        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.initialize().await.unwrap();
            storage.save_board(&board.snapshot()).await.unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        let restored = Board::restore(storage.load_board().await.unwrap()).unwrap();
        let todo: Vec<CardId> = restored.cards_in(CardStatus::Todo).iter().map(Card::id).collect();
        assert_eq!(todo, vec![b_id, c_id]);
        assert_eq!(restored.cards_in(CardStatus::Done)[0].id(), a_id);
    }
}
