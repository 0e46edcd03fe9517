//! Single-writer access to a persisted board.
//!
//! Every mutation takes the board lock, applies the in-memory operation and
//! commits it through the storage backend before releasing the lock, so
//! readers never see a partition mid-mutation. The board layout write is the
//! commit point: if it fails the board is rolled back and observers hear
//! nothing; once it succeeds observers are notified.

use crate::{
    domain::{
        Board, BoardObserver, BoardSnapshot, Card, CardDraft, CardId, CardListItem, CardStatus,
        SubscriptionId,
    },
    error::{ProjectManagerError, Result},
    storage::Storage,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct BoardService<S: Storage> {
    board: Mutex<Board>,
    storage: S,
}

impl<S: Storage> BoardService<S> {
    pub fn new(board: Board, storage: S) -> Self {
        Self {
            board: Mutex::new(board),
            storage,
        }
    }

    /// Loads the persisted board, initializing storage on first use
    pub async fn open(storage: S) -> Result<Self> {
        if !storage.is_initialized().await {
            storage.initialize().await?;
        }

        let board = Board::restore(storage.load_board().await?)?;
        info!(cards = board.len(), "Board service opened");
        Ok(Self::new(board, storage))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn subscribe(&self, observer: impl BoardObserver + 'static) -> SubscriptionId {
        self.board.lock().await.subscribe(observer)
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.board.lock().await.unsubscribe(id)
    }

    /// Creates a ToDo card from user input
    pub async fn enroll(&self, draft: CardDraft) -> Result<CardId> {
        let mut board = self.board.lock().await;
        let card = Card::from_draft(draft, board.config().description_limit)?;
        let id = card.id();

        let before = board.columns().clone();
        let change = board.apply_append(card.clone());

        if let Err(e) = self.storage.save_card(&card).await {
            board.rollback(before);
            return Err(storage_failure(&id, e));
        }
        if let Err(e) = self.storage.save_board(&board.snapshot()).await {
            board.rollback(before);
            if let Err(cleanup) = self.storage.delete_card(&id).await {
                warn!(card_id = %id, error = %cleanup, "Failed to discard uncommitted card");
            }
            return Err(storage_failure(&id, e));
        }

        if let Some(change) = change {
            board.publish(&change);
        }
        Ok(id)
    }

    pub async fn move_card(&self, card_id: &CardId, destination: CardStatus) -> Result<()> {
        let mut board = self.board.lock().await;
        let before = board.columns().clone();
        let change = board.apply_move(card_id, destination)?;

        if let Err(e) = self.storage.save_board(&board.snapshot()).await {
            board.rollback(before);
            return Err(storage_failure(card_id, e));
        }

        // Layout is committed; the card file's status only lags until the next write
        if let Some(card) = board.find(card_id).cloned() {
            if let Err(e) = self.storage.save_card(&card).await {
                warn!(card_id = %card_id, error = %e, "Failed to refresh moved card");
            }
        }

        board.publish(&change);
        Ok(())
    }

    pub async fn remove_card(&self, card_id: &CardId) -> Result<Card> {
        let mut board = self.board.lock().await;
        let before = board.columns().clone();
        let (card, change) = board.apply_remove(card_id)?;

        if let Err(e) = self.storage.save_board(&board.snapshot()).await {
            board.rollback(before);
            return Err(storage_failure(card_id, e));
        }
        if let Err(e) = self.storage.delete_card(card_id).await {
            warn!(card_id = %card_id, error = %e, "Failed to delete removed card");
        }

        board.publish(&change);
        Ok(card)
    }

    pub async fn update_card(&self, card_id: &CardId, draft: CardDraft) -> Result<()> {
        let mut board = self.board.lock().await;
        let before = board.columns().clone();
        let change = board.apply_update(card_id, draft)?;

        let card = board
            .find(card_id)
            .cloned()
            .ok_or_else(|| ProjectManagerError::CardNotFound(card_id.to_string()))?;
        if let Err(e) = self.storage.save_card(&card).await {
            board.rollback(before);
            return Err(storage_failure(card_id, e));
        }

        board.publish(&change);
        Ok(())
    }

    pub async fn cards_in(&self, status: CardStatus) -> Vec<Card> {
        self.board.lock().await.cards_in(status).to_vec()
    }

    pub async fn list_items(&self, status: CardStatus, now: DateTime<Utc>) -> Vec<CardListItem> {
        self.board.lock().await.list_items(status, now)
    }

    pub async fn move_destinations(&self, card_id: &CardId) -> Result<Vec<CardStatus>> {
        self.board.lock().await.move_destinations(card_id)
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        self.board.lock().await.snapshot()
    }
}

fn storage_failure(card_id: &CardId, e: ProjectManagerError) -> ProjectManagerError {
    warn!(card_id = %card_id, error = %e, "Failed to persist board change, rolled back");
    match e {
        ProjectManagerError::StorageError(_) => e,
        other => ProjectManagerError::StorageError(other.to_string()),
    }
}

#[cfg(all(test, feature = "file-storage"))]
mod tests {
    use super::*;
    use crate::domain::BoardChange;
    use crate::storage::FileStorage;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use tempfile::TempDir;

    fn draft(title: &str) -> CardDraft {
        CardDraft::new(title, "description", Utc::now() + Duration::days(1))
    }

    /// File storage whose writes can be made to fail on demand
    struct UnreliableStorage {
        inner: FileStorage,
        fail_board: AtomicBool,
        fail_card: AtomicBool,
    }

    impl UnreliableStorage {
        fn new(root: &std::path::Path) -> Self {
            Self {
                inner: FileStorage::new(root),
                fail_board: AtomicBool::new(false),
                fail_card: AtomicBool::new(false),
            }
        }

        fn disk_full() -> ProjectManagerError {
            ProjectManagerError::StorageError("disk full".to_string())
        }
    }

    #[async_trait]
    impl Storage for UnreliableStorage {
        async fn initialize(&self) -> Result<()> {
            self.inner.initialize().await
        }

        async fn save_card(&self, card: &Card) -> Result<()> {
            if self.fail_card.load(Ordering::SeqCst) {
                return Err(Self::disk_full());
            }
            self.inner.save_card(card).await
        }

        async fn load_card(&self, id: &CardId) -> Result<Card> {
            self.inner.load_card(id).await
        }

        async fn list_card_ids(&self) -> Result<Vec<CardId>> {
            self.inner.list_card_ids().await
        }

        async fn delete_card(&self, id: &CardId) -> Result<()> {
            self.inner.delete_card(id).await
        }

        async fn save_board(&self, board: &BoardSnapshot) -> Result<()> {
            if self.fail_board.load(Ordering::SeqCst) {
                return Err(Self::disk_full());
            }
            self.inner.save_board(board).await
        }

        async fn load_board(&self) -> Result<BoardSnapshot> {
            self.inner.load_board().await
        }

        async fn is_initialized(&self) -> bool {
            self.inner.is_initialized().await
        }
    }

    async fn record_changes<S: Storage>(
        service: &BoardService<S>,
    ) -> Arc<StdMutex<Vec<BoardChange>>> {
        let changes = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        service
            .subscribe(move |change: &BoardChange| -> anyhow::Result<()> {
                sink.lock().unwrap().push(change.clone());
                Ok(())
            })
            .await;
        changes
    }

    #[tokio::test]
    async fn test_open_initializes_storage() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();

        assert!(service.storage().is_initialized().await);
        assert!(service.cards_in(CardStatus::Todo).await.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();

        let a = service.enroll(draft("A")).await.unwrap();
        let b = service.enroll(draft("B")).await.unwrap();
        let c = service.enroll(draft("C")).await.unwrap();
        service.move_card(&b, CardStatus::Doing).await.unwrap();
        service.remove_card(&c).await.unwrap();
        service
            .update_card(&a, CardDraft::new("A2", "edited", Utc::now()))
            .await
            .unwrap();
        drop(service);

        let reopened = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let todo = reopened.cards_in(CardStatus::Todo).await;
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].id(), a);
        assert_eq!(todo[0].title(), "A2");

        let doing = reopened.cards_in(CardStatus::Doing).await;
        assert_eq!(doing[0].id(), b);
        assert_eq!(reopened.storage().list_card_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_and_not_found_are_passed_through() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();

        assert!(matches!(
            service.enroll(CardDraft::new("", "x", Utc::now())).await,
            Err(ProjectManagerError::Validation(_))
        ));
        assert!(matches!(
            service.move_card(&CardId::generate(), CardStatus::Done).await,
            Err(ProjectManagerError::CardNotFound(_))
        ));
        assert!(matches!(
            service.remove_card(&CardId::generate()).await,
            Err(ProjectManagerError::CardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_observers_receive_changes() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let changes = record_changes(&service).await;

        let id = service.enroll(draft("A")).await.unwrap();
        service.move_card(&id, CardStatus::Done).await.unwrap();

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1],
            BoardChange::Moved {
                card_id: id,
                from: CardStatus::Todo,
                to: CardStatus::Done
            }
        );
        assert_eq!(
            service.move_destinations(&id).await.unwrap(),
            vec![CardStatus::Todo, CardStatus::Doing]
        );
    }

    #[tokio::test]
    async fn test_failed_enroll_leaves_board_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UnreliableStorage::new(temp_dir.path());
        storage.fail_board.store(true, Ordering::SeqCst);
        let service = BoardService::open(storage).await.unwrap();
        let changes = record_changes(&service).await;

        assert!(matches!(
            service.enroll(draft("A")).await,
            Err(ProjectManagerError::StorageError(_))
        ));
        assert!(service.enroll(draft("A")).await.is_err());

        assert!(service.cards_in(CardStatus::Todo).await.is_empty());
        assert!(changes.lock().unwrap().is_empty());
        assert!(service.storage().list_card_ids().await.unwrap().is_empty());

        service.storage().fail_board.store(false, Ordering::SeqCst);
        let id = service.enroll(draft("A")).await.unwrap();
        assert_eq!(service.cards_in(CardStatus::Todo).await[0].id(), id);
        assert_eq!(changes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(UnreliableStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let a = service.enroll(draft("A")).await.unwrap();
        let b = service.enroll(draft("B")).await.unwrap();
        let changes = record_changes(&service).await;

        service.storage().fail_board.store(true, Ordering::SeqCst);
        assert!(service.move_card(&a, CardStatus::Doing).await.is_err());

        let todo: Vec<CardId> = service
            .cards_in(CardStatus::Todo)
            .await
            .iter()
            .map(Card::id)
            .collect();
        assert_eq!(todo, vec![a, b]);
        assert!(service.cards_in(CardStatus::Doing).await.is_empty());
        assert!(changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remove_keeps_store_loadable() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(UnreliableStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let id = service.enroll(draft("A")).await.unwrap();

        service.storage().fail_board.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.remove_card(&id).await,
            Err(ProjectManagerError::StorageError(_))
        ));
        assert_eq!(service.cards_in(CardStatus::Todo).await.len(), 1);
        drop(service);

        let reopened = BoardService::open(FileStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let todo = reopened.cards_in(CardStatus::Todo).await;
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].id(), id);
    }

    #[tokio::test]
    async fn test_failed_update_restores_fields() {
        let temp_dir = TempDir::new().unwrap();
        let service = BoardService::open(UnreliableStorage::new(temp_dir.path()))
            .await
            .unwrap();
        let id = service.enroll(draft("A")).await.unwrap();

        service.storage().fail_card.store(true, Ordering::SeqCst);
        let result = service
            .update_card(&id, CardDraft::new("Renamed", "edited", Utc::now()))
            .await;

        assert!(matches!(result, Err(ProjectManagerError::StorageError(_))));
        assert_eq!(service.cards_in(CardStatus::Todo).await[0].title(), "A");
    }
}
