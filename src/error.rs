use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProjectManagerError>;

#[derive(Debug, Error)]
pub enum ProjectManagerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Invalid card ID format: {0}")]
    InvalidCardId(String),

    #[error("Board not initialized")]
    BoardNotInitialized,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Rejections raised while creating or editing a card
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("description is {actual} characters, limit is {limit}")]
    DescriptionTooLong { limit: usize, actual: usize },
}

impl ProjectManagerError {
    /// True for conditions the caller can recover from by correcting input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::CardNotFound(_) | Self::InvalidCardId(_)
        )
    }
}
