//! # Project Manager Core
//!
//! Card model and board manager for the Project Manager task board.
//!
//! The board owns every card, partitioned into To-Do, Doing and Done
//! columns, and reports each mutation to subscribed observers. Rendering is
//! left entirely to the caller; persistence is an optional collaborator.

pub mod domain;
pub mod error;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use domain::{
    board::{Board, BoardConfig, Column, Placement},
    card::{Card, CardId, CardStatus},
    list_item::CardListItem,
    observer::{BoardChange, BoardObserver, SubscriptionId},
    validation::{CardDraft, DescriptionGuard},
};
pub use error::{ProjectManagerError, Result, ValidationError};
pub use service::BoardService;
pub use storage::Storage;
