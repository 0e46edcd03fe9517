pub mod board;
pub mod card;
pub mod list_item;
pub mod observer;
pub mod validation;

pub use board::{Board, BoardConfig, BoardSnapshot, Column, Placement};
pub use card::{Card, CardId, CardStatus};
pub use list_item::CardListItem;
pub use observer::{BoardChange, BoardObserver, SubscriptionId};
pub use validation::{CardDraft, DescriptionGuard, DEFAULT_DESCRIPTION_LIMIT};
