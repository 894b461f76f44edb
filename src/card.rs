//! Core board records: cards, columns, and holder identities.
//!
//! A card is the lockable entity of the board. Its `order_index` is dense
//! and unique within its column; renumbering is the job of
//! [`crate::reorder`]. The two lock sub-records attached to each card live
//! in the board store, keyed by [`crate::lock::LockKind`], not on the card
//! itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identity of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a column, the grouping within which card order is dense.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a lock holder (a user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the default identity for the local client (`user@host`).
    pub fn local() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self(format!("{}@{}", user, host))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A card record as the board store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Stable identity.
    pub id: CardId,

    /// The column this card currently lives in.
    pub column: ColumnId,

    /// Card title.
    pub title: String,

    /// Card description (markdown, opaque to this core).
    #[serde(default)]
    pub description: String,

    /// 1-based position within `column`; dense and unique per column.
    pub order_index: i64,

    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Payload for creating a card. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    /// Target column.
    pub column: ColumnId,

    /// Card title.
    pub title: String,

    /// Card description.
    #[serde(default)]
    pub description: String,
}

/// Editable content of a card, the unit protected by the content lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One `{id, order_index}` pair, the minimal reorder notification unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedPair {
    pub id: CardId,
    pub order_index: i64,
}
