//! Board store seam.
//!
//! The store is the durable home of cards and their lock sub-records. It is
//! a passive table: all coordination decisions live in [`crate::lock`] and
//! [`crate::reorder`]; the store only has to make two things atomic — the
//! lock compare-and-set and the order-index batch write. Everything the
//! lock manager does reduces to one `compare_and_set_lock` per transition,
//! which is what keeps two racing acquires from both succeeding.
//!
//! [`MemoryStore`] is the in-process reference implementation, used by the
//! test suite and by embedders that keep board state in memory. A real
//! deployment implements [`BoardStore`] over its database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::card::{Card, CardId, ColumnId, OrderedPair};
use crate::error::{PlankError, Result};
use crate::lock::{HeldLockInfo, LockKind, LockState};

/// Persistence interface the coordination core runs against.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Fetch one card. `NotFound` if it does not exist.
    async fn card(&self, id: CardId) -> Result<Card>;

    /// Current state of one lock sub-record. `NotFound` if the card does
    /// not exist; a card with no recorded lock entry is `Free`.
    async fn lock_state(&self, id: CardId, kind: LockKind) -> Result<LockState>;

    /// Atomically replace the lock sub-record, but only if it still equals
    /// `expected`. Returns false when another writer got there first; the
    /// caller re-reads and retries. This is the serialization point for
    /// every lock transition.
    async fn compare_and_set_lock(
        &self,
        id: CardId,
        kind: LockKind,
        expected: &LockState,
        next: LockState,
    ) -> Result<bool>;

    /// All currently-held locks of one kind, for the expiry sweep and for
    /// lock-holder introspection.
    async fn held_locks(&self, kind: LockKind) -> Result<Vec<HeldLockInfo>>;

    /// Ids of every card in `column`, ordered by `order_index` ascending.
    async fn column_members(&self, column: &ColumnId) -> Result<Vec<CardId>>;

    /// Write a batch of order indexes as one atomic unit. Either every pair
    /// is applied or none is; `NotFound` if any id is absent.
    async fn apply_order_batch(&self, batch: &[OrderedPair]) -> Result<()>;
}

#[derive(Default)]
struct MemoryInner {
    cards: HashMap<CardId, Card>,
    locks: HashMap<(CardId, LockKind), LockState>,
    next_id: i64,
}

/// Mutex-guarded in-memory board store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| PlankError::Internal("board store mutex poisoned".to_string()))
    }

    /// Insert a card with a fresh server-assigned id, appended at the end
    /// of its column.
    pub fn insert_card(
        &self,
        column: ColumnId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Card> {
        let mut inner = self.locked()?;

        inner.next_id += 1;
        let id = CardId(inner.next_id);
        let order_index = 1 + inner
            .cards
            .values()
            .filter(|c| c.column == column)
            .map(|c| c.order_index)
            .max()
            .unwrap_or(0);

        let card = Card {
            id,
            column,
            title: title.into(),
            description: description.into(),
            order_index,
            created: Some(chrono::Utc::now()),
        };
        inner.cards.insert(id, card.clone());
        Ok(card)
    }

    /// Overwrite title and description of an existing card.
    pub fn update_content(&self, id: CardId, title: &str, description: &str) -> Result<Card> {
        let mut inner = self.locked()?;
        let card = inner.cards.get_mut(&id).ok_or(PlankError::NotFound(id))?;
        card.title = title.to_string();
        card.description = description.to_string();
        Ok(card.clone())
    }

    /// Move a card to a column at a raw position. No renumbering of either
    /// column happens here; that is the reorder coordinator's job.
    pub fn move_card(&self, id: CardId, column: ColumnId, order_index: i64) -> Result<Card> {
        let mut inner = self.locked()?;
        let card = inner.cards.get_mut(&id).ok_or(PlankError::NotFound(id))?;
        card.column = column;
        card.order_index = order_index;
        Ok(card.clone())
    }

    /// Delete a card and both of its lock sub-records.
    pub fn remove_card(&self, id: CardId) -> Result<()> {
        let mut inner = self.locked()?;
        inner.cards.remove(&id).ok_or(PlankError::NotFound(id))?;
        for kind in LockKind::ALL {
            inner.locks.remove(&(id, kind));
        }
        Ok(())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn card(&self, id: CardId) -> Result<Card> {
        let inner = self.locked()?;
        inner.cards.get(&id).cloned().ok_or(PlankError::NotFound(id))
    }

    async fn lock_state(&self, id: CardId, kind: LockKind) -> Result<LockState> {
        let inner = self.locked()?;
        if !inner.cards.contains_key(&id) {
            return Err(PlankError::NotFound(id));
        }
        Ok(inner
            .locks
            .get(&(id, kind))
            .cloned()
            .unwrap_or(LockState::Free))
    }

    async fn compare_and_set_lock(
        &self,
        id: CardId,
        kind: LockKind,
        expected: &LockState,
        next: LockState,
    ) -> Result<bool> {
        let mut inner = self.locked()?;
        if !inner.cards.contains_key(&id) {
            return Err(PlankError::NotFound(id));
        }

        let current = inner
            .locks
            .get(&(id, kind))
            .cloned()
            .unwrap_or(LockState::Free);
        if current != *expected {
            return Ok(false);
        }

        if next.is_free() {
            inner.locks.remove(&(id, kind));
        } else {
            inner.locks.insert((id, kind), next);
        }
        Ok(true)
    }

    async fn held_locks(&self, kind: LockKind) -> Result<Vec<HeldLockInfo>> {
        let inner = self.locked()?;
        let mut held: Vec<HeldLockInfo> = inner
            .locks
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .filter_map(|((id, _), state)| match state {
                LockState::Free => None,
                LockState::Held { holder, since } => Some(HeldLockInfo {
                    card: *id,
                    holder: holder.clone(),
                    since: *since,
                }),
            })
            .collect();
        held.sort_by_key(|info| info.card);
        Ok(held)
    }

    async fn column_members(&self, column: &ColumnId) -> Result<Vec<CardId>> {
        let inner = self.locked()?;
        let mut members: Vec<(i64, CardId)> = inner
            .cards
            .values()
            .filter(|c| c.column == *column)
            .map(|c| (c.order_index, c.id))
            .collect();
        members.sort();
        Ok(members.into_iter().map(|(_, id)| id).collect())
    }

    async fn apply_order_batch(&self, batch: &[OrderedPair]) -> Result<()> {
        let mut inner = self.locked()?;

        // Validate the whole batch before touching anything, so a bad id
        // cannot leave a half-written ordering behind.
        for pair in batch {
            if !inner.cards.contains_key(&pair.id) {
                return Err(PlankError::NotFound(pair.id));
            }
        }

        for pair in batch {
            if let Some(card) = inner.cards.get_mut(&pair.id) {
                card.order_index = pair.order_index;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::UserId;

    fn store_with_card() -> (MemoryStore, CardId) {
        let store = MemoryStore::new();
        let card = store
            .insert_card(ColumnId::new("todo"), "first", "")
            .unwrap();
        (store, card.id)
    }

    #[tokio::test]
    async fn lock_state_defaults_to_free() {
        let (store, id) = store_with_card();
        let state = store.lock_state(id, LockKind::Position).await.unwrap();
        assert_eq!(state, LockState::Free);
    }

    #[tokio::test]
    async fn lock_state_of_missing_card_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .lock_state(CardId(99), LockKind::Content)
            .await
            .unwrap_err();
        assert!(matches!(err, PlankError::NotFound(CardId(99))));
    }

    #[tokio::test]
    async fn cas_applies_only_on_expected_state() {
        let (store, id) = store_with_card();
        let held = LockState::held_by(UserId::new("ada"));

        let ok = store
            .compare_and_set_lock(id, LockKind::Position, &LockState::Free, held.clone())
            .await
            .unwrap();
        assert!(ok);

        // A second writer that still believes the lock is free loses.
        let stale = store
            .compare_and_set_lock(
                id,
                LockKind::Position,
                &LockState::Free,
                LockState::held_by(UserId::new("bob")),
            )
            .await
            .unwrap();
        assert!(!stale);

        let state = store.lock_state(id, LockKind::Position).await.unwrap();
        assert_eq!(state.holder(), Some(&UserId::new("ada")));
    }

    #[tokio::test]
    async fn lock_kinds_are_independent() {
        let (store, id) = store_with_card();
        let held = LockState::held_by(UserId::new("ada"));

        store
            .compare_and_set_lock(id, LockKind::Position, &LockState::Free, held)
            .await
            .unwrap();

        let content = store.lock_state(id, LockKind::Content).await.unwrap();
        assert_eq!(content, LockState::Free);
    }

    #[tokio::test]
    async fn held_locks_lists_only_requested_kind() {
        let (store, id) = store_with_card();
        store
            .compare_and_set_lock(
                id,
                LockKind::Content,
                &LockState::Free,
                LockState::held_by(UserId::new("ada")),
            )
            .await
            .unwrap();

        assert!(store.held_locks(LockKind::Position).await.unwrap().is_empty());

        let held = store.held_locks(LockKind::Content).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].card, id);
        assert_eq!(held[0].holder, UserId::new("ada"));
    }

    #[tokio::test]
    async fn column_members_come_back_in_order() {
        let store = MemoryStore::new();
        let col = ColumnId::new("todo");
        let a = store.insert_card(col.clone(), "a", "").unwrap();
        let b = store.insert_card(col.clone(), "b", "").unwrap();
        let c = store.insert_card(col.clone(), "c", "").unwrap();
        store.insert_card(ColumnId::new("done"), "other", "").unwrap();

        let members = store.column_members(&col).await.unwrap();
        assert_eq!(members, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn order_batch_rejects_unknown_ids_without_writing() {
        let store = MemoryStore::new();
        let col = ColumnId::new("todo");
        let a = store.insert_card(col.clone(), "a", "").unwrap();

        let err = store
            .apply_order_batch(&[
                OrderedPair {
                    id: a.id,
                    order_index: 5,
                },
                OrderedPair {
                    id: CardId(404),
                    order_index: 6,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, PlankError::NotFound(CardId(404))));

        // The valid half of the batch must not have been applied.
        let card = store.card(a.id).await.unwrap();
        assert_eq!(card.order_index, 1);
    }

    #[tokio::test]
    async fn remove_card_clears_lock_entries() {
        let (store, id) = store_with_card();
        store
            .compare_and_set_lock(
                id,
                LockKind::Position,
                &LockState::Free,
                LockState::held_by(UserId::new("ada")),
            )
            .await
            .unwrap();

        store.remove_card(id).unwrap();
        assert!(store.held_locks(LockKind::Position).await.unwrap().is_empty());
    }
}
