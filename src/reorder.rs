//! Dense renumbering of a column under the position lock.
//!
//! `order_index` is unique within a column, so a naive single-pass rewrite
//! in arbitrary iteration order can transiently collide with index values
//! that have not been overwritten yet. The coordinator therefore writes in
//! two phases, each one atomic batch: first every card is parked on a
//! temporary index in a disjoint high range, then every card gets its final
//! dense 1-based index. The position lock is released and the notification
//! published only after both batches commit.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{BoardEvent, EventBus};
use crate::card::{CardId, OrderedPair, UserId};
use crate::error::{PlankError, Result};
use crate::lock::{LockKind, LockManager};
use crate::store::BoardStore;

/// Base of the temporary index range used by the spread phase. Far above
/// any realistic column size, so spread indexes can never collide with
/// live ones.
const SPREAD_OFFSET: i64 = 1_000_000;

/// Renumbers a column to the caller-declared complete ordering.
pub struct ReorderCoordinator {
    store: Arc<dyn BoardStore>,
    bus: Arc<dyn EventBus>,
    manager: Arc<LockManager>,
}

impl ReorderCoordinator {
    pub fn new(
        store: Arc<dyn BoardStore>,
        bus: Arc<dyn EventBus>,
        manager: Arc<LockManager>,
    ) -> Self {
        Self {
            store,
            bus,
            manager,
        }
    }

    /// Renumber the column of `dragged` to exactly `ordered`.
    ///
    /// Preconditions, checked before any write: `holder` holds the position
    /// lock on `dragged`, and `ordered` is a permutation of the column's
    /// actual membership. A missing, duplicate, or foreign id fails closed
    /// with `Validation` — the coordinator never reindexes a partial set.
    ///
    /// On success the position lock is released (cooperative release event)
    /// and one `card_reordered` event carries the new `{id, order_index}`
    /// pairs.
    pub async fn reorder(
        &self,
        dragged: CardId,
        holder: &UserId,
        ordered: &[CardId],
    ) -> Result<Vec<OrderedPair>> {
        match self.manager.holder_of(dragged, LockKind::Position).await? {
            Some(h) if h == *holder => {}
            Some(h) => {
                return Err(PlankError::Validation(format!(
                    "position lock on card {dragged} is held by {h}, not {holder}"
                )));
            }
            None => {
                return Err(PlankError::Validation(format!(
                    "position lock on card {dragged} is not held"
                )));
            }
        }

        let column = self.store.card(dragged).await?.column;
        let members = self.store.column_members(&column).await?;
        validate_permutation(&column.0, &members, ordered)?;

        let spread: Vec<OrderedPair> = ordered
            .iter()
            .enumerate()
            .map(|(pos, id)| OrderedPair {
                id: *id,
                order_index: SPREAD_OFFSET + pos as i64 + 1,
            })
            .collect();
        self.store.apply_order_batch(&spread).await?;

        let compact: Vec<OrderedPair> = ordered
            .iter()
            .enumerate()
            .map(|(pos, id)| OrderedPair {
                id: *id,
                order_index: pos as i64 + 1,
            })
            .collect();
        self.store.apply_order_batch(&compact).await?;

        debug!(%dragged, %holder, %column, cards = compact.len(), "column renumbered");

        self.manager
            .release(dragged, LockKind::Position, holder)
            .await?;
        self.bus.publish(BoardEvent::CardReordered {
            order: compact.clone(),
        });

        Ok(compact)
    }
}

/// Reject any `ordered` that is not exactly a permutation of `members`.
fn validate_permutation(column: &str, members: &[CardId], ordered: &[CardId]) -> Result<()> {
    let member_set: HashSet<CardId> = members.iter().copied().collect();
    let mut seen = HashSet::with_capacity(ordered.len());

    for id in ordered {
        if !member_set.contains(id) {
            return Err(PlankError::Validation(format!(
                "card {id} is not in column {column}"
            )));
        }
        if !seen.insert(*id) {
            return Err(PlankError::Validation(format!(
                "card {id} appears twice in the requested ordering"
            )));
        }
    }

    if seen.len() != member_set.len() {
        return Err(PlankError::Validation(format!(
            "ordering covers {} of {} cards in column {column}",
            seen.len(),
            member_set.len()
        )));
    }

    Ok(())
}
