//! Atomic acquire/release/force-release against the board store.
//!
//! The manager is the single source of truth for "who may mutate what right
//! now". Every transition resolves through one store compare-and-set; a
//! lost CAS means another caller raced us, so we re-read and re-decide.
//! There is no in-process lock table — all coordination state lives in the
//! store, which is what lets multiple server processes share one manager
//! implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bus::{BoardEvent, EventBus};
use crate::card::{CardId, UserId};
use crate::error::Result;
use crate::lock::{LockKind, LockState};
use crate::store::BoardStore;

/// Outcome of an acquire attempt. A denial is a normal, typed result the
/// caller branches on — it carries the blocking holder so the UI can show
/// who is in the way.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Granted,
    Denied { held_by: UserId },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted)
    }
}

/// One currently-held lock, as reported by introspection and the sweep scan.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldLockInfo {
    pub card: CardId,
    pub holder: UserId,
    pub since: DateTime<Utc>,
}

/// Lock coordination over a [`BoardStore`], publishing one bus event per
/// successful operation.
pub struct LockManager {
    store: Arc<dyn BoardStore>,
    bus: Arc<dyn EventBus>,
}

impl LockManager {
    pub fn new(store: Arc<dyn BoardStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    /// Try to take the `kind` lock on `card` for `holder`.
    ///
    /// Re-acquisition by the current holder succeeds without touching the
    /// acquisition timestamp, so a holder cannot extend its TTL by polling.
    ///
    /// # Returns
    ///
    /// * `Ok(AcquireOutcome::Granted)` - the lock is now (or was already) held by `holder`
    /// * `Ok(AcquireOutcome::Denied)` - another holder is in the way; their identity is attached
    /// * `Err(PlankError::NotFound)` - the card does not exist
    pub async fn acquire(
        &self,
        card: CardId,
        kind: LockKind,
        holder: &UserId,
    ) -> Result<AcquireOutcome> {
        loop {
            let current = self.store.lock_state(card, kind).await?;
            match &current {
                LockState::Held { holder: h, .. } if h == holder => {
                    debug!(%card, %kind, %holder, "lock re-acquired (timestamp unchanged)");
                    self.bus
                        .publish(BoardEvent::acquired(kind, card, holder.clone()));
                    return Ok(AcquireOutcome::Granted);
                }
                LockState::Held { holder: h, .. } => {
                    debug!(%card, %kind, %holder, held_by = %h, "lock denied");
                    return Ok(AcquireOutcome::Denied {
                        held_by: h.clone(),
                    });
                }
                LockState::Free => {
                    let next = LockState::held_by(holder.clone());
                    if self
                        .store
                        .compare_and_set_lock(card, kind, &current, next)
                        .await?
                    {
                        debug!(%card, %kind, %holder, "lock acquired");
                        self.bus
                            .publish(BoardEvent::acquired(kind, card, holder.clone()));
                        return Ok(AcquireOutcome::Granted);
                    }
                    // Lost the CAS to a racing caller; re-read and re-decide.
                }
            }
        }
    }

    /// Release the `kind` lock on `card`, but only if `holder` holds it.
    /// Returns false (and changes nothing) otherwise.
    pub async fn release(&self, card: CardId, kind: LockKind, holder: &UserId) -> Result<bool> {
        loop {
            let current = self.store.lock_state(card, kind).await?;
            match &current {
                LockState::Held { holder: h, .. } if h == holder => {
                    if self
                        .store
                        .compare_and_set_lock(card, kind, &current, LockState::Free)
                        .await?
                    {
                        debug!(%card, %kind, %holder, "lock released");
                        self.bus.publish(BoardEvent::released(kind, card));
                        return Ok(true);
                    }
                }
                _ => return Ok(false),
            }
        }
    }

    /// Unconditionally free the `kind` lock on `card`, whoever holds it.
    ///
    /// Used by the expiry sweeper. Idempotent: returns false when the lock
    /// is already free. Publishes the distinct *expired* event so observers
    /// can tell abandonment from a cooperative release.
    pub async fn force_release(&self, card: CardId, kind: LockKind) -> Result<bool> {
        loop {
            let current = self.store.lock_state(card, kind).await?;
            match &current {
                LockState::Free => return Ok(false),
                LockState::Held { holder, since } => {
                    let (holder, since) = (holder.clone(), *since);
                    if self
                        .store
                        .compare_and_set_lock(card, kind, &current, LockState::Free)
                        .await?
                    {
                        debug!(%card, %kind, %holder, %since, "lock force-released");
                        self.bus.publish(BoardEvent::expired(kind, card));
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Current holder of one lock sub-record, if any. `NotFound` if the
    /// card does not exist.
    pub async fn holder_of(&self, card: CardId, kind: LockKind) -> Result<Option<UserId>> {
        Ok(self.store.lock_state(card, kind).await?.holder().cloned())
    }

    /// Every currently-held lock of one kind, for rendering lock holders
    /// after a client re-fetches full state.
    pub async fn held_locks(&self, kind: LockKind) -> Result<Vec<HeldLockInfo>> {
        self.store.held_locks(kind).await
    }
}
