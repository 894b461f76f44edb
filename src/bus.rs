//! Event fan-out.
//!
//! Every state-changing operation publishes exactly one [`BoardEvent`]
//! carrying the minimal fields observers need to patch their local view by
//! identity-keyed overwrite. Delivery is best-effort and at-most-once per
//! observer: a disconnected observer simply misses events and re-fetches
//! full state once when it comes back. Observers must tolerate receiving
//! the same event twice.
//!
//! The bus is a trait so the lock manager and reorder coordinator depend on
//! an abstraction rather than a process-wide singleton; swapping in an
//! external pub/sub backend is an implementation of [`EventBus`], not a
//! change to the core.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::card::{Card, CardId, OrderedPair, UserId};
use crate::lock::LockKind;

/// Notification published on every state change. Position-lock traffic uses
/// the `lock_*` variants; the independent content lock uses the parallel
/// `edit_*` variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    LockAcquired { card: CardId, holder: UserId },
    LockReleased { card: CardId },
    LockExpired { card: CardId },
    EditAcquired { card: CardId, holder: UserId },
    EditReleased { card: CardId },
    EditExpired { card: CardId },
    CardCreated { card: Card },
    CardUpdated { card: Card },
    CardReordered { order: Vec<OrderedPair> },
    CardDeleted { card: CardId },
}

impl BoardEvent {
    /// Acquire notification for the given lock kind.
    pub fn acquired(kind: LockKind, card: CardId, holder: UserId) -> Self {
        match kind {
            LockKind::Position => BoardEvent::LockAcquired { card, holder },
            LockKind::Content => BoardEvent::EditAcquired { card, holder },
        }
    }

    /// Cooperative-release notification for the given lock kind.
    pub fn released(kind: LockKind, card: CardId) -> Self {
        match kind {
            LockKind::Position => BoardEvent::LockReleased { card },
            LockKind::Content => BoardEvent::EditReleased { card },
        }
    }

    /// Forced-release notification, distinct from [`BoardEvent::released`]
    /// so observers can tell abandonment from a cooperative release.
    pub fn expired(kind: LockKind, card: CardId) -> Self {
        match kind {
            LockKind::Position => BoardEvent::LockExpired { card },
            LockKind::Content => BoardEvent::EditExpired { card },
        }
    }
}

/// Injectable fan-out seam. Publishing never blocks and never fails from
/// the caller's point of view.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: BoardEvent);
}

/// Default single-process bus over `tokio::sync::broadcast`. Slow or
/// disconnected receivers lose events, which the delivery contract allows.
pub struct BroadcastBus {
    tx: broadcast::Sender<BoardEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new observer. Events published before the subscription are
    /// not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: BoardEvent) {
        // send only errors when no receiver is connected, which is fine.
        let _ = self.tx.send(event);
    }
}

/// Bus that drops everything. For embedders and tests that do not observe.
#[derive(Default)]
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&self, _event: BoardEvent) {}
}
