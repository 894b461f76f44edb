//! Replay of offline mutations against the live board.
//!
//! Triggered on reconnect. Replay is single-flight — a reentrant trigger
//! while a drain is running is a no-op — and strictly sequential, because
//! parallel replay could acquire and release the same lock out of order
//! and corrupt the intended sequence. Each entry negotiates its lock,
//! applies, releases, and is removed from the queue; an entry blocked by a
//! live holder is skipped, never a reason to stall the rest. Whatever is
//! left after one full pass is discarded outright: bounded reconciliation
//! is preferred over unbounded retry, at the documented cost of losing
//! conflicting offline edits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::card::{Card, CardContent, CardDraft, CardId, ColumnId, OrderedPair, UserId};
use crate::error::Result;
use crate::lock::{AcquireOutcome, LockKind};
use crate::queue::{MutationPayload, OfflineQueue, QueuedMutation};

/// The client's view of the live server. Implemented by the surrounding
/// application's transport layer; errors are opaque to this core and only
/// ever logged and skipped.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn acquire_lock(
        &self,
        card: CardId,
        kind: LockKind,
        holder: &UserId,
    ) -> anyhow::Result<AcquireOutcome>;

    async fn release_lock(
        &self,
        card: CardId,
        kind: LockKind,
        holder: &UserId,
    ) -> anyhow::Result<bool>;

    /// Create a card; the returned record carries the server-assigned id.
    async fn create_card(&self, draft: &CardDraft) -> anyhow::Result<Card>;

    async fn update_content(&self, card: CardId, content: &CardContent) -> anyhow::Result<Card>;

    async fn move_card(
        &self,
        card: CardId,
        column: &ColumnId,
        position: i64,
    ) -> anyhow::Result<Card>;

    /// Renumber a column. The caller must hold the position lock on
    /// `dragged`; the server releases it once the reorder commits.
    async fn reorder(
        &self,
        dragged: CardId,
        holder: &UserId,
        ordered: &[CardId],
    ) -> anyhow::Result<Vec<OrderedPair>>;

    async fn delete_card(&self, card: CardId) -> anyhow::Result<()>;
}

/// One queued entry that lost to a live lock holder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConflict {
    pub local_id: u64,
    pub card: CardId,
    pub kind: LockKind,
    pub held_by: UserId,
}

/// A successfully replayed creation, correlated back to the client's
/// placeholder by its local reference and title so the placeholder can be
/// swapped for the authoritative record instead of duplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedCard {
    pub local_ref: String,
    pub title: String,
    pub card: Card,
}

/// What one replay pass did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    /// Entries applied and removed from the queue.
    pub replayed: usize,
    /// Entries discarded after the pass (lock conflicts and failures).
    pub dropped: usize,
    pub conflicts: Vec<ReplayConflict>,
    pub created: Vec<CreatedCard>,
}

enum Outcome {
    Applied(Option<CreatedCard>),
    Conflict { card: CardId, kind: LockKind, held_by: UserId },
    Failed,
}

/// Drains the offline queue against the live API, once at a time.
pub struct ReplayEngine {
    api: Arc<dyn BoardApi>,
    queue: Mutex<OfflineQueue>,
    client: UserId,
    flight: Mutex<()>,
}

impl ReplayEngine {
    pub fn new(api: Arc<dyn BoardApi>, queue: OfflineQueue, client: UserId) -> Self {
        Self {
            api,
            queue: Mutex::new(queue),
            client,
            flight: Mutex::new(()),
        }
    }

    /// Run one full replay pass.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - a pass is already running; nothing was touched
    /// * `Ok(Some(report))` - every queued entry was processed in FIFO
    ///   order and whatever remained afterwards was discarded
    /// * `Err(_)` - the queue file itself could not be read or rewritten
    pub async fn replay(&self) -> Result<Option<ReplayReport>> {
        let Ok(_in_flight) = self.flight.try_lock() else {
            debug!("replay already running; ignoring reentrant trigger");
            return Ok(None);
        };

        let entries = self.queue.lock().await.drain()?;
        debug!(entries = entries.len(), client = %self.client, "replaying offline queue");

        let mut report = ReplayReport::default();
        for entry in entries {
            match self.replay_entry(&entry).await {
                Outcome::Applied(created) => {
                    self.queue.lock().await.remove(entry.local_id)?;
                    report.replayed += 1;
                    if let Some(created) = created {
                        report.created.push(created);
                    }
                }
                Outcome::Conflict { card, kind, held_by } => {
                    warn!(%card, %kind, %held_by, local_id = entry.local_id,
                        "queued mutation lost to a live lock holder; skipping");
                    report.conflicts.push(ReplayConflict {
                        local_id: entry.local_id,
                        card,
                        kind,
                        held_by,
                    });
                }
                Outcome::Failed => {}
            }
        }

        // One attempt per entry; whatever is still queued was skipped and
        // is dropped rather than retried on the next reconnect.
        let mut queue = self.queue.lock().await;
        report.dropped = queue.len()?;
        if report.dropped > 0 {
            warn!(dropped = report.dropped, "discarding unreplayable offline entries");
        }
        queue.clear()?;

        Ok(Some(report))
    }

    async fn replay_entry(&self, entry: &QueuedMutation) -> Outcome {
        let lock = entry.payload.lock_needed();

        if let Some((card, kind)) = lock {
            match self.api.acquire_lock(card, kind, &self.client).await {
                Ok(AcquireOutcome::Granted) => {}
                Ok(AcquireOutcome::Denied { held_by }) => {
                    return Outcome::Conflict { card, kind, held_by };
                }
                Err(err) => {
                    warn!(%card, %kind, local_id = entry.local_id, %err,
                        "lock negotiation failed during replay; skipping entry");
                    return Outcome::Failed;
                }
            }
        }

        match self.apply(&entry.payload).await {
            Ok(created) => {
                // A reorder's lock is released server-side once it commits;
                // everything else releases here.
                if let Some((card, kind)) = lock
                    && !matches!(entry.payload, MutationPayload::Reorder { .. })
                {
                    let _ = self.api.release_lock(card, kind, &self.client).await;
                }
                Outcome::Applied(created)
            }
            Err(err) => {
                warn!(local_id = entry.local_id, %err,
                    "queued mutation failed on replay; dropping after one attempt");
                if let Some((card, kind)) = lock {
                    let _ = self.api.release_lock(card, kind, &self.client).await;
                }
                Outcome::Failed
            }
        }
    }

    async fn apply(&self, payload: &MutationPayload) -> anyhow::Result<Option<CreatedCard>> {
        match payload {
            MutationPayload::Create { local_ref, draft } => {
                let card = self.api.create_card(draft).await?;
                Ok(Some(CreatedCard {
                    local_ref: local_ref.clone(),
                    title: draft.title.clone(),
                    card,
                }))
            }
            MutationPayload::UpdateContent { card, content } => {
                self.api.update_content(*card, content).await?;
                Ok(None)
            }
            MutationPayload::MoveCard {
                card,
                column,
                position,
            } => {
                self.api.move_card(*card, column, *position).await?;
                Ok(None)
            }
            MutationPayload::Reorder { dragged, ordered } => {
                self.api.reorder(*dragged, &self.client, ordered).await?;
                Ok(None)
            }
            MutationPayload::Delete { card } => {
                self.api.delete_card(*card).await?;
                Ok(None)
            }
        }
    }
}
