//! Client-resident offline mutation queue.
//!
//! While a client is disconnected, every mutation it attempts is appended
//! here instead of being sent. The log is NDJSON — one self-contained JSON
//! object per line, fsynced on append — and is owned by exactly one client
//! process; it is never shared.
//!
//! Self-contained means a payload carries everything replay needs without
//! reading server state: a reorder entry carries the entire target
//! ordering, never a delta. Entries are immutable once appended; they are
//! removed after successful replay or dropped wholesale by
//! [`OfflineQueue::clear`] when the session is abandoned.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::card::{CardContent, CardDraft, CardId, ColumnId};
use crate::error::{PlankError, Result};
use crate::lock::LockKind;


/// One queued mutation, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationPayload {
    /// Create a card. `local_ref` is the client-chosen placeholder identity
    /// used to reconcile the server-assigned card after replay.
    Create { local_ref: String, draft: CardDraft },

    /// Overwrite a card's editable content.
    UpdateContent { card: CardId, content: CardContent },

    /// Move a card to a column and raw position.
    MoveCard {
        card: CardId,
        column: ColumnId,
        position: i64,
    },

    /// Renumber a whole column; carries the complete target ordering.
    Reorder {
        dragged: CardId,
        ordered: Vec<CardId>,
    },

    /// Delete a card.
    Delete { card: CardId },
}

impl MutationPayload {
    /// The lock replay must negotiate before applying this mutation, if
    /// any. Creation is lock-free: the card does not exist yet, so there is
    /// nothing to lock.
    pub fn lock_needed(&self) -> Option<(CardId, LockKind)> {
        match self {
            MutationPayload::Create { .. } => None,
            MutationPayload::UpdateContent { card, .. } => Some((*card, LockKind::Content)),
            MutationPayload::MoveCard { card, .. } => Some((*card, LockKind::Position)),
            MutationPayload::Reorder { dragged, .. } => Some((*dragged, LockKind::Position)),
            MutationPayload::Delete { card } => Some((*card, LockKind::Content)),
        }
    }
}

/// A persisted queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    /// Monotonic per-client id; assigned on enqueue, never reused.
    pub local_id: u64,

    #[serde(flatten)]
    pub payload: MutationPayload,

    /// When the client attempted the mutation.
    pub enqueued_at: DateTime<Utc>,
}

/// Append-only durable FIFO log of offline mutations.
pub struct OfflineQueue {
    path: PathBuf,
    next_id: u64,
}

impl OfflineQueue {
    /// Open (or create) the queue under `dir`. The monotonic id counter is
    /// restored by scanning the existing log.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            PlankError::Storage(format!(
                "failed to create queue directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut queue = Self {
            path: dir.join("queue.ndjson"),
            next_id: 0,
        };
        queue.next_id = queue
            .read_entries()?
            .iter()
            .map(|entry| entry.local_id)
            .max()
            .unwrap_or(0);
        Ok(queue)
    }

    /// Append one mutation, stamped with a fresh `enqueued_at`, and fsync.
    pub fn enqueue(&mut self, payload: MutationPayload) -> Result<QueuedMutation> {
        self.next_id += 1;
        let entry = QueuedMutation {
            local_id: self.next_id,
            payload,
            enqueued_at: Utc::now(),
        };

        let line = serde_json::to_string(&entry).map_err(|e| {
            PlankError::Internal(format!("failed to serialize queue entry: {}", e))
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PlankError::Storage(format!(
                    "failed to open queue file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                PlankError::Storage(format!(
                    "failed to append to queue file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        Ok(entry)
    }

    /// All entries in replay order: `enqueued_at` ascending, `local_id` as
    /// the tiebreak for same-instant enqueues.
    pub fn drain(&self) -> Result<Vec<QueuedMutation>> {
        let mut entries = self.read_entries()?;
        entries.sort_by_key(|entry| (entry.enqueued_at, entry.local_id));
        Ok(entries)
    }

    /// Remove one entry after successful replay. Returns false if no entry
    /// with that id exists.
    pub fn remove(&mut self, local_id: u64) -> Result<bool> {
        let entries = self.read_entries()?;
        let kept: Vec<&QueuedMutation> = entries
            .iter()
            .filter(|entry| entry.local_id != local_id)
            .collect();
        if kept.len() == entries.len() {
            return Ok(false);
        }

        let mut content = String::new();
        for entry in &kept {
            let line = serde_json::to_string(entry).map_err(|e| {
                PlankError::Internal(format!("failed to serialize queue entry: {}", e))
            })?;
            content.push_str(&line);
            content.push('\n');
        }
        crate::fs::atomic_write_file(&self.path, &content)?;
        Ok(true)
    }

    /// Wipe the log. Used when the client abandons its session and when
    /// replay discards leftover conflicting entries.
    pub fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PlankError::Storage(format!(
                "failed to clear queue file '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read every parseable entry. A corrupt line is logged and skipped;
    /// the log is advisory client state and one bad line must never take
    /// the rest of the queue down with it.
    fn read_entries(&self) -> Result<Vec<QueuedMutation>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PlankError::Storage(format!(
                    "failed to read queue file '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<QueuedMutation>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!(line = number + 1, %err, "skipping corrupt offline queue entry");
                }
            }
        }
        Ok(entries)
    }
}
