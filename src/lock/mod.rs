//! Lock model for the board.
//!
//! Every card carries two independent lock sub-records, one per coordinated
//! concern: dragging (position) and editing (content). They never interact;
//! holding one says nothing about the other.
//!
//! The state machine per sub-record is small and perpetual:
//!
//! ```text
//! FREE --acquire(h)--> HELD(h, now)
//! HELD(h) --acquire(h)--> HELD(h, since)      idempotent, timestamp unchanged
//! HELD(h) --acquire(h2)--> HELD(h)            denied
//! HELD(h) --release(h)--> FREE
//! HELD(h) --release(h2)--> HELD(h)            rejected
//! HELD(h) --expire--> FREE                    forced, any holder
//! ```
//!
//! Transitions are driven by [`LockManager`]; this module only defines the
//! states and pure predicates over them.

use crate::card::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod manager;

pub use manager::{AcquireOutcome, HeldLockInfo, LockManager};

/// The two coordinated concerns a card can be locked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Drag-reorder lock; guards `order_index` and column membership.
    Position,
    /// Content-edit lock; guards title and description.
    Content,
}

impl LockKind {
    /// All kinds, in the order the sweeper scans them.
    pub const ALL: [LockKind; 2] = [LockKind::Position, LockKind::Content];

    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Position => "position",
            LockKind::Content => "content",
        }
    }
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one lock sub-record.
///
/// `Free` carries no holder and no timestamp, so the invariant
/// "not held implies no holder and no acquisition instant" holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Free,
    Held {
        holder: UserId,
        since: DateTime<Utc>,
    },
}

impl LockState {
    /// A fresh `Held` state stamped with the current instant.
    pub fn held_by(holder: UserId) -> Self {
        LockState::Held {
            holder,
            since: Utc::now(),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, LockState::Free)
    }

    /// The current holder, if any.
    pub fn holder(&self) -> Option<&UserId> {
        match self {
            LockState::Free => None,
            LockState::Held { holder, .. } => Some(holder),
        }
    }

    /// Whether this lock was acquired before `threshold` and is therefore
    /// overdue for a forced release. Free locks never expire.
    pub fn held_since_before(&self, threshold: DateTime<Utc>) -> bool {
        match self {
            LockState::Free => false,
            LockState::Held { since, .. } => *since < threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn free_lock_has_no_holder() {
        assert!(LockState::Free.is_free());
        assert!(LockState::Free.holder().is_none());
    }

    #[test]
    fn held_lock_reports_holder() {
        let state = LockState::held_by(UserId::new("ada"));
        assert!(!state.is_free());
        assert_eq!(state.holder(), Some(&UserId::new("ada")));
    }

    #[test]
    fn expiry_predicate_uses_acquisition_instant() {
        let state = LockState::Held {
            holder: UserId::new("ada"),
            since: Utc::now() - Duration::seconds(121),
        };

        assert!(state.held_since_before(Utc::now() - Duration::seconds(120)));
        assert!(!state.held_since_before(Utc::now() - Duration::seconds(180)));
    }

    #[test]
    fn free_lock_never_expires() {
        assert!(!LockState::Free.held_since_before(Utc::now() + Duration::days(1)));
    }

    #[test]
    fn lock_state_serializes_with_tag() {
        let json = serde_json::to_string(&LockState::Free).unwrap();
        assert_eq!(json, r#"{"state":"free"}"#);

        let held = LockState::held_by(UserId::new("ada"));
        let json = serde_json::to_string(&held).unwrap();
        assert!(json.contains(r#""state":"held""#));
        assert!(json.contains(r#""holder":"ada""#));

        let back: LockState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, held);
    }

    #[test]
    fn lock_kind_display_matches_wire_names() {
        assert_eq!(LockKind::Position.to_string(), "position");
        assert_eq!(LockKind::Content.to_string(), "content");
    }
}
