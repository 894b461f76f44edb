//! Plank: coordination core for a collaborative kanban board.
//!
//! Multiple users manipulate one shared, ordered collection of cards; this
//! crate is the part that keeps them from corrupting each other's edits.
//! Server side, the [`lock::LockManager`] arbitrates two independent locks
//! per card (position and content), the [`sweep::ExpirySweeper`] reclaims
//! locks abandoned past their TTL, and the [`reorder::ReorderCoordinator`]
//! renumbers a column densely under the position lock. Client side, the
//! [`queue::OfflineQueue`] records mutations attempted while disconnected
//! and the [`replay::ReplayEngine`] drains them on reconnect, skipping
//! whatever now conflicts. Every state change fans out through the
//! injectable [`bus::EventBus`].
//!
//! The surrounding application — rendering, routing, authentication,
//! transport, the persistence schema — lives behind the [`store::BoardStore`]
//! and [`replay::BoardApi`] seams.

pub mod bus;
pub mod card;
pub mod config;
pub mod error;
pub mod fs;
pub mod lock;
pub mod queue;
pub mod reorder;
pub mod replay;
pub mod store;
pub mod sweep;

pub use bus::{BoardEvent, BroadcastBus, EventBus, NullBus};
pub use card::{Card, CardContent, CardDraft, CardId, ColumnId, OrderedPair, UserId};
pub use config::Config;
pub use error::{PlankError, Result};
pub use lock::{AcquireOutcome, HeldLockInfo, LockKind, LockManager, LockState};
pub use queue::{MutationPayload, OfflineQueue, QueuedMutation};
pub use reorder::ReorderCoordinator;
pub use replay::{BoardApi, CreatedCard, ReplayConflict, ReplayEngine, ReplayReport};
pub use store::{BoardStore, MemoryStore};
pub use sweep::{ExpirySweeper, SweeperHandle};
