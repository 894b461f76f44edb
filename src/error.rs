//! Error types for the plank coordination core.
//!
//! Uses thiserror for derive macros. Lock conflicts are deliberately *not*
//! an error variant: a denied acquire is a normal outcome the caller must
//! branch on, so it is modeled as [`crate::lock::AcquireOutcome::Denied`].

use crate::card::CardId;
use thiserror::Error;

/// Main error type for plank operations.
#[derive(Error, Debug)]
pub enum PlankError {
    /// The referenced card does not exist. Fatal to the single operation.
    #[error("card {0} does not exist")]
    NotFound(CardId),

    /// Malformed request, rejected before any state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The board store failed to read or write.
    #[error("storage operation failed: {0}")]
    Storage(String),

    /// Unexpected failure; the operation was aborted with no partial state.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for plank operations.
pub type Result<T> = std::result::Result<T, PlankError>;
