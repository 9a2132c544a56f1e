//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A command targeted an aggregate that does not exist.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// A creation command targeted an aggregate that already exists.
    #[error("aggregate already exists: {0}")]
    AlreadyExists(Uuid),

    /// The command is not applicable to the aggregate's current status.
    #[error("cannot apply {command} to aggregate {aggregate_id} in status {status}")]
    InvalidTransition {
        /// The aggregate the command targeted.
        aggregate_id: Uuid,
        /// The status the aggregate was in.
        status: String,
        /// The rejected command type.
        command: &'static str,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The caller's deadline passed before the command could be persisted.
    #[error("deadline exceeded for aggregate {aggregate_id} after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// The aggregate the command targeted.
        aggregate_id: Uuid,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A projection and its events disagree. Always a bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors a fresh load-decide-append attempt may
    /// resolve.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
