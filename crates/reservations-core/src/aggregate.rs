//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for transient decision objects rebuilt from persisted state before
/// every command.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the version the aggregate was loaded at (last persisted
    /// sequence number, `0` for a fresh aggregate).
    fn version(&self) -> i64;

    /// Returns uncommitted events produced by command handling, in order.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains the uncommitted events, leaving the buffer empty.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
