//! Event repository abstraction.
//!
//! The repository is the store of record: every aggregate owns one ordered
//! stream of events, and the stream length is the aggregate's version.
//! Appends are compare-and-swap on that version.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// An event as it sits in the store: envelope fields flattened next to the
/// JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Primary key.
    pub event_id: Uuid,
    /// Stream key.
    pub aggregate_id: Uuid,
    /// Selects the payload variant on decode.
    pub event_type: String,
    /// Payload without the envelope.
    pub payload: serde_json::Value,
    /// Position in the stream, starting at 1.
    pub sequence_number: i64,
    /// Request the event belongs to.
    pub correlation_id: Uuid,
    /// What produced the event.
    pub causation_id: Uuid,
    /// Decision time, from the injected clock.
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl StoredEvent {
    /// Builds the stored form of a domain event.
    #[must_use]
    pub fn from_domain_event<E: DomainEvent + ?Sized>(event: &E) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            aggregate_id: meta.aggregate_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            sequence_number: meta.sequence_number,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        }
    }

    /// Checks that `events` all belong to `aggregate_id` and continue its
    /// stream contiguously from `expected_version`. Every store runs this
    /// before writing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` naming the first offending
    /// event.
    pub fn validate_batch(
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut next = expected_version + 1;
        for event in events {
            if event.aggregate_id != aggregate_id {
                return Err(DomainError::InvariantViolation(format!(
                    "event {} belongs to aggregate {}, not {aggregate_id}",
                    event.event_id, event.aggregate_id
                )));
            }
            if event.sequence_number != next {
                return Err(DomainError::InvariantViolation(format!(
                    "event {} has sequence number {}, expected {next}",
                    event.event_id, event.sequence_number
                )));
            }
            next += 1;
        }
        Ok(())
    }
}
/// Keyed storage of event streams. The in-memory and PostgreSQL stores
/// implement it; tests substitute doubles.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Loads the full stream for `aggregate_id` in sequence order. An unknown
    /// aggregate yields an empty stream.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Appends `events` to the stream if its current length is
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if the stream has moved on, `InvariantViolation`
    /// if the batch fails [`StoredEvent::validate_batch`], `Infrastructure`
    /// for storage failures.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;
}
