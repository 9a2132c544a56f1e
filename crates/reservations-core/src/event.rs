//! Events: the immutable facts an aggregate stream is made of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::Command;

/// Envelope fields shared by every event, whatever its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Payload discriminator, e.g. `reservation.created`.
    pub event_type: String,
    /// Stream the event is filed under.
    pub aggregate_id: Uuid,
    /// Position in the stream, starting at 1.
    pub sequence_number: i64,
    /// Shared by every event a single request produced.
    pub correlation_id: Uuid,
    /// The command or event this one was produced by.
    pub causation_id: Uuid,
    /// When the deciding code read the clock.
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Metadata for an event produced directly by `command`, placed at
    /// `sequence_number` in the command's target stream. A fresh event id is
    /// minted; the command's correlation id is also the causation id.
    #[must_use]
    pub fn caused_by(
        command: &dyn Command,
        event_type: &str,
        sequence_number: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_owned(),
            aggregate_id: command.aggregate_id(),
            sequence_number,
            correlation_id: command.correlation_id(),
            causation_id: command.correlation_id(),
            occurred_at,
        }
    }
}

/// A typed event with its envelope.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Payload discriminator stored alongside the JSON payload.
    fn event_type(&self) -> &'static str;

    /// The payload as JSON, without the envelope.
    fn to_payload(&self) -> serde_json::Value;

    /// The envelope.
    fn metadata(&self) -> &EventMetadata;

    /// Position of this event in its stream.
    fn sequence_number(&self) -> i64 {
        self.metadata().sequence_number
    }
}
