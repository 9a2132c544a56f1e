//! Domain events for the booking context.

use reservations_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::ReservationStatus;

/// Emitted when a reservation is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCreated {
    /// The reservation identifier.
    pub reservation_id: Uuid,
    /// The reservation number.
    pub number: String,
    /// The initial status, always `Pending`.
    pub status: ReservationStatus,
}

/// Emitted when a reservation is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConfirmed {
    /// The reservation identifier.
    pub reservation_id: Uuid,
    /// The new status, always `Confirmed`.
    pub status: ReservationStatus,
}

/// Emitted when a reservation is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCanceled {
    /// The reservation identifier.
    pub reservation_id: Uuid,
    /// The new status, always `Cancelled`.
    pub status: ReservationStatus,
}

/// Event type identifier for [`ReservationCreated`].
pub const RESERVATION_CREATED_EVENT_TYPE: &str = "reservation.created";

/// Event type identifier for [`ReservationConfirmed`].
pub const RESERVATION_CONFIRMED_EVENT_TYPE: &str = "reservation.confirmed";

/// Event type identifier for [`ReservationCanceled`].
pub const RESERVATION_CANCELED_EVENT_TYPE: &str = "reservation.canceled";

/// Event payload variants for the booking context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEventKind {
    /// A reservation has been created.
    ReservationCreated(ReservationCreated),
    /// A reservation has been confirmed.
    ReservationConfirmed(ReservationConfirmed),
    /// A reservation has been cancelled.
    ReservationCanceled(ReservationCanceled),
}

impl ReservationEventKind {
    /// Returns the event type identifier for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReservationCreated(_) => RESERVATION_CREATED_EVENT_TYPE,
            Self::ReservationConfirmed(_) => RESERVATION_CONFIRMED_EVENT_TYPE,
            Self::ReservationCanceled(_) => RESERVATION_CANCELED_EVENT_TYPE,
        }
    }

    /// Returns the reservation the payload refers to.
    #[must_use]
    pub fn reservation_id(&self) -> Uuid {
        match self {
            Self::ReservationCreated(payload) => payload.reservation_id,
            Self::ReservationConfirmed(payload) => payload.reservation_id,
            Self::ReservationCanceled(payload) => payload.reservation_id,
        }
    }

    /// Returns the status the reservation is in after this event.
    #[must_use]
    pub fn status(&self) -> ReservationStatus {
        match self {
            Self::ReservationCreated(payload) => payload.status,
            Self::ReservationConfirmed(payload) => payload.status,
            Self::ReservationCanceled(payload) => payload.status,
        }
    }
}

/// Domain event envelope for the booking context.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: ReservationEventKind,
}

impl DomainEvent for ReservationEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("ReservationEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
