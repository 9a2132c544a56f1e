//! Reservation record, the queryable projection of a reservation's history.
//!
//! A record only ever changes by folding the next event into it. Whether a
//! transition is *allowed* is decided by the aggregate; folding checks only
//! that the event actually continues this record's stream.

use reservations_core::error::DomainError;
use reservations_core::event::DomainEvent;
use serde::Serialize;
use uuid::Uuid;

use super::events::{ReservationEvent, ReservationEventKind};
use super::status::ReservationStatus;

/// Current state of one reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRecord {
    /// The reservation identifier, fixed by the creating event.
    pub reservation_id: Uuid,
    /// The reservation number.
    pub number: String,
    /// The current status.
    pub status: ReservationStatus,
    /// Sequence number of the last folded event.
    pub version: i64,
}

/// Folds one event into the record, returning the updated record.
///
/// # Errors
///
/// Returns `DomainError::InvariantViolation` if a creation event arrives for
/// an existing record, if the event names a different reservation, or if its
/// sequence number does not directly follow the record's version.
/// Returns `DomainError::AggregateNotFound` if a non-creation event arrives
/// with no record.
pub fn fold(
    record: Option<ReservationRecord>,
    event: &ReservationEvent,
) -> Result<ReservationRecord, DomainError> {
    let reservation_id = event.kind.reservation_id();
    if event.metadata.aggregate_id != reservation_id {
        return Err(DomainError::InvariantViolation(format!(
            "event {} is filed under aggregate {} but describes reservation {reservation_id}",
            event.metadata.event_id, event.metadata.aggregate_id
        )));
    }

    match (&event.kind, record) {
        (ReservationEventKind::ReservationCreated(payload), None) => {
            let version = ensure_next_sequence(event, 0)?;
            Ok(ReservationRecord {
                reservation_id: payload.reservation_id,
                number: payload.number.clone(),
                status: payload.status,
                version,
            })
        }
        (ReservationEventKind::ReservationCreated(payload), Some(_)) => {
            Err(DomainError::InvariantViolation(format!(
                "reservation {} already has a record",
                payload.reservation_id
            )))
        }
        (
            ReservationEventKind::ReservationConfirmed(_)
            | ReservationEventKind::ReservationCanceled(_),
            None,
        ) => Err(DomainError::AggregateNotFound(reservation_id)),
        (
            ReservationEventKind::ReservationConfirmed(_)
            | ReservationEventKind::ReservationCanceled(_),
            Some(mut record),
        ) => {
            ensure_same_reservation(&record, reservation_id)?;
            record.version = ensure_next_sequence(event, record.version)?;
            record.status = event.kind.status();
            Ok(record)
        }
    }
}

/// Returns the event's sequence number if it directly follows `version`.
fn ensure_next_sequence(event: &ReservationEvent, version: i64) -> Result<i64, DomainError> {
    let sequence_number = event.sequence_number();
    if sequence_number == version + 1 {
        Ok(sequence_number)
    } else {
        Err(DomainError::InvariantViolation(format!(
            "event {} has sequence number {sequence_number}, expected {}",
            event.metadata.event_id,
            version + 1
        )))
    }
}

fn ensure_same_reservation(
    record: &ReservationRecord,
    reservation_id: Uuid,
) -> Result<(), DomainError> {
    if record.reservation_id == reservation_id {
        Ok(())
    } else {
        Err(DomainError::InvariantViolation(format!(
            "event for reservation {reservation_id} folded into record {}",
            record.reservation_id
        )))
    }
}
