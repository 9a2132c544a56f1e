//! Query handlers for the booking context.
//!
//! Queries replay the stored history and return read-only views. They never
//! append.

use reservations_core::error::DomainError;
use reservations_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::repository::reconstitute;
use crate::domain::record::ReservationRecord;
use crate::domain::status::ReservationStatus;

/// Read-only view of a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationView {
    /// The reservation identifier.
    pub reservation_id: Uuid,
    /// The reservation number.
    pub number: String,
    /// Current status.
    pub status: ReservationStatus,
    /// Current version (last sequence number).
    pub version: i64,
}

impl From<ReservationRecord> for ReservationView {
    fn from(record: ReservationRecord) -> Self {
        Self {
            reservation_id: record.reservation_id,
            number: record.number,
            status: record.status,
            version: record.version,
        }
    }
}

/// Looks up a reservation, returning `None` if it has no history.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if loading or event deserialization
/// fails.
pub async fn find_reservation(
    reservation_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Option<ReservationView>, DomainError> {
    let stored_events = repo.load_events(reservation_id).await?;
    Ok(reconstitute(&stored_events)?.map(ReservationView::from))
}

/// Retrieves a reservation by its identifier.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_reservation_by_id(
    reservation_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<ReservationView, DomainError> {
    find_reservation(reservation_id, repo)
        .await?
        .ok_or(DomainError::AggregateNotFound(reservation_id))
}
