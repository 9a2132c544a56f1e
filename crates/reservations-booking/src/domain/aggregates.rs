//! Aggregate root for the booking context.
//!
//! A `Reservation` is a short-lived decision object: it is rebuilt from the
//! current [`ReservationRecord`] right before a command is decided and is
//! dropped afterwards. It never touches storage.

use reservations_core::aggregate::AggregateRoot;
use reservations_core::clock::Clock;
use reservations_core::command::Command;
use reservations_core::error::DomainError;
use reservations_core::event::EventMetadata;
use uuid::Uuid;

use super::commands::{CancelReservation, ConfirmReservation, CreateReservation, ReservationCommand};
use super::events::{
    ReservationCanceled, ReservationConfirmed, ReservationCreated, ReservationEvent,
    ReservationEventKind,
};
use super::record::ReservationRecord;
use super::status::ReservationStatus;

/// The aggregate root for a reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Reservation number.
    pub(crate) number: String,
    /// Status as of the last recorded event, pending or persisted.
    pub(crate) status: ReservationStatus,
    /// Version the aggregate was loaded at.
    pub(crate) version: i64,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<ReservationEvent>,
}

impl From<&ReservationRecord> for Reservation {
    fn from(record: &ReservationRecord) -> Self {
        Self {
            id: record.reservation_id,
            number: record.number.clone(),
            status: record.status,
            version: record.version,
            uncommitted_events: Vec::new(),
        }
    }
}

impl Reservation {
    /// Returns the reservation number.
    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Returns the current status, including uncommitted transitions.
    #[must_use]
    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    /// Starts a new reservation, producing a `ReservationCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyExists` if `prior` is present.
    /// Returns `DomainError::Validation` if the number is blank.
    pub fn create(
        prior: Option<&Reservation>,
        command: &CreateReservation,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        if prior.is_some() {
            return Err(DomainError::AlreadyExists(command.reservation_id));
        }
        let number = command.number.trim();
        if number.is_empty() {
            return Err(DomainError::Validation(
                "reservation number must not be empty".into(),
            ));
        }

        let mut reservation = Self {
            id: command.reservation_id,
            number: number.to_owned(),
            status: ReservationStatus::Pending,
            version: 0,
            uncommitted_events: Vec::new(),
        };
        reservation.record_that(
            ReservationEventKind::ReservationCreated(ReservationCreated {
                reservation_id: reservation.id,
                number: reservation.number.clone(),
                status: ReservationStatus::Pending,
            }),
            command,
            clock,
        );
        Ok(reservation)
    }

    /// Confirms the reservation, producing a `ReservationConfirmed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the reservation is
    /// pending.
    pub fn confirm(
        &mut self,
        command: &ConfirmReservation,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_transition(ReservationStatus::Confirmed, command)?;
        self.record_that(
            ReservationEventKind::ReservationConfirmed(ReservationConfirmed {
                reservation_id: self.id,
                status: ReservationStatus::Confirmed,
            }),
            command,
            clock,
        );
        Ok(())
    }

    /// Cancels the reservation, producing a `ReservationCanceled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the reservation is already
    /// cancelled.
    pub fn cancel(
        &mut self,
        command: &CancelReservation,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_transition(ReservationStatus::Cancelled, command)?;
        self.record_that(
            ReservationEventKind::ReservationCanceled(ReservationCanceled {
                reservation_id: self.id,
                status: ReservationStatus::Cancelled,
            }),
            command,
            clock,
        );
        Ok(())
    }

    fn ensure_transition(
        &self,
        next: ReservationStatus,
        command: &dyn Command,
    ) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                aggregate_id: self.id,
                status: self.status.to_string(),
                command: command.command_type(),
            })
        }
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn record_that(
        &mut self,
        kind: ReservationEventKind,
        command: &dyn Command,
        clock: &dyn Clock,
    ) {
        self.status = kind.status();
        let metadata = EventMetadata::caused_by(
            command,
            kind.event_type(),
            self.next_sequence_number(),
            clock.now(),
        );
        self.uncommitted_events.push(ReservationEvent { metadata, kind });
    }
}

impl AggregateRoot for Reservation {
    type Event = ReservationEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

/// Decides a booking command against the prior state of its reservation.
///
/// Pure apart from reading the clock and minting event ids: no I/O, and
/// safe to call again with fresh state after a concurrency conflict.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` when confirming or cancelling a
/// reservation that does not exist, and propagates the errors of
/// [`Reservation::create`], [`Reservation::confirm`], and
/// [`Reservation::cancel`].
pub fn decide(
    prior: Option<Reservation>,
    command: &ReservationCommand,
    clock: &dyn Clock,
) -> Result<Vec<ReservationEvent>, DomainError> {
    let mut reservation = match command {
        ReservationCommand::Create(create) => Reservation::create(prior.as_ref(), create, clock)?,
        ReservationCommand::Confirm(confirm) => {
            let mut reservation =
                prior.ok_or(DomainError::AggregateNotFound(confirm.reservation_id))?;
            reservation.confirm(confirm, clock)?;
            reservation
        }
        ReservationCommand::Cancel(cancel) => {
            let mut reservation =
                prior.ok_or(DomainError::AggregateNotFound(cancel.reservation_id))?;
            reservation.cancel(cancel, clock)?;
            reservation
        }
    };
    Ok(reservation.take_uncommitted_events())
}
