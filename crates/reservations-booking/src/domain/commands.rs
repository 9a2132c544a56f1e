//! Commands for the booking context.

use reservations_core::command::Command;
use uuid::Uuid;

/// Command to create a new reservation.
#[derive(Debug, Clone)]
pub struct CreateReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Identity of the reservation to create.
    pub reservation_id: Uuid,
    /// Human-facing reservation number, e.g. `R-100`.
    pub number: String,
}

impl Command for CreateReservation {
    fn command_type(&self) -> &'static str {
        "reservation.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.reservation_id
    }
}

/// Command to confirm a pending reservation.
#[derive(Debug, Clone)]
pub struct ConfirmReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The reservation to confirm.
    pub reservation_id: Uuid,
}

impl Command for ConfirmReservation {
    fn command_type(&self) -> &'static str {
        "reservation.confirm"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.reservation_id
    }
}

/// Command to cancel a pending or confirmed reservation.
#[derive(Debug, Clone)]
pub struct CancelReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The reservation to cancel.
    pub reservation_id: Uuid,
}

impl Command for CancelReservation {
    fn command_type(&self) -> &'static str {
        "reservation.cancel"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.reservation_id
    }
}

/// Closed set of booking commands, used for dispatch.
#[derive(Debug, Clone)]
pub enum ReservationCommand {
    /// Create a reservation.
    Create(CreateReservation),
    /// Confirm a reservation.
    Confirm(ConfirmReservation),
    /// Cancel a reservation.
    Cancel(CancelReservation),
}

impl ReservationCommand {
    fn inner(&self) -> &dyn Command {
        match self {
            Self::Create(command) => command,
            Self::Confirm(command) => command,
            Self::Cancel(command) => command,
        }
    }
}

impl Command for ReservationCommand {
    fn command_type(&self) -> &'static str {
        self.inner().command_type()
    }

    fn correlation_id(&self) -> Uuid {
        self.inner().correlation_id()
    }

    fn aggregate_id(&self) -> Uuid {
        self.inner().aggregate_id()
    }
}

impl From<CreateReservation> for ReservationCommand {
    fn from(command: CreateReservation) -> Self {
        Self::Create(command)
    }
}

impl From<ConfirmReservation> for ReservationCommand {
    fn from(command: ConfirmReservation) -> Self {
        Self::Confirm(command)
    }
}

impl From<CancelReservation> for ReservationCommand {
    fn from(command: CancelReservation) -> Self {
        Self::Cancel(command)
    }
}
