//! Command handlers for the booking context.
//!
//! Each handler routes its command through [`ReservationRepository`], which
//! loads the reservation, runs the pure decision, and persists the resulting
//! events.

use reservations_core::command::Command;
use reservations_core::error::DomainError;
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::application::repository::{ReservationCommandResult, ReservationRepository};
use crate::domain::aggregates::decide;
use crate::domain::commands::{
    CancelReservation, ConfirmReservation, CreateReservation, ReservationCommand,
};

/// Handles any booking command with the repository's default timeout.
///
/// # Errors
///
/// Returns `DomainError` if the decision is rejected or persistence fails.
pub async fn handle_command(
    command: &ReservationCommand,
    repo: &ReservationRepository,
) -> Result<ReservationCommandResult, DomainError> {
    dispatch(command, repo, None).await
}

/// Handles any booking command, giving up once `deadline` passes.
///
/// # Errors
///
/// Returns `DomainError::DeadlineExceeded` if the deadline passes before the
/// events are persisted, otherwise as [`handle_command`].
pub async fn handle_command_until(
    command: &ReservationCommand,
    repo: &ReservationRepository,
    deadline: Instant,
) -> Result<ReservationCommandResult, DomainError> {
    dispatch(command, repo, Some(deadline)).await
}

#[instrument(skip(command, repo), fields(
    reservation_id = %command.aggregate_id(),
    command_type = command.command_type(),
))]
async fn dispatch(
    command: &ReservationCommand,
    repo: &ReservationRepository,
    deadline: Option<Instant>,
) -> Result<ReservationCommandResult, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling reservation command");

    let reservation_id = command.aggregate_id();
    let result = match deadline {
        Some(deadline) => {
            repo.apply_until(reservation_id, Some(deadline), |prior, clock| {
                decide(prior, command, clock)
            })
            .await?
        }
        None => {
            repo.apply(reservation_id, |prior, clock| decide(prior, command, clock))
                .await?
        }
    };

    info!(version = result.version, "reservation command applied");
    Ok(result)
}

/// Handles the `CreateReservation` command: verifies the reservation does
/// not exist yet and persists a `ReservationCreated` event.
///
/// # Errors
///
/// Returns `DomainError::AlreadyExists` if the identity is taken,
/// `DomainError::Validation` if the number is blank, or the persistence error.
pub async fn handle_create_reservation(
    command: &CreateReservation,
    repo: &ReservationRepository,
) -> Result<ReservationCommandResult, DomainError> {
    handle_command(&ReservationCommand::Create(command.clone()), repo).await
}

/// Handles the `ConfirmReservation` command: reconstitutes the reservation,
/// confirms it, and persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the reservation does not
/// exist, `DomainError::InvalidTransition` unless it is pending, or the
/// persistence error.
pub async fn handle_confirm_reservation(
    command: &ConfirmReservation,
    repo: &ReservationRepository,
) -> Result<ReservationCommandResult, DomainError> {
    handle_command(&ReservationCommand::Confirm(command.clone()), repo).await
}

/// Handles the `CancelReservation` command: reconstitutes the reservation,
/// cancels it, and persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the reservation does not
/// exist, `DomainError::InvalidTransition` if it is already cancelled, or the
/// persistence error.
pub async fn handle_cancel_reservation(
    command: &CancelReservation,
    repo: &ReservationRepository,
) -> Result<ReservationCommandResult, DomainError> {
    handle_command(&ReservationCommand::Cancel(command.clone()), repo).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use reservations_core::error::DomainError;
    use reservations_core::repository::StoredEvent;
    use tokio::time::Instant;
    use uuid::Uuid;

    use crate::application::command_handlers::{
        handle_cancel_reservation, handle_command_until, handle_confirm_reservation,
        handle_create_reservation,
    };
    use crate::application::repository::ReservationRepository;
    use crate::domain::commands::{
        CancelReservation, ConfirmReservation, CreateReservation, ReservationCommand,
    };
    use crate::domain::events::{
        RESERVATION_CREATED_EVENT_TYPE, ReservationCreated, ReservationEventKind,
    };
    use crate::domain::status::ReservationStatus;
    use reservations_test_support::{
        EmptyEventRepository, FailingEventRepository, FixedClock, RecordingEventRepository,
    };

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ))
    }

    fn created_history(reservation_id: Uuid) -> Vec<StoredEvent> {
        vec![StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: reservation_id,
            event_type: RESERVATION_CREATED_EVENT_TYPE.to_owned(),
            payload: serde_json::to_value(ReservationEventKind::ReservationCreated(
                ReservationCreated {
                    reservation_id,
                    number: "R-100".to_owned(),
                    status: ReservationStatus::Pending,
                },
            ))
            .unwrap(),
            sequence_number: 1,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 14, 9, 0, 0).unwrap(),
        }]
    }

    #[tokio::test]
    async fn test_handle_create_reservation_persists_reservation_created_event() {
        // Arrange
        let reservation_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let clock = fixed_clock();
        let events = Arc::new(RecordingEventRepository::new(Vec::new()));
        let repo = ReservationRepository::new(events.clone(), clock.clone());

        let command = CreateReservation {
            correlation_id,
            reservation_id,
            number: "R-100".to_owned(),
        };

        // Act
        let result = handle_create_reservation(&command, &repo).await.unwrap();

        // Assert
        assert_eq!(result.aggregate_id, reservation_id);
        assert_eq!(result.version, 1);

        let appended = events.appended_events();
        assert_eq!(appended.len(), 1);

        let (agg_id, expected_version, stored_events) = &appended[0];
        assert_eq!(*agg_id, reservation_id);
        assert_eq!(*expected_version, 0);
        assert_eq!(stored_events.len(), 1);

        let stored = &stored_events[0];
        assert_eq!(stored.event_type, "reservation.created");
        assert_eq!(stored.aggregate_id, reservation_id);
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(stored.correlation_id, correlation_id);
        assert_eq!(stored.causation_id, correlation_id);
        assert_eq!(stored.occurred_at, clock.0);

        let kind: ReservationEventKind = serde_json::from_value(stored.payload.clone()).unwrap();
        match kind {
            ReservationEventKind::ReservationCreated(payload) => {
                assert_eq!(payload.reservation_id, reservation_id);
                assert_eq!(payload.number, "R-100");
                assert_eq!(payload.status, ReservationStatus::Pending);
            }
            other => panic!("expected ReservationCreated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_create_reservation_rejects_existing_identity() {
        let reservation_id = Uuid::new_v4();
        let events = Arc::new(RecordingEventRepository::new(created_history(
            reservation_id,
        )));
        let repo = ReservationRepository::new(events.clone(), fixed_clock());

        let command = CreateReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
            number: "R-101".to_owned(),
        };

        let result = handle_create_reservation(&command, &repo).await;

        match result {
            Err(DomainError::AlreadyExists(id)) => assert_eq!(id, reservation_id),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert!(events.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_confirm_reservation_appends_at_loaded_version() {
        // Arrange
        let reservation_id = Uuid::new_v4();
        let events = Arc::new(RecordingEventRepository::new(created_history(
            reservation_id,
        )));
        let repo = ReservationRepository::new(events.clone(), fixed_clock());

        let command = ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        };

        // Act
        let result = handle_confirm_reservation(&command, &repo).await.unwrap();

        // Assert
        assert_eq!(result.version, 2);
        assert_eq!(
            result.record.map(|r| r.status),
            Some(ReservationStatus::Confirmed)
        );

        let appended = events.appended_events();
        let (_, expected_version, stored_events) = &appended[0];
        assert_eq!(*expected_version, 1);
        assert_eq!(stored_events[0].event_type, "reservation.confirmed");
        assert_eq!(stored_events[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn test_handle_confirm_reservation_returns_not_found_when_no_events() {
        let repo = ReservationRepository::new(Arc::new(EmptyEventRepository), fixed_clock());
        let reservation_id = Uuid::new_v4();

        let command = ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        };

        let result = handle_confirm_reservation(&command, &repo).await;

        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, reservation_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_cancel_reservation_persists_reservation_canceled_event() {
        let reservation_id = Uuid::new_v4();
        let events = Arc::new(RecordingEventRepository::new(created_history(
            reservation_id,
        )));
        let repo = ReservationRepository::new(events.clone(), fixed_clock());

        let command = CancelReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        };

        let result = handle_cancel_reservation(&command, &repo).await.unwrap();

        assert_eq!(
            result.record.map(|r| r.status),
            Some(ReservationStatus::Cancelled)
        );
        let appended = events.appended_events();
        assert_eq!(appended[0].2[0].event_type, "reservation.canceled");
    }

    #[tokio::test]
    async fn test_handle_cancel_reservation_propagates_infrastructure_error() {
        let repo = ReservationRepository::new(Arc::new(FailingEventRepository), fixed_clock());

        let command = CancelReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
        };

        let result = handle_cancel_reservation(&command, &repo).await;

        match result {
            Err(DomainError::Infrastructure(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_command_until_past_deadline_is_deadline_exceeded() {
        // Arrange
        let reservation_id = Uuid::new_v4();
        let events = Arc::new(RecordingEventRepository::new(Vec::new()));
        let repo = ReservationRepository::new(events.clone(), fixed_clock());
        let command = ReservationCommand::Create(CreateReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
            number: "R-100".to_owned(),
        });

        // Act
        let result = handle_command_until(&command, &repo, Instant::now()).await;

        // Assert
        match result {
            Err(DomainError::DeadlineExceeded {
                aggregate_id,
                attempts,
            }) => {
                assert_eq!(aggregate_id, reservation_id);
                assert_eq!(attempts, 0);
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
        assert!(events.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_command_until_future_deadline_applies_command() {
        let reservation_id = Uuid::new_v4();
        let events = Arc::new(RecordingEventRepository::new(created_history(reservation_id)));
        let repo = ReservationRepository::new(events.clone(), fixed_clock());
        let command = ReservationCommand::Confirm(ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        });
        let deadline = Instant::now() + Duration::from_secs(5);

        let result = handle_command_until(&command, &repo, deadline).await.unwrap();

        assert_eq!(result.version, 2);
        assert_eq!(events.appended_events().len(), 1);
    }
}
