//! Reservation repository: the single choke point every booking command
//! passes through.
//!
//! `apply` runs load → decide → fold → append as a compare-and-swap on the
//! reservation's stream version. When another writer wins the race the whole
//! cycle is re-run against fresh state, bounded by the [`RetryPolicy`] and an
//! optional deadline.

use std::sync::Arc;
use std::time::Duration;

use reservations_core::clock::Clock;
use reservations_core::error::DomainError;
use reservations_core::event::EventMetadata;
use reservations_core::repository::{EventRepository, StoredEvent};
use reservations_core::retry::RetryPolicy;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::Reservation;
use crate::domain::events::{ReservationEvent, ReservationEventKind};
use crate::domain::record::{ReservationRecord, fold};

/// Result of a successfully applied command.
#[derive(Debug)]
pub struct ReservationCommandResult {
    /// The reservation affected by the command.
    pub aggregate_id: Uuid,
    /// Stream version after the append.
    pub version: i64,
    /// The record after folding the new events, if the reservation exists.
    pub record: Option<ReservationRecord>,
    /// The stored events produced and persisted, in order.
    pub stored_events: Vec<StoredEvent>,
}

/// Decodes a stored event back into its domain form.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the payload cannot be
/// deserialized or does not match the stored event type.
pub(crate) fn decode(stored: &StoredEvent) -> Result<ReservationEvent, DomainError> {
    let kind: ReservationEventKind = serde_json::from_value(stored.payload.clone())
        .map_err(|e| DomainError::Infrastructure(format!("event deserialization failed: {e}")))?;
    if kind.event_type() != stored.event_type {
        return Err(DomainError::Infrastructure(format!(
            "event {} is stored as {} but its payload is {}",
            stored.event_id,
            stored.event_type,
            kind.event_type()
        )));
    }
    Ok(ReservationEvent {
        metadata: EventMetadata {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id,
            sequence_number: stored.sequence_number,
            correlation_id: stored.correlation_id,
            causation_id: stored.causation_id,
            occurred_at: stored.occurred_at,
        },
        kind,
    })
}

/// Reconstitutes a reservation record by folding its stored history.
/// An empty history yields `None`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails, or
/// the fold error if the history is inconsistent.
pub(crate) fn reconstitute(
    existing_events: &[StoredEvent],
) -> Result<Option<ReservationRecord>, DomainError> {
    existing_events.iter().try_fold(None, |record, stored| {
        let event = decode(stored)?;
        fold(record, &event).map(Some)
    })
}

/// Orchestrates command execution against an [`EventRepository`].
#[derive(Clone)]
pub struct ReservationRepository {
    events: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    command_timeout: Option<Duration>,
}

impl std::fmt::Debug for ReservationRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationRepository")
            .field("retry", &self.retry)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl ReservationRepository {
    /// Creates a repository with the default retry policy and no timeout.
    #[must_use]
    pub fn new(events: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            clock,
            retry: RetryPolicy::default(),
            command_timeout: None,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets a default timeout applied to every command without an explicit
    /// deadline.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Returns the underlying event repository.
    #[must_use]
    pub fn event_repository(&self) -> &dyn EventRepository {
        self.events.as_ref()
    }

    /// Returns the clock used to timestamp events.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Loads the current record for a reservation, or `None` if it has no
    /// history.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if loading or replaying the history fails.
    pub async fn find(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<ReservationRecord>, DomainError> {
        let existing_events = self.events.load_events(reservation_id).await?;
        reconstitute(&existing_events)
    }

    /// Applies a decision to a reservation using the configured default
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`ReservationRepository::apply_until`].
    pub async fn apply<F>(
        &self,
        reservation_id: Uuid,
        decide: F,
    ) -> Result<ReservationCommandResult, DomainError>
    where
        F: Fn(Option<Reservation>, &dyn Clock) -> Result<Vec<ReservationEvent>, DomainError>
            + Send
            + Sync,
    {
        let deadline = self.command_timeout.map(|timeout| Instant::now() + timeout);
        self.apply_until(reservation_id, deadline, decide).await
    }

    /// Applies a decision to a reservation: load, decide, fold, append.
    ///
    /// `decide` may run more than once; each run sees freshly loaded state.
    ///
    /// # Errors
    ///
    /// Propagates decision and fold errors unchanged. Returns
    /// `DomainError::ConcurrencyConflict` once the retry policy is exhausted,
    /// and `DomainError::DeadlineExceeded` if `deadline` passes first.
    #[instrument(skip(self, decide), fields(%reservation_id))]
    pub async fn apply_until<F>(
        &self,
        reservation_id: Uuid,
        deadline: Option<Instant>,
        decide: F,
    ) -> Result<ReservationCommandResult, DomainError>
    where
        F: Fn(Option<Reservation>, &dyn Clock) -> Result<Vec<ReservationEvent>, DomainError>
            + Send
            + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(attempts = attempt, "deadline exceeded before command was persisted");
                return Err(DomainError::DeadlineExceeded {
                    aggregate_id: reservation_id,
                    attempts: attempt,
                });
            }
            attempt += 1;

            match self.try_once(reservation_id, &decide).await {
                Err(err) if err.is_retryable() && self.retry.allows_retry_after(attempt) => {
                    let mut backoff = self.retry.delay_after(attempt);
                    if let Some(deadline) = deadline {
                        backoff = backoff.min(deadline.saturating_duration_since(Instant::now()));
                    }
                    warn!(attempt, ?backoff, error = %err, "retrying after concurrency conflict");
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(attempts = attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
                Ok(result) => return Ok(result),
            }
        }
    }

    async fn try_once<F>(
        &self,
        reservation_id: Uuid,
        decide: &F,
    ) -> Result<ReservationCommandResult, DomainError>
    where
        F: Fn(Option<Reservation>, &dyn Clock) -> Result<Vec<ReservationEvent>, DomainError>
            + Send
            + Sync,
    {
        let record = self.find(reservation_id).await?;
        let expected_version = record.as_ref().map_or(0, |r| r.version);

        let events = decide(record.as_ref().map(Reservation::from), self.clock.as_ref())?;
        if let Some(foreign) = events
            .iter()
            .find(|event| event.metadata.aggregate_id != reservation_id)
        {
            return Err(DomainError::InvariantViolation(format!(
                "decision for reservation {reservation_id} produced event {} for aggregate {}",
                foreign.metadata.event_id, foreign.metadata.aggregate_id
            )));
        }
        if events.is_empty() {
            debug!(expected_version, "decision produced no events");
            return Ok(ReservationCommandResult {
                aggregate_id: reservation_id,
                version: expected_version,
                record,
                stored_events: Vec::new(),
            });
        }

        let record = events
            .iter()
            .try_fold(record, |record, event| fold(record, event).map(Some))?;
        let stored_events: Vec<StoredEvent> =
            events.iter().map(StoredEvent::from_domain_event).collect();

        self.events
            .append_events(reservation_id, expected_version, &stored_events)
            .await?;

        let version = record.as_ref().map_or(expected_version, |r| r.version);
        debug!(expected_version, version, "appended events");
        Ok(ReservationCommandResult {
            aggregate_id: reservation_id,
            version,
            record,
            stored_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use reservations_core::clock::Clock;
    use reservations_core::error::DomainError;
    use reservations_core::repository::EventRepository;
    use reservations_core::retry::RetryPolicy;
    use reservations_event_store::InMemoryEventRepository;
    use reservations_test_support::{
        ConflictingEventRepository, FailingEventRepository, FixedClock,
    };
    use tokio::time::Instant;
    use uuid::Uuid;

    use super::{ReservationRepository, reconstitute};
    use crate::domain::aggregates::decide;
    use crate::domain::commands::{ConfirmReservation, CreateReservation, ReservationCommand};
    use crate::domain::events::{ReservationConfirmed, ReservationEventKind};
    use crate::domain::status::ReservationStatus;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ))
    }

    fn create(reservation_id: Uuid) -> ReservationCommand {
        ReservationCommand::Create(CreateReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
            number: "R-100".to_owned(),
        })
    }

    fn confirm(reservation_id: Uuid) -> ReservationCommand {
        ReservationCommand::Confirm(ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        })
    }

    #[tokio::test]
    async fn test_apply_create_appends_and_returns_folded_record() {
        // Arrange
        let store = Arc::new(InMemoryEventRepository::new());
        let repo = ReservationRepository::new(store.clone(), clock());
        let reservation_id = Uuid::new_v4();
        let command = create(reservation_id);

        // Act
        let result = repo
            .apply(reservation_id, |prior, clock| decide(prior, &command, clock))
            .await
            .unwrap();

        // Assert
        assert_eq!(result.aggregate_id, reservation_id);
        assert_eq!(result.version, 1);
        assert_eq!(result.stored_events.len(), 1);
        let record = result.record.unwrap();
        assert_eq!(record.status, ReservationStatus::Pending);

        let history = store.load_events(reservation_id).await.unwrap();
        assert_eq!(history, result.stored_events);
        assert_eq!(reconstitute(&history).unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_apply_with_no_events_appends_nothing() {
        let store = Arc::new(InMemoryEventRepository::new());
        let repo = ReservationRepository::new(store.clone(), clock());
        let reservation_id = Uuid::new_v4();

        let result = repo
            .apply(reservation_id, |_, _| Ok(Vec::new()))
            .await
            .unwrap();

        assert_eq!(result.version, 0);
        assert!(result.record.is_none());
        assert!(result.stored_events.is_empty());
        assert_eq!(store.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_retries_after_conflict_and_redecides() {
        // Arrange
        let store = Arc::new(ConflictingEventRepository::new(2));
        let repo = ReservationRepository::new(store.clone(), clock())
            .with_retry_policy(RetryPolicy::immediate(3));
        let reservation_id = Uuid::new_v4();
        let command = create(reservation_id);
        let decisions = std::sync::atomic::AtomicU32::new(0);

        // Act
        let result = repo
            .apply(reservation_id, |prior, clock| {
                decisions.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                decide(prior, &command, clock)
            })
            .await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(decisions.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(store.rejected_appends(), 2);
        assert_eq!(store.load_events(reservation_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_surfaces_conflict_when_retries_exhausted() {
        // Arrange
        let store = Arc::new(ConflictingEventRepository::new(5));
        let repo = ReservationRepository::new(store.clone(), clock())
            .with_retry_policy(RetryPolicy::immediate(3));
        let reservation_id = Uuid::new_v4();
        let command = create(reservation_id);

        // Act
        let result = repo
            .apply(reservation_id, |prior, clock| decide(prior, &command, clock))
            .await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict { aggregate_id, .. }) => {
                assert_eq!(aggregate_id, reservation_id);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(store.rejected_appends(), 3);
        assert!(store.load_events(reservation_id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_stops_retrying_at_deadline() {
        // Arrange
        let store = Arc::new(ConflictingEventRepository::new(u32::MAX));
        let repo = ReservationRepository::new(store.clone(), clock()).with_retry_policy(
            RetryPolicy::builder()
                .max_attempts(100)
                .initial_delay(Duration::from_millis(40))
                .max_delay(Duration::from_millis(40))
                .build(),
        );
        let reservation_id = Uuid::new_v4();
        let command = create(reservation_id);
        let deadline = Instant::now() + Duration::from_millis(100);

        // Act
        let result = repo
            .apply_until(reservation_id, Some(deadline), |prior, clock| {
                decide(prior, &command, clock)
            })
            .await;

        // Assert
        match result {
            Err(DomainError::DeadlineExceeded {
                aggregate_id,
                attempts,
            }) => {
                assert_eq!(aggregate_id, reservation_id);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_with_expired_deadline_never_decides() {
        let store = Arc::new(InMemoryEventRepository::new());
        let repo = ReservationRepository::new(store.clone(), clock());
        let reservation_id = Uuid::new_v4();

        let result = repo
            .apply_until(reservation_id, Some(Instant::now()), |_, _| {
                panic!("decision must not run after the deadline")
            })
            .await;

        assert!(matches!(
            result,
            Err(DomainError::DeadlineExceeded { attempts: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_does_not_retry_decision_errors() {
        let store = Arc::new(InMemoryEventRepository::new());
        let repo = ReservationRepository::new(store, clock());
        let reservation_id = Uuid::new_v4();
        let command = confirm(reservation_id);
        let decisions = std::sync::atomic::AtomicU32::new(0);

        let result = repo
            .apply(reservation_id, |prior, clock| {
                decisions.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                decide(prior, &command, clock)
            })
            .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
        assert_eq!(decisions.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_apply_propagates_infrastructure_errors() {
        let repo = ReservationRepository::new(Arc::new(FailingEventRepository), clock());
        let reservation_id = Uuid::new_v4();
        let command = create(reservation_id);

        let result = repo
            .apply(reservation_id, |prior, clock| decide(prior, &command, clock))
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_find_rejects_undecodable_history() {
        // Arrange
        let store = Arc::new(InMemoryEventRepository::new());
        let reservation_id = Uuid::new_v4();
        let stored = reservations_core::repository::StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: reservation_id,
            event_type: "reservation.created".to_owned(),
            payload: serde_json::json!({ "Unknown": {} }),
            sequence_number: 1,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        };
        store
            .append_events(reservation_id, 0, std::slice::from_ref(&stored))
            .await
            .unwrap();
        let repo = ReservationRepository::new(store, clock());

        // Act
        let result = repo.find(reservation_id).await;

        // Assert
        match result {
            Err(DomainError::Infrastructure(msg)) => {
                assert!(msg.starts_with("event deserialization failed"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_rejects_events_for_another_reservation() {
        // Arrange
        let store = Arc::new(InMemoryEventRepository::new());
        let repo = ReservationRepository::new(store.clone(), clock());
        let target_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        let command = create(other_id);

        // Act
        let result = repo
            .apply(target_id, |prior, clock| decide(prior, &command, clock))
            .await;

        // Assert
        match result {
            Err(DomainError::InvariantViolation(msg)) => {
                assert!(msg.contains(&other_id.to_string()));
            }
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
        assert!(store.load_events(target_id).await.unwrap().is_empty());
        assert!(store.load_events(other_id).await.unwrap().is_empty());
        assert_eq!(store.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_find_rejects_payload_that_contradicts_event_type() {
        // Arrange
        let store = Arc::new(InMemoryEventRepository::new());
        let reservation_id = Uuid::new_v4();
        let kind = ReservationEventKind::ReservationConfirmed(ReservationConfirmed {
            reservation_id,
            status: ReservationStatus::Confirmed,
        });
        let stored = reservations_core::repository::StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: reservation_id,
            event_type: "reservation.created".to_owned(),
            payload: serde_json::to_value(&kind).unwrap(),
            sequence_number: 1,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        };
        store
            .append_events(reservation_id, 0, std::slice::from_ref(&stored))
            .await
            .unwrap();
        let repo = ReservationRepository::new(store, clock());

        // Act
        let result = repo.find(reservation_id).await;

        // Assert
        match result {
            Err(DomainError::Infrastructure(msg)) => {
                assert!(msg.contains("stored as reservation.created"));
                assert!(msg.contains("reservation.confirmed"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
