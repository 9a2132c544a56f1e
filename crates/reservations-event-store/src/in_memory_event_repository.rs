//! In-memory implementation of the `EventRepository` trait.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use reservations_core::error::DomainError;
use reservations_core::repository::{EventRepository, StoredEvent};

/// Event repository backed by a sharded concurrent map.
///
/// Each stream is guarded by its shard's lock only while the version check
/// and the extend run, so appends to different aggregates do not wait on
/// each other and no lock is held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: DashMap<Uuid, Vec<StoredEvent>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of aggregates with at least one event.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.iter().filter(|stream| !stream.is_empty()).count()
    }

    fn append_now(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        StoredEvent::validate_batch(aggregate_id, expected_version, events)?;

        let mut stream = self.streams.entry(aggregate_id).or_default();
        let actual = stream.last().map_or(0, |e| e.sequence_number);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        stream.extend_from_slice(events);
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let events = self
            .streams
            .get(&aggregate_id)
            .map(|stream| stream.clone())
            .unwrap_or_default();
        debug!(%aggregate_id, count = events.len(), "loaded events");
        Ok(events)
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        self.append_now(aggregate_id, expected_version, events)?;
        debug!(%aggregate_id, expected_version, count = events.len(), "appended events");
        Ok(())
    }
}
