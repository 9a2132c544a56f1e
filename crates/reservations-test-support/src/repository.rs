//! `EventRepository` doubles for tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reservations_core::error::DomainError;
use reservations_core::repository::{EventRepository, StoredEvent};
use reservations_event_store::InMemoryEventRepository;
use tokio::sync::Barrier;
use uuid::Uuid;

/// An event repository that serves a fixed history from every
/// `load_events` call and records every `append_events` call without
/// applying it.
#[derive(Debug)]
pub struct RecordingEventRepository {
    history: Vec<StoredEvent>,
    appended: Mutex<Vec<(Uuid, i64, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Creates a repository that returns `history` for any aggregate.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns every `(aggregate_id, expected_version, events)` append seen
    /// so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Uuid, i64, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.history.clone())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id, expected_version, events.to_vec()));
        Ok(())
    }
}

/// An event repository with no history that silently accepts appends.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }
}

/// An event repository whose store is unreachable.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// An in-memory repository that loses the first `n` appends to a phantom
/// concurrent writer, then behaves normally.
#[derive(Debug)]
pub struct ConflictingEventRepository {
    inner: InMemoryEventRepository,
    conflicts_left: AtomicU32,
    rejected: AtomicU32,
}

impl ConflictingEventRepository {
    /// Creates a repository that rejects the next `conflicts` appends.
    #[must_use]
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryEventRepository::new(),
            conflicts_left: AtomicU32::new(conflicts),
            rejected: AtomicU32::new(0),
        }
    }

    /// Returns how many appends were rejected.
    #[must_use]
    pub fn rejected_appends(&self) -> u32 {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(aggregate_id).await
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let conflict = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if conflict {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner
            .append_events(aggregate_id, expected_version, events)
            .await
    }
}

/// Wraps a shared in-memory repository so that the first `parties` loads
/// wait for each other before reading.
///
/// Every participant then decides against the same snapshot, which forces
/// the lost-update race deterministically.
#[derive(Debug)]
pub struct RendezvousEventRepository {
    inner: Arc<InMemoryEventRepository>,
    barrier: Barrier,
    parties: usize,
    loads: AtomicUsize,
}

impl RendezvousEventRepository {
    /// Creates a rendezvous of `parties` loads over `inner`.
    #[must_use]
    pub fn new(inner: Arc<InMemoryEventRepository>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            parties,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EventRepository for RendezvousEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        if self.loads.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
        self.inner.load_events(aggregate_id).await
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.inner
            .append_events(aggregate_id, expected_version, events)
            .await
    }
}
