//! Reservations event store: implementations of the `EventRepository`
//! trait.
//!
//! `InMemoryEventRepository` keeps streams in a sharded concurrent map and is
//! the default for local runs and tests. `PgEventRepository` persists to
//! `PostgreSQL`.

pub mod in_memory_event_repository;
pub mod pg_event_repository;

pub use in_memory_event_repository::InMemoryEventRepository;
pub use pg_event_repository::{PgEventRepository, run_migrations};
