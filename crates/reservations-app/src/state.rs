//! Shared application state.

use std::sync::Arc;

use reservations_booking::application::repository::ReservationRepository;
use reservations_core::clock::{Clock, SystemClock};
use reservations_core::repository::EventRepository;
use reservations_event_store::{InMemoryEventRepository, PgEventRepository, run_migrations};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::{AppConfig, StoreKind};
use crate::error::AppError;

/// Application state: the reservation repository over the selected store.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Entry point for every reservation command.
    pub repository: ReservationRepository,
}

impl AppState {
    /// Create application state over an existing event store.
    #[must_use]
    pub fn new(
        event_repository: Arc<dyn EventRepository>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let mut repository = ReservationRepository::new(event_repository, clock)
            .with_retry_policy(config.retry.clone());
        if let Some(timeout) = config.command_timeout {
            repository = repository.with_command_timeout(timeout);
        }
        Self { repository }
    }

    /// Opens the store named by `config` and builds state over it with the
    /// system clock. PostgreSQL stores are migrated before use.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the pool cannot connect and
    /// `AppError::Migration` if the schema cannot be brought up to date.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let event_repository: Arc<dyn EventRepository> = match &config.store {
            StoreKind::Memory => {
                info!("using in-memory event store");
                Arc::new(InMemoryEventRepository::new())
            }
            StoreKind::Postgres {
                database_url,
                max_connections,
            } => {
                let pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await?;
                run_migrations(&pool).await?;
                info!(max_connections, "using PostgreSQL event store");
                Arc::new(PgEventRepository::new(pool))
            }
        };
        Ok(Self::new(event_repository, Arc::new(SystemClock), config))
    }

    /// Returns the event store queries read from.
    #[must_use]
    pub fn events(&self) -> &dyn EventRepository {
        self.repository.event_repository()
    }
}
